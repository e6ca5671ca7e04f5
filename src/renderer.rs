use glam::{Mat3, Vec3};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::camera::CameraProvider;
use crate::config::RendererConfig;
use crate::display::DisplaySink;
use crate::error::ConfigError;
use crate::fragment::{
    Colour, LinePrimitive, Primitive, QuadPrimitive, ScreenPoint, TexCoord, QUAD_FLAG_CLUT,
    QUAD_FLAG_TEXTURED,
};
use crate::mesh::Mesh;
use crate::ordering_table::{FrameSlot, InsertError};
use crate::texture::TextureProvider;
use crate::transform::{FrameCamera, Projector, Rejection};

const BONE_COLOUR: Colour = Colour::new(255, 255, 0);
const BONE_PARENT_COLOUR: Colour = Colour::new(255, 64, 0);

/// What happened to the primitives offered during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub submitted: usize,
    pub back_facing: usize,
    pub behind_camera: usize,
    pub out_of_depth: usize,
    pub off_screen: usize,
    /// Dropped because the slot's fragment pool was full.
    pub overflowed: usize,
}

impl std::ops::AddAssign for FrameStats {
    fn add_assign(&mut self, other: Self) {
        self.submitted += other.submitted;
        self.back_facing += other.back_facing;
        self.behind_camera += other.behind_camera;
        self.out_of_depth += other.out_of_depth;
        self.off_screen += other.off_screen;
        self.overflowed += other.overflowed;
    }
}

impl FrameStats {
    pub fn rejected(&self) -> usize {
        self.back_facing + self.behind_camera + self.out_of_depth + self.off_screen
    }

    fn reject(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::BackFacing => self.back_facing += 1,
            Rejection::BehindCamera => self.behind_camera += 1,
            Rejection::OutOfDepth => self.out_of_depth += 1,
            Rejection::OffScreen => self.off_screen += 1,
        }
    }
}

/// Double buffered ordering-table compositor.
///
/// Each frame runs `begin_frame`, any number of `draw_mesh` calls, then
/// `end_frame`, which hands the slot to the display and flips to the other.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    projector: Projector,
    slots: [FrameSlot; 2],
    parity: usize,
    camera: FrameCamera,
    stats: FrameStats,
    overflow_reported: bool,
    frames_rendered: u64,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let slot = FrameSlot::new(config.ordering_table_size, config.fragment_capacity);
        Ok(Self {
            projector: Projector::new(&config),
            slots: [slot.clone(), slot],
            parity: 0,
            camera: FrameCamera::new(Vec3::ZERO, Mat3::IDENTITY),
            stats: FrameStats::default(),
            overflow_reported: false,
            frames_rendered: 0,
            config,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Slot being built this frame.
    pub fn parity(&self) -> usize {
        self.parity
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frame_camera(&self) -> &FrameCamera {
        &self.camera
    }

    /// Resets the current slot and captures the camera for this frame.
    pub fn begin_frame(&mut self, camera: &dyn CameraProvider) {
        self.slots[self.parity].reset();
        self.stats = FrameStats::default();
        self.overflow_reported = false;
        self.camera = FrameCamera::from_provider(camera);
    }

    /// Projects every face of `mesh` and stores the survivors.
    pub fn draw_mesh(
        &mut self,
        mesh: &Mesh,
        position: Vec3,
        rotation: Mat3,
        textures: &dyn TextureProvider,
    ) {
        let transform = self.camera.object_transform(position, rotation);
        let page = mesh.texture.and_then(|handle| textures.page(handle));

        for face in &mesh.faces {
            let Some(corners) = mesh.face_positions(face) else {
                trace!("skipping face with out of range vertex index");
                continue;
            };
            let projected = match self.projector.transform_quad(&transform, corners) {
                Ok(projected) => projected,
                Err(rejection) => {
                    self.stats.reject(rejection);
                    continue;
                }
            };

            let mut quad = QuadPrimitive {
                points: projected.points,
                colours: mesh.face_colours(face),
                ..QuadPrimitive::default()
            };
            if let (Some(page), Some(uvs)) = (page, mesh.face_uvs(face)) {
                quad.uvs = uvs.map(|uv: TexCoord| page.map_uv(uv));
                quad.tpage = page.tpage;
                quad.flags |= QUAD_FLAG_TEXTURED;
                if let Some(clut) = page.clut {
                    quad.clut = clut;
                    quad.flags |= QUAD_FLAG_CLUT;
                }
            }
            self.insert(projected.bucket, Primitive::Quad(quad));
        }

        if self.config.debug_bones {
            self.draw_bones(mesh, position, rotation);
        }
    }

    /// Queues a line from every bone to its parent.
    fn draw_bones(&mut self, mesh: &Mesh, position: Vec3, rotation: Mat3) {
        let Some(skeleton) = mesh.skeleton() else {
            return;
        };
        let transform = self.camera.object_transform(position, rotation);
        for bone in skeleton.bones() {
            let Some(parent) = bone.parent.and_then(|parent| skeleton.bone(parent)) else {
                continue;
            };
            let from = transform.apply(parent.world_matrix().translation);
            let to = transform.apply(bone.world_matrix().translation);
            match self.projector.transform_line(from, to) {
                Ok(line) => {
                    let primitive = Primitive::Line(LinePrimitive {
                        points: line.points,
                        colours: [BONE_PARENT_COLOUR, BONE_COLOUR],
                    });
                    self.insert(line.bucket, primitive);
                }
                Err(rejection) => self.stats.reject(rejection),
            }
        }
    }

    /// Stores a screen-space line directly, e.g. for overlays.
    pub fn draw_line(&mut self, points: [ScreenPoint; 2], colour: Colour, bucket: usize) {
        let primitive = Primitive::Line(LinePrimitive {
            points,
            colours: [colour; 2],
        });
        self.insert(bucket, primitive);
    }

    fn insert(&mut self, bucket: usize, primitive: Primitive) {
        match self.slots[self.parity].insert(bucket, primitive) {
            Ok(_) => self.stats.submitted += 1,
            Err(InsertError::OutOfRange(_)) => self.stats.out_of_depth += 1,
            Err(InsertError::PoolExhausted) => {
                self.stats.overflowed += 1;
                if !self.overflow_reported {
                    warn!(
                        "fragment pool full ({} fragments), dropping primitives for the rest of frame {}",
                        self.config.fragment_capacity, self.frames_rendered
                    );
                    self.overflow_reported = true;
                }
            }
            Err(InsertError::Stale) => trace!("stale fragment dropped from bucket {bucket}"),
        }
    }

    /// Clears and submits the current slot, then flips to the other one.
    pub fn end_frame(&mut self, sink: &mut dyn DisplaySink) -> FrameStats {
        sink.clear(self.parity, self.config.background);
        sink.submit(self.parity, &self.slots[self.parity]);
        trace!(
            "frame {} on slot {}: {:?}",
            self.frames_rendered,
            self.parity,
            self.stats
        );
        self.parity ^= 1;
        self.frames_rendered += 1;
        self.stats
    }
}
