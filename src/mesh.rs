use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::animation::Marker;
use crate::fragment::{Colour, TexCoord};
use crate::skeleton::Skeleton;
use crate::texture::TextureHandle;

/// Quad face. Indices follow the hardware corner order, see
/// [`crate::fragment::QuadPrimitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: [u16; 4],
    #[serde(default)]
    pub uvs: Option<[u16; 4]>,
}

impl Face {
    pub const fn new(vertices: [u16; 4]) -> Self {
        Self {
            vertices,
            uvs: None,
        }
    }

    pub const fn textured(vertices: [u16; 4], uvs: [u16; 4]) -> Self {
        Self {
            vertices,
            uvs: Some(uvs),
        }
    }
}

/// Decoded mesh, optionally rigidly skinned to its own skeleton.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Bind-pose positions.
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub uvs: Vec<TexCoord>,
    /// Per-vertex colours. Empty means flat neutral grey.
    pub colours: Vec<Colour>,
    pub bone_for_vertex: Vec<u8>,
    pub texture: Option<TextureHandle>,
    skinned_vertices: Vec<Vec3>,
    skeleton: Option<Skeleton>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Face>) -> Self {
        Self {
            skinned_vertices: vertices.clone(),
            vertices,
            faces,
            ..Self::default()
        }
    }

    /// Axis aligned cube centred on the origin with outward facing quads.
    pub fn cube(half_extent: f32) -> Self {
        let vertices = (0..8u8)
            .map(|corner| {
                let axis = |bit: u8| if corner & bit != 0 { half_extent } else { -half_extent };
                Vec3::new(axis(1), axis(2), axis(4))
            })
            .collect();
        let faces = [
            [0, 1, 2, 3],
            [6, 7, 4, 5],
            [4, 5, 0, 1],
            [7, 6, 3, 2],
            [6, 4, 2, 0],
            [5, 7, 1, 3],
        ]
        .into_iter()
        .map(Face::new)
        .collect();
        Self::new(vertices, faces)
    }

    pub fn with_uvs(mut self, uvs: Vec<TexCoord>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_colours(mut self, colours: Vec<Colour>) -> Self {
        self.colours = colours;
        self
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Binds every vertex to one bone of `skeleton`.
    ///
    /// The skeleton is evaluated straight away, so its bind pose is the pose it
    /// was attached in rather than the first animated frame.
    pub fn with_skeleton(mut self, mut skeleton: Skeleton, bone_for_vertex: Vec<u8>) -> Self {
        skeleton.update_bone_matrices();
        self.skeleton = Some(skeleton);
        self.bone_for_vertex = bone_for_vertex;
        self.skin();
        self.mark_bones_clean();
        self
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        self.skeleton.as_mut()
    }

    pub fn is_skinned(&self) -> bool {
        self.skeleton.is_some()
    }

    /// Positions to draw: skinned when the mesh has a skeleton.
    pub fn positions(&self) -> &[Vec3] {
        if self.skeleton.is_some() {
            &self.skinned_vertices
        } else {
            &self.vertices
        }
    }

    /// Advances the skeleton's animation, re-evaluates dirty bones and skins.
    /// Returns the markers crossed. Does nothing for static meshes.
    pub fn animate(&mut self, delta_ticks: u32) -> Vec<Marker> {
        let Some(skeleton) = &mut self.skeleton else {
            return Vec::new();
        };
        let markers = skeleton.play_animation(delta_ticks);
        skeleton.update_bone_matrices();
        self.skin();
        markers
    }

    /// Rewrites the skinned positions of vertices bound to dirty bones.
    pub fn skin(&mut self) {
        let Some(skeleton) = &self.skeleton else {
            return;
        };
        if self.skinned_vertices.len() != self.vertices.len() {
            self.skinned_vertices = self.vertices.clone();
        }
        skeleton.skin_vertices(&self.vertices, &self.bone_for_vertex, &mut self.skinned_vertices);
    }

    pub fn mark_bones_clean(&mut self) {
        if let Some(skeleton) = &mut self.skeleton {
            skeleton.mark_bones_clean();
        }
    }

    /// Current corner positions of `face`, `None` when an index is out of range.
    pub fn face_positions(&self, face: &Face) -> Option<[Vec3; 4]> {
        let positions = self.positions();
        let [a, b, c, d] = face.vertices.map(|index| positions.get(usize::from(index)).copied());
        Some([a?, b?, c?, d?])
    }

    pub fn face_colours(&self, face: &Face) -> [Colour; 4] {
        face.vertices.map(|index| {
            self.colours
                .get(usize::from(index))
                .copied()
                .unwrap_or(Colour::NEUTRAL)
        })
    }

    /// Texel coordinates of `face`, `None` for untextured faces or bad indices.
    pub fn face_uvs(&self, face: &Face) -> Option<[TexCoord; 4]> {
        let [a, b, c, d] = face
            .uvs?
            .map(|index| self.uvs.get(usize::from(index)).copied());
        Some([a?, b?, c?, d?])
    }
}
