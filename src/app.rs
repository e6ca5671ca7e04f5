use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationLibrary;
use crate::camera::{Camera, CameraMode};
use crate::display::DisplaySink;
use crate::mesh::Mesh;
use crate::renderer::{FrameStats, Renderer};
use crate::scene::{CameraSetup, MeshDescription, MeshSource, Scene};
use crate::skeleton::{Skeleton, SkeletonBone};
use crate::texture::TextureAtlas;
use crate::world::{GameObject, World};

/// A marker crossed by an object's animation during a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEvent {
    pub object: String,
    pub animation: String,
    pub marker: String,
    pub frame: u32,
}

/// Owns a loaded scene and drives it one frame at a time.
#[derive(Debug)]
pub struct App {
    world: World,
    animations: AnimationLibrary,
    textures: TextureAtlas,
    camera: Camera,
    renderer: Renderer,
    follow: Option<String>,
    events: Vec<MarkerEvent>,
}

impl App {
    pub fn from_scene(scene: &Scene) -> Result<Self> {
        let renderer =
            Renderer::new(scene.renderer.clone()).context("invalid renderer configuration")?;

        let mut textures = TextureAtlas::new();
        for entry in &scene.textures {
            textures.insert(entry.name.clone(), entry.page);
        }
        let mut animations = AnimationLibrary::new();
        for animation in &scene.animations {
            animations.insert(animation.clone());
        }

        let mut world = World::new();
        for object in &scene.objects {
            let mut game_object =
                GameObject::new(object.name.clone(), object.position, object.rotation)
                    .with_tag(object.tag.clone());
            if let Some(description) = &object.mesh {
                let mesh = build_mesh(description, &textures, &animations)
                    .with_context(|| format!("failed to build mesh for {}", object.name))?;
                game_object = game_object.with_mesh(mesh);
            }
            if world.create(game_object).is_none() {
                bail!("scene has more than {} objects", world.capacity());
            }
        }

        let camera = build_camera(&scene.camera, &world)?;
        let follow = match scene.camera.mode {
            CameraMode::Follow => scene.camera.target.clone(),
            _ => None,
        };

        info!(
            "scene ready: {} objects, {} animations, {} textures",
            world.len(),
            animations.len(),
            textures.len()
        );

        Ok(Self {
            world,
            animations,
            textures,
            camera,
            renderer,
            follow,
            events: Vec::new(),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn animations(&self) -> &AnimationLibrary {
        &self.animations
    }

    pub fn textures(&self) -> &TextureAtlas {
        &self.textures
    }

    /// Starts `animation` from frame zero on the named object's skeleton.
    pub fn play(&mut self, object: &str, animation: &str) -> Result<()> {
        let animation = self
            .animations
            .get(animation)
            .ok_or_else(|| anyhow!("unknown animation {animation}"))?;
        let skeleton = self
            .world
            .by_name(object)
            .and_then(|id| self.world.get_mut(id))
            .and_then(|object| object.mesh.as_mut())
            .and_then(Mesh::skeleton_mut)
            .ok_or_else(|| anyhow!("{object} has no skeleton to animate"))?;
        skeleton.set_animation(animation);
        Ok(())
    }

    /// Stops the named object's animation, leaving it in its current pose.
    pub fn stop(&mut self, object: &str) -> bool {
        self.world
            .update(object, |object| {
                object
                    .mesh
                    .as_mut()
                    .and_then(Mesh::skeleton_mut)
                    .map(Skeleton::clear_animation)
            })
            .flatten()
            .is_some()
    }

    /// Marker events collected since the last call.
    pub fn take_events(&mut self) -> Vec<MarkerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Runs one frame: camera, animation, skinning, then projection into the
    /// current slot which is handed to `sink`. A zero `delta_ticks` renders
    /// nothing and returns `None`.
    pub fn frame(&mut self, delta_ticks: u32, sink: &mut dyn DisplaySink) -> Option<FrameStats> {
        if delta_ticks == 0 {
            return None;
        }

        let target = self
            .follow
            .as_deref()
            .and_then(|name| self.world.by_name(name))
            .and_then(|id| self.world.get(id))
            .map(|object| object.position);
        if let Some(target) = target {
            self.camera.set_follow_target(target);
        }
        self.camera.process(delta_ticks);
        self.renderer.begin_frame(&self.camera);

        for id in self.world.active() {
            let Some(object) = self.world.get_mut(id) else {
                continue;
            };
            let position = object.position;
            let rotation = object.rotation_matrix();
            let Some(mesh) = object.mesh.as_mut() else {
                continue;
            };

            let markers = mesh.animate(delta_ticks);
            if !markers.is_empty() {
                let animation = mesh
                    .skeleton()
                    .and_then(Skeleton::animation)
                    .map(|animation| animation.name().to_string())
                    .unwrap_or_default();
                for marker in markers {
                    debug!("{} reached marker {} of {animation}", object.name, marker.name);
                    self.events.push(MarkerEvent {
                        object: object.name.clone(),
                        animation: animation.clone(),
                        marker: marker.name,
                        frame: marker.frame,
                    });
                }
            }

            self.renderer.draw_mesh(mesh, position, rotation, &self.textures);
            mesh.mark_bones_clean();
        }

        Some(self.renderer.end_frame(sink))
    }
}

fn build_camera(setup: &CameraSetup, world: &World) -> Result<Camera> {
    let angles = Vec3::new(
        setup.rotation.x.to_radians(),
        setup.rotation.y.to_radians(),
        setup.rotation.z.to_radians(),
    );
    let target = match &setup.target {
        Some(name) => Some(
            world
                .by_name(name)
                .and_then(|id| world.get(id))
                .map(|object| object.position)
                .ok_or_else(|| anyhow!("camera target {name} is not in the scene"))?,
        ),
        None => None,
    };

    let mut camera = Camera::new(setup.position);
    match setup.mode {
        CameraMode::Fixed => camera.set_fixed(setup.position, angles),
        CameraMode::FreeLook => camera.set_free_look(setup.position, angles),
        CameraMode::Follow => {
            let target = target.ok_or_else(|| anyhow!("follow camera needs a target"))?;
            camera.set_angles(angles);
            camera.set_follow(target, setup.offset, setup.distance);
            return Ok(camera);
        }
    }
    if let Some(target) = target {
        camera.look_at(target);
    }
    Ok(camera)
}

fn build_mesh(
    description: &MeshDescription,
    textures: &TextureAtlas,
    animations: &AnimationLibrary,
) -> Result<Mesh> {
    let mut mesh = match &description.source {
        MeshSource::Cube { half_extent } => Mesh::cube(*half_extent),
        MeshSource::Inline {
            vertices,
            faces,
            uvs,
            colours,
            ..
        } => Mesh::new(vertices.clone(), faces.clone())
            .with_uvs(uvs.clone())
            .with_colours(colours.clone()),
    };

    if let Some(name) = &description.texture {
        let handle = textures
            .handle(name)
            .ok_or_else(|| anyhow!("unknown texture {name}"))?;
        mesh = mesh.with_texture(handle);
    }

    if !description.skeleton.is_empty() {
        let bones = description
            .skeleton
            .iter()
            .enumerate()
            .map(|(index, bone)| {
                Ok(SkeletonBone::new(
                    u8::try_from(index)?,
                    bone.parent,
                    bone.position,
                    bone.rotation,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let skeleton = Skeleton::new(bones)?;

        // cubes have no per-vertex bindings and ride the root bone
        let bindings = match &description.source {
            MeshSource::Inline {
                bone_for_vertex, ..
            } => bone_for_vertex.clone(),
            MeshSource::Cube { .. } => vec![0; mesh.vertices.len()],
        };
        if let Some(bone) = bindings
            .iter()
            .find(|&&bone| usize::from(bone) >= skeleton.num_bones())
        {
            bail!(
                "vertex bound to bone {bone} but the skeleton has {} bones",
                skeleton.num_bones()
            );
        }
        mesh = mesh.with_skeleton(skeleton, bindings);
    }

    if let Some(name) = &description.animation {
        let animation = animations
            .get(name)
            .ok_or_else(|| anyhow!("unknown animation {name}"))?;
        mesh.skeleton_mut()
            .ok_or_else(|| anyhow!("animation {name} needs a skeleton"))?
            .set_animation(animation);
    }

    Ok(mesh)
}

/// Prints where every object ended up, plus its animation state.
pub fn print_final_state(world: &World) {
    println!("Final object states:");
    for object in world.iter() {
        let animation = object
            .mesh
            .as_ref()
            .and_then(Mesh::skeleton)
            .and_then(|skeleton| {
                let animation = skeleton.animation()?;
                Some(format!(
                    " anim={}@{}",
                    animation.name(),
                    skeleton.current_frame()
                ))
            })
            .unwrap_or_default();
        println!(
            " - {} pos=({:.2}, {:.2}, {:.2}) rot=({:.2}, {:.2}, {:.2}){animation}",
            object.name,
            object.position.x,
            object.position.y,
            object.position.z,
            object.rotation.x,
            object.rotation.y,
            object.rotation.z,
        );
    }
}
