use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat3, Vec2, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

/// Orbit pitch limit in follow mode.
const MAX_ORBIT_PITCH: f32 = 0.21 * PI;

/// World up. Screen Y grows downwards, so the world does too.
const WORLD_UP: Vec3 = Vec3::NEG_Y;

/// Source of the per-frame camera transform.
pub trait CameraProvider {
    fn position(&self) -> Vec3;

    /// World to camera rotation.
    fn rotation(&self) -> Mat3;

    fn inverse_rotation(&self) -> Mat3 {
        self.rotation().transpose()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Only moves when told to. Good for cutscenes.
    #[default]
    Fixed,
    /// Orbits a target at a distance and keeps looking at it.
    Follow,
    /// Angles driven by the player, clamped to the free look limits.
    FreeLook,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FollowTarget {
    position: Vec3,
    offset: Vec2,
    distance: f32,
}

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    /// Euler angles in radians.
    angles: Vec3,
    rotation: Mat3,
    mode: CameraMode,
    previous_mode: CameraMode,
    follow: Option<FollowTarget>,
    orbit_angles: Vec2,
    max_free_look: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            angles: Vec3::ZERO,
            rotation: Mat3::IDENTITY,
            mode: CameraMode::Fixed,
            previous_mode: CameraMode::Fixed,
            follow: None,
            orbit_angles: Vec2::ZERO,
            max_free_look: Vec3::splat(FRAC_PI_2),
        };
        camera.rebuild_rotation();
        camera
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn angles(&self) -> Vec3 {
        self.angles
    }

    pub fn orbit_angles(&self) -> Vec2 {
        self.orbit_angles
    }

    /// Direction the camera faces, in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation.row(2)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_angles(&mut self, angles: Vec3) {
        self.angles = angles;
        self.rebuild_rotation();
    }

    pub fn set_fixed(&mut self, position: Vec3, angles: Vec3) {
        self.previous_mode = self.mode;
        self.mode = CameraMode::Fixed;
        self.position = position;
        self.set_angles(angles);
    }

    /// Returns to the mode active before [`Camera::set_fixed`].
    pub fn clear_fixed(&mut self) {
        self.mode = self.previous_mode;
    }

    pub fn set_follow(&mut self, target: Vec3, offset: Vec2, distance: f32) {
        self.follow = Some(FollowTarget {
            position: target,
            offset,
            distance,
        });
        self.mode = CameraMode::Follow;
    }

    /// Moves the followed point. Ignored when nothing is being followed.
    pub fn set_follow_target(&mut self, target: Vec3) {
        if let Some(follow) = &mut self.follow {
            follow.position = target;
        }
    }

    pub fn follow_target(&self) -> Option<Vec3> {
        self.follow.map(|follow| follow.position)
    }

    pub fn clear_follow(&mut self) {
        self.follow = None;
        self.mode = CameraMode::Fixed;
    }

    pub fn set_free_look(&mut self, position: Vec3, angles: Vec3) {
        self.mode = CameraMode::FreeLook;
        self.position = position;
        self.set_angles(angles);
    }

    pub fn set_free_look_max_angles(&mut self, max_angles: Vec3) {
        self.max_free_look = max_angles.abs();
    }

    pub fn clear_free_look(&mut self) {
        self.mode = CameraMode::Fixed;
    }

    /// Per-frame update. Only follow mode moves on its own.
    pub fn process(&mut self, _delta_ticks: u32) {
        if self.mode != CameraMode::Follow {
            return;
        }
        let Some(follow) = self.follow else {
            return;
        };
        self.position = self.orbit_position(&follow);
        self.look_at(follow.position);
    }

    /// Aims the camera at `target`. Leaves the rotation alone when the target
    /// is on the camera or straight above or below it.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(forward) = (target - self.position).try_normalize() else {
            return;
        };
        let Some(right) = forward.cross(WORLD_UP).try_normalize() else {
            return;
        };
        let down = forward.cross(right);
        self.rotation = Mat3::from_cols(right, down, forward).transpose();
    }

    /// Turns the free look angles, scaled by `delta_ticks` and clamped.
    pub fn update_angles(&mut self, delta: Vec3, delta_ticks: u32) {
        let ticks = delta_ticks as f32;
        let max = self.max_free_look;
        self.angles = Vec3::new(
            (self.angles.x - delta.x * ticks).clamp(-max.x, max.x),
            (self.angles.y + delta.y * ticks).clamp(-max.y, max.y),
            (self.angles.z + delta.z * ticks).clamp(-max.z, max.z),
        );
        self.rebuild_rotation();
    }

    /// Moves around the followed target. Yaw wraps so the player can circle
    /// all the way round.
    pub fn update_orbit_angles(&mut self, delta: Vec2, delta_ticks: u32) {
        if self.mode != CameraMode::Follow {
            return;
        }
        let ticks = delta_ticks as f32;
        let pitch = (self.orbit_angles.x - delta.x * ticks).clamp(-MAX_ORBIT_PITCH, MAX_ORBIT_PITCH);
        let mut yaw = (self.orbit_angles.y + delta.y * ticks).clamp(-PI, PI);
        if yaw.abs() >= PI {
            debug!("orbit yaw wrapped at {yaw}");
            yaw = -yaw;
        }
        self.orbit_angles = Vec2::new(pitch, yaw);
    }

    fn orbit_position(&self, follow: &FollowTarget) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.orbit_angles.x.sin_cos();
        let (sin_yaw, cos_yaw) = self.orbit_angles.y.sin_cos();
        let Some(forward) = Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw).try_normalize()
        else {
            return follow.position;
        };
        let Some(right) = forward.cross(WORLD_UP).try_normalize() else {
            return follow.position;
        };
        let up = right.cross(forward);
        follow.position - forward * follow.distance + right * follow.offset.x + up * follow.offset.y
    }

    fn rebuild_rotation(&mut self) {
        self.rotation = Mat3::from_rotation_y(self.angles.y)
            * Mat3::from_rotation_x(self.angles.x)
            * Mat3::from_rotation_z(self.angles.z);
    }
}

impl CameraProvider for Camera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Mat3 {
        self.rotation
    }
}
