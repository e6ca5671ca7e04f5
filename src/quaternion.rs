use std::ops::{Mul, Neg};

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Scale of the signed 4.12 fixed-point values produced by the asset tools.
pub const FIXED_ONE: f32 = 4096.0;

/// Squared magnitudes at or below this are treated as a zero quaternion.
const NORMALIZE_EPSILON: f32 = 1e-12;

/// Rotation stored as `{w, x, y, z}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Builds a quaternion from raw 4.12 fixed-point components.
    pub fn from_fixed(w: i16, x: i16, y: i16, z: i16) -> Self {
        Self::new(
            f32::from(w) / FIXED_ONE,
            f32::from(x) / FIXED_ONE,
            f32::from(y) / FIXED_ONE,
            f32::from(z) / FIXED_ONE,
        )
    }

    /// Rotation of `angle` radians about `axis`. A zero axis yields identity.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return Self::IDENTITY;
        }
        let (sin, cos) = (angle * 0.5).sin_cos();
        Self::new(cos, axis.x * sin, axis.y * sin, axis.z * sin)
    }

    /// Pitch about X followed by yaw about Y, both in radians. Roll is always zero.
    pub fn from_euler(pitch: f32, yaw: f32) -> Self {
        let (sin_pitch, cos_pitch) = (pitch * 0.5).sin_cos();
        let (sin_yaw, cos_yaw) = (yaw * 0.5).sin_cos();
        Self::new(
            cos_pitch * cos_yaw,
            sin_pitch * cos_yaw,
            cos_pitch * sin_yaw,
            -sin_pitch * sin_yaw,
        )
    }

    pub fn dot(self, other: Self) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Scales to unit length in place. A (near) zero quaternion becomes identity.
    pub fn normalize(&mut self) {
        let length_squared = self.length_squared();
        if !length_squared.is_finite() || length_squared <= NORMALIZE_EPSILON {
            *self = Self::IDENTITY;
            return;
        }
        let scale = length_squared.sqrt().recip();
        self.w *= scale;
        self.x *= scale;
        self.y *= scale;
        self.z *= scale;
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Converts a unit quaternion into its rotation matrix.
    pub fn to_rotation_matrix(self) -> Mat3 {
        let Self { w, x, y, z } = self;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        Mat3::from_cols(
            Vec3::new(1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy)),
            Vec3::new(2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx)),
            Vec3::new(2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy)),
        )
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        self.to_rotation_matrix() * v
    }

    /// Normalized linear blend from `self` towards `other` by `t`.
    ///
    /// Takes the shorter arc, then lerps the four components and renormalizes.
    /// This is not a great-circle slerp: it is only accurate for the small
    /// angular steps between neighbouring keyframes, and existing animation
    /// content depends on exactly this result.
    pub fn blend(self, other: Self, t: f32) -> Self {
        let other = if self.dot(other) < 0.0 {
            Self::new(-other.w, -other.x, -other.y, -other.z)
        } else {
            other
        };

        let keep = 1.0 - t;
        Self::new(
            keep * self.w + t * other.w,
            keep * self.x + t * other.x,
            keep * self.y + t * other.y,
            keep * self.z + t * other.z,
        )
        .normalized()
    }
}

impl Mul for Quaternion {
    type Output = Self;

    /// Hamilton product.
    fn mul(self, rhs: Self) -> Self {
        let (a, b) = (self, rhs);
        Self::new(
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        )
    }
}

impl Neg for Quaternion {
    type Output = Self;

    /// Conjugate: flips the vector part only, which inverts a unit quaternion.
    fn neg(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }
}
