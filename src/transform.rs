//! Object to screen transform.
//!
//! Faces go through the same steps the geometry coprocessor performs: the
//! first three vertices are projected together and tested for winding, the
//! fourth is projected on its own, then the average depth picks an ordering
//! table bucket and the screen clipper has the last word.

use glam::{Mat3, Vec2, Vec3};

use crate::camera::CameraProvider;
use crate::clip::{line_clip, quad_clip, Rect};
use crate::config::RendererConfig;
use crate::fragment::ScreenPoint;

/// Vertices closer than one 4.12 fixed-point unit are treated as behind the eye.
pub const NEAR_PLANE: f32 = 1.0 / 4096.0;

/// Projected coordinates saturate to the hardware's 11-bit signed range.
const SCREEN_LIMIT: f32 = 1023.0;

/// Camera transform shared by every object in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCamera {
    rotation: Mat3,
    /// `rotation * -camera_position`.
    offset: Vec3,
}

impl FrameCamera {
    pub fn new(position: Vec3, rotation: Mat3) -> Self {
        Self {
            rotation,
            offset: rotation * -position,
        }
    }

    pub fn from_provider(camera: &dyn CameraProvider) -> Self {
        Self::new(camera.position(), camera.rotation())
    }

    pub fn rotation(&self) -> Mat3 {
        self.rotation
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Camera-relative transform of an object placed at `position`.
    pub fn object_transform(&self, position: Vec3, rotation: Mat3) -> ViewTransform {
        ViewTransform {
            rotation: self.rotation * rotation,
            translation: self.rotation * position + self.offset,
        }
    }
}

/// Model to view space transform of one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl ViewTransform {
    pub fn apply(&self, vertex: Vec3) -> Vec3 {
        self.rotation * vertex + self.translation
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub point: ScreenPoint,
    /// View-space depth.
    pub depth: f32,
}

/// Why a face did not make it to the ordering table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    BehindCamera,
    BackFacing,
    OutOfDepth,
    OffScreen,
}

/// Screen-space quad ready to be stored in bucket `bucket`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedQuad {
    pub points: [ScreenPoint; 4],
    pub bucket: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedLine {
    pub points: [ScreenPoint; 2],
    pub bucket: usize,
}

/// Signed doubled area of the projected triangle. Positive when the
/// vertices run clockwise on screen, which is the side facing the camera.
pub fn winding(points: &[ScreenPoint; 3]) -> i32 {
    let [p0, p1, p2] = points.map(|p| (i32::from(p.x), i32::from(p.y)));
    p0.0 * p1.1 + p1.0 * p2.1 + p2.0 * p0.1 - p0.0 * p2.1 - p1.0 * p0.1 - p2.0 * p1.1
}

/// Perspective projection plus the per-face accept tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    screen: Rect,
    distance: f32,
    offset: Vec2,
    depth_range: f32,
    table_size: usize,
}

impl Projector {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            screen: config.screen,
            distance: config.projection_distance,
            offset: config.screen_offset,
            depth_range: config.depth_range,
            table_size: config.ordering_table_size,
        }
    }

    pub fn screen(&self) -> &Rect {
        &self.screen
    }

    /// Projects one view-space point, `None` when it is not in front of the eye.
    pub fn project(&self, view: Vec3) -> Option<Projected> {
        if !(view.z > NEAR_PLANE) {
            return None;
        }
        let scale = self.distance / view.z;
        let x = (self.offset.x + view.x * scale).clamp(-SCREEN_LIMIT - 1.0, SCREEN_LIMIT);
        let y = (self.offset.y + view.y * scale).clamp(-SCREEN_LIMIT - 1.0, SCREEN_LIMIT);
        Some(Projected {
            point: ScreenPoint::new(x.round() as i16, y.round() as i16),
            depth: view.z,
        })
    }

    pub fn project_triple(
        &self,
        transform: &ViewTransform,
        vertices: [Vec3; 3],
    ) -> Option<[Projected; 3]> {
        let [a, b, c] = vertices.map(|vertex| self.project(transform.apply(vertex)));
        Some([a?, b?, c?])
    }

    /// Ordering table bucket for the mean of `depths`. Bucket 0 is nearest.
    pub fn depth_bucket(&self, depths: &[f32]) -> Option<usize> {
        if depths.is_empty() {
            return None;
        }
        let average = depths.iter().sum::<f32>() / depths.len() as f32;
        let bucket = (average / self.depth_range * self.table_size as f32).round();
        if !(bucket >= 0.0 && bucket < self.table_size as f32) {
            return None;
        }
        Some(bucket as usize)
    }

    /// Runs one quad face through projection, culling and clipping.
    pub fn transform_quad(
        &self,
        transform: &ViewTransform,
        vertices: [Vec3; 4],
    ) -> Result<ProjectedQuad, Rejection> {
        let [a, b, c] = self
            .project_triple(transform, [vertices[0], vertices[1], vertices[2]])
            .ok_or(Rejection::BehindCamera)?;
        if winding(&[a.point, b.point, c.point]) <= 0 {
            return Err(Rejection::BackFacing);
        }

        let d = self
            .project(transform.apply(vertices[3]))
            .ok_or(Rejection::BehindCamera)?;
        let bucket = self
            .depth_bucket(&[a.depth, b.depth, c.depth, d.depth])
            .ok_or(Rejection::OutOfDepth)?;

        let points = [a.point, b.point, c.point, d.point];
        if quad_clip(&self.screen, &points) {
            return Err(Rejection::OffScreen);
        }
        Ok(ProjectedQuad { points, bucket })
    }

    /// Projects a segment given in view space.
    pub fn transform_line(&self, from: Vec3, to: Vec3) -> Result<ProjectedLine, Rejection> {
        let a = self.project(from).ok_or(Rejection::BehindCamera)?;
        let b = self.project(to).ok_or(Rejection::BehindCamera)?;
        let bucket = self
            .depth_bucket(&[a.depth, b.depth])
            .ok_or(Rejection::OutOfDepth)?;
        let points = [a.point, b.point];
        if line_clip(&self.screen, &points) {
            return Err(Rejection::OffScreen);
        }
        Ok(ProjectedLine { points, bucket })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projector() -> Projector {
        Projector::new(&RendererConfig {
            depth_range: 16.0,
            ..RendererConfig::default()
        })
    }

    fn at(z: f32) -> ViewTransform {
        FrameCamera::new(Vec3::ZERO, Mat3::IDENTITY)
            .object_transform(Vec3::new(0.0, 0.0, z), Mat3::IDENTITY)
    }

    /// Unit quad facing the default camera, corners in hardware order.
    fn facing_quad(half: f32) -> [Vec3; 4] {
        [
            Vec3::new(-half, -half, 0.0),
            Vec3::new(half, -half, 0.0),
            Vec3::new(-half, half, 0.0),
            Vec3::new(half, half, 0.0),
        ]
    }

    #[test]
    fn camera_offset_is_rotated_negative_position() {
        let rotation = Mat3::from_rotation_y(0.7);
        let camera = FrameCamera::new(Vec3::new(1.0, 2.0, 3.0), rotation);
        let offset = camera.offset();
        assert!((offset - rotation * Vec3::new(-1.0, -2.0, -3.0)).length() < 1e-6);
    }

    #[test]
    fn object_transform_is_camera_relative() {
        let rotation = Mat3::from_rotation_y(0.4);
        let camera = FrameCamera::new(Vec3::new(0.5, 0.0, -2.0), rotation);
        let object_rotation = Mat3::from_rotation_x(0.3);
        let transform = camera.object_transform(Vec3::new(1.0, 1.0, 1.0), object_rotation);
        let expected = rotation * (Vec3::new(1.0, 1.0, 1.0) - Vec3::new(0.5, 0.0, -2.0));
        assert!((transform.translation - expected).length() < 1e-5);
        assert_eq!(transform.rotation, rotation * object_rotation);
    }

    #[test]
    fn projection_centres_the_optical_axis() {
        let projected = projector().project(Vec3::new(0.0, 0.0, 4.0)).unwrap();
        assert_eq!(projected.point, ScreenPoint::new(160, 120));
        let projected = projector().project(Vec3::new(1.0, -1.0, 2.0)).unwrap();
        assert_eq!(projected.point, ScreenPoint::new(220, 60));
    }

    #[test]
    fn points_behind_the_eye_are_not_projected() {
        assert!(projector().project(Vec3::new(0.0, 0.0, 0.0)).is_none());
        assert!(projector().project(Vec3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn projection_saturates() {
        let projected = projector().project(Vec3::new(1000.0, 0.0, 0.01)).unwrap();
        assert_eq!(projected.point.x, 1023);
    }

    #[test]
    fn winding_sign_follows_screen_order() {
        let clockwise = [ScreenPoint::new(0, 0), ScreenPoint::new(10, 0), ScreenPoint::new(0, 10)];
        let counter = [ScreenPoint::new(0, 0), ScreenPoint::new(0, 10), ScreenPoint::new(10, 0)];
        assert_eq!(winding(&clockwise), 100);
        assert_eq!(winding(&counter), -100);
        let degenerate = [ScreenPoint::new(0, 0), ScreenPoint::new(5, 5), ScreenPoint::new(10, 10)];
        assert_eq!(winding(&degenerate), 0);
    }

    #[test]
    fn depth_bucket_range() {
        let projector = projector();
        assert_eq!(projector.depth_bucket(&[0.0; 4]), Some(0));
        assert_eq!(projector.depth_bucket(&[8.0; 4]), Some(512));
        assert_eq!(projector.depth_bucket(&[15.99; 4]), Some(1023));
        assert_eq!(projector.depth_bucket(&[16.0; 4]), None);
        assert_eq!(projector.depth_bucket(&[-1.0; 4]), None);
        assert_eq!(projector.depth_bucket(&[]), None);
    }

    #[test]
    fn facing_quad_is_accepted() {
        let quad = projector().transform_quad(&at(4.0), facing_quad(1.0)).unwrap();
        assert_eq!(quad.bucket, 256);
        assert_eq!(quad.points[0], ScreenPoint::new(130, 90));
        assert_eq!(quad.points[3], ScreenPoint::new(190, 150));
    }

    #[test]
    fn reversed_quad_is_back_facing() {
        let [a, b, c, d] = facing_quad(1.0);
        let result = projector().transform_quad(&at(4.0), [b, a, d, c]);
        assert_eq!(result, Err(Rejection::BackFacing));
    }

    #[test]
    fn quad_through_the_eye_is_behind_camera() {
        let result = projector().transform_quad(&at(0.5), facing_quad(1.0).map(|v| v - Vec3::Z));
        assert_eq!(result, Err(Rejection::BehindCamera));
    }

    #[test]
    fn distant_quad_is_out_of_depth() {
        let result = projector().transform_quad(&at(20.0), facing_quad(1.0));
        assert_eq!(result, Err(Rejection::OutOfDepth));
    }

    #[test]
    fn quad_beside_the_screen_is_clipped() {
        let transform = FrameCamera::new(Vec3::ZERO, Mat3::IDENTITY)
            .object_transform(Vec3::new(12.0, 0.0, 4.0), Mat3::IDENTITY);
        let result = projector().transform_quad(&transform, facing_quad(1.0));
        assert_eq!(result, Err(Rejection::OffScreen));
    }

    #[test]
    fn nearer_faces_get_lower_buckets() {
        let projector = projector();
        let near = projector.transform_quad(&at(2.0), facing_quad(0.5)).unwrap();
        let far = projector.transform_quad(&at(6.0), facing_quad(0.5)).unwrap();
        assert!(near.bucket < far.bucket);
    }

    #[test]
    fn line_projection() {
        let projector = projector();
        let line = projector
            .transform_line(Vec3::new(0.0, 0.0, 4.0), Vec3::new(0.0, 1.0, 4.0))
            .unwrap();
        assert_eq!(line.points, [ScreenPoint::new(160, 120), ScreenPoint::new(160, 150)]);
        assert_eq!(line.bucket, 256);
        assert_eq!(
            projector.transform_line(Vec3::new(0.0, 0.0, -1.0), Vec3::Z),
            Err(Rejection::BehindCamera)
        );
    }
}
