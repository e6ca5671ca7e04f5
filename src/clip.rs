//! Off-screen rejection for projected polygons.
//!
//! Only the Cohen-Sutherland region codes are used, no geometry is cut. A
//! polygon is dropped when every tested pair of its vertices lies beyond a
//! common screen edge. Quads also test both diagonals, otherwise a quad seen
//! from up close (all four edges off-screen while it covers the screen) would
//! be culled.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::fragment::ScreenPoint;

/// Screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: i16,
    pub height: i16,
}

impl Rect {
    pub const fn new(x: i16, y: i16, width: i16, height: i16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn right(&self) -> i32 {
        i32::from(self.x) + i32::from(self.width) - 1
    }

    fn bottom(&self) -> i32 {
        i32::from(self.y) + i32::from(self.height) - 1
    }
}

/// 4-bit region code of a point relative to a [`Rect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Outcode(u8);

impl Outcode {
    pub const INSIDE: Self = Self(0);
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);
    pub const TOP: Self = Self(4);
    pub const BOTTOM: Self = Self(8);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_inside(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Outcode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Outcode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Outcode {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// The last column and row of `rect` already count as outside.
pub fn outcode(rect: &Rect, point: ScreenPoint) -> Outcode {
    let (x, y) = (i32::from(point.x), i32::from(point.y));
    let mut code = Outcode::INSIDE;
    if x < i32::from(rect.x) {
        code |= Outcode::LEFT;
    }
    if x >= rect.right() {
        code |= Outcode::RIGHT;
    }
    if y < i32::from(rect.y) {
        code |= Outcode::TOP;
    }
    if y >= rect.bottom() {
        code |= Outcode::BOTTOM;
    }
    code
}

fn share_outside_edge(a: Outcode, b: Outcode) -> bool {
    !(a & b).is_inside()
}

/// True when the quad is certainly off-screen. Tests the four edges and both
/// diagonals.
pub fn quad_clip(rect: &Rect, points: &[ScreenPoint; 4]) -> bool {
    let c = points.map(|point| outcode(rect, point));
    [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3)]
        .iter()
        .all(|&(a, b)| share_outside_edge(c[a], c[b]))
}

/// True when the triangle is certainly off-screen.
pub fn tri_clip(rect: &Rect, points: &[ScreenPoint; 3]) -> bool {
    let c = points.map(|point| outcode(rect, point));
    [(0, 1), (1, 2), (2, 0)]
        .iter()
        .all(|&(a, b)| share_outside_edge(c[a], c[b]))
}

/// True when the segment is certainly off-screen.
pub fn line_clip(rect: &Rect, points: &[ScreenPoint; 2]) -> bool {
    share_outside_edge(outcode(rect, points[0]), outcode(rect, points[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Rect = Rect::new(0, 0, 320, 240);

    fn p(x: i16, y: i16) -> ScreenPoint {
        ScreenPoint::new(x, y)
    }

    #[test]
    fn outcode_regions() {
        assert!(outcode(&SCREEN, p(10, 10)).is_inside());
        assert_eq!(outcode(&SCREEN, p(-1, 10)), Outcode::LEFT);
        assert_eq!(outcode(&SCREEN, p(319, 10)), Outcode::RIGHT);
        assert_eq!(outcode(&SCREEN, p(318, 10)), Outcode::INSIDE);
        assert_eq!(outcode(&SCREEN, p(10, -5)), Outcode::TOP);
        assert_eq!(outcode(&SCREEN, p(10, 239)), Outcode::BOTTOM);
        assert_eq!(outcode(&SCREEN, p(-3, 400)), Outcode::LEFT | Outcode::BOTTOM);
    }

    #[test]
    fn outcode_uses_signed_coordinates() {
        let code = outcode(&SCREEN, p(-1000, -1000));
        assert!(code.contains(Outcode::LEFT));
        assert!(code.contains(Outcode::TOP));
        assert!(!code.contains(Outcode::RIGHT));
    }

    #[test]
    fn quad_with_a_vertex_inside_is_kept() {
        let quad = [p(-50, -50), p(10, -50), p(-50, 10), p(20, 20)];
        assert!(!quad_clip(&SCREEN, &quad));
    }

    #[test]
    fn quad_beyond_one_edge_is_rejected() {
        let quad = [p(-50, 0), p(-10, 0), p(-50, 200), p(-10, 200)];
        assert!(quad_clip(&SCREEN, &quad));
        let below = [p(0, 300), p(100, 300), p(0, 400), p(100, 400)];
        assert!(quad_clip(&SCREEN, &below));
    }

    #[test]
    fn quad_covering_the_screen_is_kept() {
        // every vertex is outside and every edge misses the screen
        let quad = [p(-100, -100), p(500, -100), p(-100, 500), p(500, 500)];
        assert!(!quad_clip(&SCREEN, &quad));
    }

    #[test]
    fn quad_across_a_corner_is_kept() {
        let quad = [p(-40, 100), p(100, -40), p(-40, -40), p(100, 100)];
        assert!(!quad_clip(&SCREEN, &quad));
    }

    #[test]
    fn triangle_clip() {
        assert!(tri_clip(&SCREEN, &[p(400, 0), p(500, 10), p(450, 100)]));
        assert!(!tri_clip(&SCREEN, &[p(400, 0), p(100, 10), p(450, 100)]));
    }

    #[test]
    fn line_clip_rejects_only_shared_edges() {
        assert!(line_clip(&SCREEN, &[p(-5, 10), p(-1, 200)]));
        assert!(!line_clip(&SCREEN, &[p(-5, 10), p(400, 10)]));
    }

    #[test]
    fn offset_screen_rectangle() {
        let rect = Rect::new(100, 50, 64, 64);
        assert_eq!(outcode(&rect, p(99, 60)), Outcode::LEFT);
        assert!(outcode(&rect, p(100, 50)).is_inside());
        assert_eq!(outcode(&rect, p(163, 60)), Outcode::RIGHT);
    }
}
