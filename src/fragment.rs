use bytemuck::{Pod, Zeroable};
use log::trace;
use serde::{Deserialize, Serialize};

/// Projected vertex in screen pixels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i16,
    pub y: i16,
}

impl ScreenPoint {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    /// Unlit vertex colour; texels are drawn unmodulated.
    pub const NEUTRAL: Self = Self::new(128, 128, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Texel coordinate inside a texture page.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct TexCoord {
    pub u: u8,
    pub v: u8,
}

impl TexCoord {
    pub const fn new(u: u8, v: u8) -> Self {
        Self { u, v }
    }
}

pub const QUAD_FLAG_TEXTURED: u16 = 1;
pub const QUAD_FLAG_CLUT: u16 = 1 << 1;

/// Gouraud shaded, optionally textured quad. Points follow the hardware
/// order: `A B` on the first edge, `C D` on the opposite one.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct QuadPrimitive {
    pub points: [ScreenPoint; 4],
    pub colours: [Colour; 4],
    pub uvs: [TexCoord; 4],
    pub tpage: u16,
    pub clut: u16,
    pub flags: u16,
}

impl QuadPrimitive {
    pub fn is_textured(&self) -> bool {
        self.flags & QUAD_FLAG_TEXTURED != 0
    }

    pub fn has_clut(&self) -> bool {
        self.flags & QUAD_FLAG_CLUT != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct LinePrimitive {
    pub points: [ScreenPoint; 2],
    pub colours: [Colour; 2],
}

/// Anything the compositor can sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Quad(QuadPrimitive),
    Line(LinePrimitive),
}

impl Primitive {
    /// Tag written ahead of the primitive in a packet stream.
    pub fn packet_tag(&self) -> u8 {
        match self {
            Self::Quad(_) => 0x3c,
            Self::Line(_) => 0x50,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Quad(quad) => bytemuck::bytes_of(quad),
            Self::Line(line) => bytemuck::bytes_of(line),
        }
    }
}

/// Handle to a fragment stored in a [`FragmentPool`].
///
/// Ids remember the pool generation they were issued in, so an id held past
/// a [`FragmentPool::reset`] no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId {
    index: u32,
    epoch: u32,
}

impl FragmentId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    primitive: Primitive,
    next: Option<FragmentId>,
}

/// Fixed capacity bump allocator for one frame's fragments.
#[derive(Debug, Clone)]
pub struct FragmentPool {
    fragments: Vec<Fragment>,
    capacity: usize,
    epoch: u32,
}

impl FragmentPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fragments: Vec::with_capacity(capacity),
            capacity,
            epoch: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.fragments.len()
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Stores `primitive`, or returns `None` once the pool is full.
    pub fn allocate(&mut self, primitive: Primitive) -> Option<FragmentId> {
        if self.fragments.len() >= self.capacity {
            return None;
        }
        let index = u32::try_from(self.fragments.len()).ok()?;
        self.fragments.push(Fragment {
            primitive,
            next: None,
        });
        Some(FragmentId {
            index,
            epoch: self.epoch,
        })
    }

    pub fn get(&self, id: FragmentId) -> Option<&Primitive> {
        self.fragment(id).map(|fragment| &fragment.primitive)
    }

    /// Drops every fragment and invalidates all outstanding ids.
    pub fn reset(&mut self) {
        trace!("fragment pool reset with {} live fragments", self.fragments.len());
        self.fragments.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub(crate) fn next(&self, id: FragmentId) -> Option<FragmentId> {
        self.fragment(id).and_then(|fragment| fragment.next)
    }

    pub(crate) fn link(&mut self, id: FragmentId, next: Option<FragmentId>) -> bool {
        if id.epoch != self.epoch {
            return false;
        }
        match self.fragments.get_mut(id.index()) {
            Some(fragment) => {
                fragment.next = next;
                true
            }
            None => false,
        }
    }

    fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        if id.epoch != self.epoch {
            return None;
        }
        self.fragments.get(id.index())
    }
}
