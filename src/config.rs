use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::clip::Rect;
use crate::error::ConfigError;
use crate::fragment::Colour;

/// Average depth is a 16-bit value, so no table can be addressed past this.
pub const MAX_ORDERING_TABLE_SIZE: usize = 1 << 16;

/// Renderer tunables, read from the `<renderer>` element of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_ordering_table_size")]
    pub ordering_table_size: usize,
    /// Fragments each buffer slot can hold per frame.
    #[serde(default = "default_fragment_capacity")]
    pub fragment_capacity: usize,
    #[serde(default = "default_screen")]
    pub screen: Rect,
    /// Distance from the eye to the projection plane, in pixels.
    #[serde(default = "default_projection_distance")]
    pub projection_distance: f32,
    /// Screen position of the optical axis.
    #[serde(default = "default_screen_offset")]
    pub screen_offset: Vec2,
    /// View depth mapped onto the whole ordering table.
    #[serde(default = "default_depth_range")]
    pub depth_range: f32,
    #[serde(default = "default_background")]
    pub background: Colour,
    /// Draw a line from every bone to its parent.
    #[serde(default)]
    pub debug_bones: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ordering_table_size: default_ordering_table_size(),
            fragment_capacity: default_fragment_capacity(),
            screen: default_screen(),
            projection_distance: default_projection_distance(),
            screen_offset: default_screen_offset(),
            depth_range: default_depth_range(),
            background: default_background(),
            debug_bones: false,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ordering_table_size == 0 || self.ordering_table_size > MAX_ORDERING_TABLE_SIZE {
            return Err(ConfigError::TableSize {
                value: self.ordering_table_size,
                max: MAX_ORDERING_TABLE_SIZE,
            });
        }
        if self.fragment_capacity == 0 {
            return Err(ConfigError::FragmentCapacity);
        }
        if self.screen.width <= 0 || self.screen.height <= 0 {
            return Err(ConfigError::ScreenSize {
                width: self.screen.width,
                height: self.screen.height,
            });
        }
        if !(self.projection_distance.is_finite() && self.projection_distance > 0.0) {
            return Err(ConfigError::ProjectionDistance(self.projection_distance));
        }
        if !(self.depth_range.is_finite() && self.depth_range > 0.0) {
            return Err(ConfigError::DepthRange(self.depth_range));
        }
        Ok(())
    }
}

fn default_ordering_table_size() -> usize {
    1024
}

fn default_fragment_capacity() -> usize {
    1024
}

fn default_screen() -> Rect {
    Rect::new(0, 0, 320, 240)
}

fn default_projection_distance() -> f32 {
    120.0
}

fn default_screen_offset() -> Vec2 {
    Vec2::new(160.0, 120.0)
}

fn default_depth_range() -> f32 {
    1.0
}

fn default_background() -> Colour {
    Colour::new(63, 63, 63)
}
