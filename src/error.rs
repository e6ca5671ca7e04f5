use thiserror::Error;

/// Problems detected while assembling a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkeletonError {
    #[error("skeleton has {count} bones but at most {max} are supported")]
    TooManyBones { count: usize, max: usize },
    #[error("bone {bone} names parent {parent}, parents must be stored before their children")]
    ParentAfterChild { bone: usize, parent: usize },
}

/// Problems detected while assembling an animation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimationError {
    #[error("animation name must not be empty")]
    MissingName,
    #[error("animation {name} has a length of zero frames")]
    ZeroLength { name: String },
    #[error("animation {name} has {count} tracks but at most {max} are supported")]
    TooManyTracks { name: String, count: usize, max: usize },
    #[error("animation {name} has {count} markers but at most {max} are supported")]
    TooManyMarkers { name: String, count: usize, max: usize },
    #[error("track for joint {joint} has {count} keys but at most {max} are supported")]
    TooManyKeys { joint: u8, count: usize, max: usize },
    #[error("track for joint {joint} has key at frame {frame} after a later key")]
    KeysOutOfOrder { joint: u8, frame: u32 },
    #[error("track for joint {joint} mixes rotation and translation keys (frame {frame})")]
    MismatchedKey { joint: u8, frame: u32 },
}

/// Invalid renderer configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("ordering table size must be between 1 and {max}, got {value}")]
    TableSize { value: usize, max: usize },
    #[error("fragment capacity must be at least 1")]
    FragmentCapacity,
    #[error("screen rectangle must have a positive size, got {width}x{height}")]
    ScreenSize { width: i16, height: i16 },
    #[error("projection distance must be positive, got {0}")]
    ProjectionDistance(f32),
    #[error("depth range must be positive, got {0}")]
    DepthRange(f32),
}
