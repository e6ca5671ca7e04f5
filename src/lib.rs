//! Core of the Madnight runtime: a fixed-function, PS1 style renderer with
//! skeletal animation.
//!
//! Meshes are rigidly skinned on the CPU, projected with a pinhole model into
//! integer screen space and depth sorted through an ordering table. Finished
//! frames are handed to a [`DisplaySink`], so the crate runs headless and the
//! hardware or window backend stays outside of it.

pub mod animation;
pub mod app;
pub mod camera;
pub mod clip;
pub mod config;
pub mod display;
pub mod error;
pub mod fragment;
pub mod mesh;
pub mod ordering_table;
pub mod playback;
pub mod quaternion;
pub mod renderer;
pub mod scene;
pub mod skeleton;
pub mod texture;
pub mod transform;
pub mod world;

pub use animation::{Animation, AnimationLibrary, Key, Marker, Track, TrackKind};
pub use app::{App, MarkerEvent};
pub use camera::{Camera, CameraMode, CameraProvider};
pub use clip::{Outcode, Rect};
pub use config::RendererConfig;
pub use display::{CommandRecorder, DisplaySink, RecordedFrame};
pub use error::{AnimationError, ConfigError, SkeletonError};
pub use fragment::{Colour, FragmentPool, Primitive, QuadPrimitive, ScreenPoint, TexCoord};
pub use mesh::{Face, Mesh};
pub use ordering_table::{FrameSlot, OrderingTable};
pub use quaternion::Quaternion;
pub use renderer::{FrameStats, Renderer};
pub use scene::{Scene, SceneObject};
pub use skeleton::{Skeleton, SkeletonBone};
pub use texture::{TextureAtlas, TextureHandle, TexturePage, TextureProvider};
pub use transform::{FrameCamera, Projector};
pub use world::{GameObject, ObjectId, World};
