use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::AnimationError;
use crate::quaternion::Quaternion;

pub const MAX_TRACKS: usize = 50;
pub const MAX_KEYS: usize = 256;
pub const MAX_MARKERS: usize = 16;

/// Bit 0 of [`Animation::flags`]: restart from frame 0 after the last frame.
pub const ANIMATION_FLAG_LOOP: u32 = 1;

/// What a track drives on its joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Rotation,
    /// Stored for completeness; playback never applies translation keys.
    Translation,
}

/// Keyframe payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KeyValue {
    Rotation(Quaternion),
    Translation(Vec3),
}

impl KeyValue {
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Rotation(_) => TrackKind::Rotation,
            Self::Translation(_) => TrackKind::Translation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub frame: u32,
    pub value: KeyValue,
}

impl Key {
    pub fn rotation(frame: u32, rotation: Quaternion) -> Self {
        Self {
            frame,
            value: KeyValue::Rotation(rotation),
        }
    }

    pub fn translation(frame: u32, translation: Vec3) -> Self {
        Self {
            frame,
            value: KeyValue::Translation(translation),
        }
    }
}

/// Keys for a single joint, sorted by frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    joint_id: u8,
    kind: TrackKind,
    keys: Vec<Key>,
}

impl Track {
    pub fn new(joint_id: u8, kind: TrackKind, keys: Vec<Key>) -> Result<Self, AnimationError> {
        if keys.len() > MAX_KEYS {
            return Err(AnimationError::TooManyKeys {
                joint: joint_id,
                count: keys.len(),
                max: MAX_KEYS,
            });
        }
        let mut previous = 0;
        for key in &keys {
            if key.value.kind() != kind {
                return Err(AnimationError::MismatchedKey {
                    joint: joint_id,
                    frame: key.frame,
                });
            }
            if key.frame < previous {
                return Err(AnimationError::KeysOutOfOrder {
                    joint: joint_id,
                    frame: key.frame,
                });
            }
            previous = key.frame;
        }
        Ok(Self {
            joint_id,
            kind,
            keys,
        })
    }

    pub fn joint_id(&self) -> u8 {
        self.joint_id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Finds the keys surrounding `frame` and the blend factor between them.
    ///
    /// Past the last key (or before the first) both keys are the nearest end
    /// key and the factor is zero, so the pose holds instead of extrapolating.
    pub fn bracket(&self, frame: u32) -> Option<(&Key, &Key, f32)> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame >= last.frame {
            return Some((last, last, 0.0));
        }
        if frame < first.frame {
            return Some((first, first, 0.0));
        }

        // first index whose frame is strictly greater than `frame`
        let next_index = self.keys.partition_point(|key| key.frame <= frame);
        let prev = &self.keys[next_index - 1];
        let next = &self.keys[next_index];
        let span = next.frame - prev.frame;
        let t = if span == 0 {
            0.0
        } else {
            (frame - prev.frame) as f32 / span as f32
        };
        Some((prev, next, t))
    }

    /// Blended rotation at `frame`, or `None` for translation or empty tracks.
    pub fn sample_rotation(&self, frame: u32) -> Option<Quaternion> {
        if self.kind != TrackKind::Rotation {
            return None;
        }
        let (prev, next, t) = self.bracket(frame)?;
        match (prev.value, next.value) {
            (KeyValue::Rotation(from), KeyValue::Rotation(to)) => Some(from.blend(to, t)),
            _ => None,
        }
    }
}

/// Named frame inside an animation, e.g. a footstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub frame: u32,
}

/// Immutable keyframe animation shared by every skeleton playing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    name: String,
    flags: u32,
    length: u32,
    tracks: Vec<Track>,
    markers: Vec<Marker>,
}

impl Animation {
    pub fn new(
        name: impl Into<String>,
        flags: u32,
        length: u32,
        tracks: Vec<Track>,
        markers: Vec<Marker>,
    ) -> Result<Self, AnimationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AnimationError::MissingName);
        }
        if length == 0 {
            return Err(AnimationError::ZeroLength { name });
        }
        if tracks.len() > MAX_TRACKS {
            return Err(AnimationError::TooManyTracks {
                name,
                count: tracks.len(),
                max: MAX_TRACKS,
            });
        }
        if markers.len() > MAX_MARKERS {
            return Err(AnimationError::TooManyMarkers {
                name,
                count: markers.len(),
                max: MAX_MARKERS,
            });
        }
        Ok(Self {
            name,
            flags,
            length,
            tracks,
            markers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_looped(&self) -> bool {
        self.flags & ANIMATION_FLAG_LOOP != 0
    }

    /// Number of frames; frames run from `0` to `length - 1`.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Markers whose frame lies in `from..=to`.
    pub fn markers_between(&self, from: u32, to: u32) -> impl Iterator<Item = &Marker> {
        self.markers
            .iter()
            .filter(move |marker| marker.frame >= from && marker.frame <= to)
    }
}

/// Animations resident in memory, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    animations: HashMap<String, Arc<Animation>>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an animation, replacing any previous one with the same name.
    pub fn insert(&mut self, animation: Animation) -> Arc<Animation> {
        let animation = Arc::new(animation);
        if self
            .animations
            .insert(animation.name().to_string(), Arc::clone(&animation))
            .is_some()
        {
            debug!("replaced animation {}", animation.name());
        }
        animation
    }

    pub fn get(&self, name: &str) -> Option<Arc<Animation>> {
        self.animations.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation_track(frames: &[u32]) -> Track {
        let keys = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                Key::rotation(*frame, Quaternion::from_axis_angle(Vec3::Y, i as f32 * 0.1))
            })
            .collect();
        Track::new(0, TrackKind::Rotation, keys).unwrap()
    }

    #[test]
    fn bracket_finds_surrounding_keys() {
        let track = rotation_track(&[0, 10, 20]);
        let (prev, next, t) = track.bracket(15).unwrap();
        assert_eq!((prev.frame, next.frame), (10, 20));
        assert!((t - 0.5).abs() < 1e-6);

        let (prev, next, t) = track.bracket(10).unwrap();
        assert_eq!((prev.frame, next.frame), (10, 20));
        assert_eq!(t, 0.0);
    }

    #[test]
    fn bracket_holds_last_key() {
        let track = rotation_track(&[0, 10]);
        for frame in [10, 11, 500] {
            let (prev, next, t) = track.bracket(frame).unwrap();
            assert_eq!((prev.frame, next.frame, t), (10, 10, 0.0));
        }
    }

    #[test]
    fn sample_past_last_key_is_exact() {
        let track = rotation_track(&[0, 4, 8]);
        let last = match track.keys()[2].value {
            KeyValue::Rotation(q) => q,
            KeyValue::Translation(_) => unreachable!(),
        };
        let sampled = track.sample_rotation(30).unwrap();
        assert!((sampled.dot(last) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn duplicate_frames_do_not_divide_by_zero() {
        let track = rotation_track(&[0, 5, 5, 9]);
        let (prev, next, t) = track.bracket(5).unwrap();
        assert_eq!((prev.frame, next.frame), (5, 9));
        assert_eq!(t, 0.0);
        assert!(track.sample_rotation(5).is_some());
    }

    #[test]
    fn empty_track_has_no_sample() {
        let track = Track::new(1, TrackKind::Rotation, Vec::new()).unwrap();
        assert!(track.sample_rotation(0).is_none());
    }

    #[test]
    fn translation_track_is_never_sampled_as_rotation() {
        let track = Track::new(
            2,
            TrackKind::Translation,
            vec![Key::translation(0, Vec3::ZERO), Key::translation(4, Vec3::X)],
        )
        .unwrap();
        assert!(track.sample_rotation(2).is_none());
    }

    #[test]
    fn unordered_keys_are_rejected() {
        let err = Track::new(
            3,
            TrackKind::Rotation,
            vec![
                Key::rotation(4, Quaternion::IDENTITY),
                Key::rotation(2, Quaternion::IDENTITY),
            ],
        )
        .unwrap_err();
        assert_eq!(err, AnimationError::KeysOutOfOrder { joint: 3, frame: 2 });
    }

    #[test]
    fn mixed_payloads_are_rejected() {
        let err = Track::new(
            0,
            TrackKind::Rotation,
            vec![Key::translation(0, Vec3::ZERO)],
        )
        .unwrap_err();
        assert!(matches!(err, AnimationError::MismatchedKey { .. }));
    }

    #[test]
    fn animation_validates_length_and_name() {
        assert_eq!(
            Animation::new("", 0, 10, Vec::new(), Vec::new()).unwrap_err(),
            AnimationError::MissingName
        );
        assert!(matches!(
            Animation::new("idle", 0, 0, Vec::new(), Vec::new()),
            Err(AnimationError::ZeroLength { .. })
        ));
    }

    #[test]
    fn loop_flag_is_bit_zero() {
        let looped = Animation::new("walk", ANIMATION_FLAG_LOOP | 4, 10, Vec::new(), Vec::new()).unwrap();
        let once = Animation::new("wave", 4, 10, Vec::new(), Vec::new()).unwrap();
        assert!(looped.is_looped());
        assert!(!once.is_looped());
    }

    #[test]
    fn library_looks_up_by_name() {
        let mut library = AnimationLibrary::new();
        library.insert(Animation::new("idle", 1, 60, Vec::new(), Vec::new()).unwrap());
        library.insert(Animation::new("walk", 1, 30, Vec::new(), Vec::new()).unwrap());
        assert_eq!(library.len(), 2);
        assert_eq!(library.get("walk").unwrap().length(), 30);
        assert!(library.get("run").is_none());
    }

    #[test]
    fn markers_between_is_inclusive() {
        let animation = Animation::new(
            "step",
            0,
            20,
            Vec::new(),
            vec![
                Marker { name: "left".into(), frame: 5 },
                Marker { name: "right".into(), frame: 15 },
            ],
        )
        .unwrap();
        let names: Vec<_> = animation
            .markers_between(5, 14)
            .map(|marker| marker.name.as_str())
            .collect();
        assert_eq!(names, vec!["left"]);
    }
}
