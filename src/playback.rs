use std::sync::Arc;

use log::trace;

use crate::animation::{Animation, Marker, TrackKind};
use crate::skeleton::Skeleton;

impl Skeleton {
    /// Starts `animation` from frame 0. The previous pose is not blended out.
    pub fn set_animation(&mut self, animation: Arc<Animation>) {
        self.animation = Some(animation);
        self.current_frame = 0;
        self.fresh_animation = true;
    }

    pub fn clear_animation(&mut self) {
        self.animation = None;
        self.current_frame = 0;
        self.fresh_animation = false;
    }

    /// Jumps the playhead. The next [`Skeleton::play_animation`] call wraps or
    /// clamps it if it lies past the end.
    pub fn set_current_frame(&mut self, frame: u32) {
        self.current_frame = frame;
    }

    /// Advances the playhead by `delta_ticks` and poses the bones for the new
    /// frame.
    ///
    /// Reaching `length` restarts at frame 0 for looped animations and freezes
    /// on `length - 1` otherwise. Rotation tracks overwrite their bone's local
    /// rotation (marking it dirty); translation tracks are ignored. Returns the
    /// markers passed during this step.
    pub fn play_animation(&mut self, delta_ticks: u32) -> Vec<Marker> {
        let Some(animation) = self.animation.clone() else {
            return Vec::new();
        };

        let start = self.current_frame;
        let length = animation.length();
        let mut frame = start.saturating_add(delta_ticks);
        let mut wrapped = false;
        if frame >= length {
            if animation.is_looped() {
                frame = 0;
                wrapped = true;
            } else {
                frame = length - 1;
            }
        }
        self.current_frame = frame;

        let first_unseen = if self.fresh_animation {
            start
        } else {
            start.saturating_add(1)
        };
        self.fresh_animation = false;
        let mut passed: Vec<Marker> = Vec::new();
        if wrapped {
            passed.extend(animation.markers_between(first_unseen, length - 1).cloned());
            if first_unseen > 0 {
                passed.extend(animation.markers_between(0, 0).cloned());
            }
        } else {
            passed.extend(animation.markers_between(first_unseen, frame).cloned());
        }

        for track in animation.tracks() {
            if track.kind() != TrackKind::Rotation {
                continue;
            }
            let joint = usize::from(track.joint_id());
            let Some(rotation) = track.sample_rotation(frame) else {
                continue;
            };
            match self.bone_mut(joint) {
                Some(mut bone) => bone.set_local_rotation(rotation),
                None => trace!(
                    "animation {} targets missing joint {joint}",
                    animation.name()
                ),
            }
        }

        passed
    }
}
