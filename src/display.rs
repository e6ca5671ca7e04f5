use log::trace;
use serde::{Deserialize, Serialize};

use crate::fragment::{Colour, Primitive};
use crate::ordering_table::FrameSlot;

/// Receives finished frames, one buffer slot at a time.
pub trait DisplaySink {
    /// Fills the slot's framebuffer with `colour` before any primitive.
    fn clear(&mut self, parity: usize, colour: Colour);

    /// Hands over a fully populated slot. Drain it with [`FrameSlot::drain`].
    fn submit(&mut self, parity: usize, frame: &FrameSlot);
}

/// One frame as seen by a [`CommandRecorder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub parity: usize,
    pub clear: Option<Colour>,
    /// Primitives in draw order, farthest first.
    pub primitives: Vec<Primitive>,
}

/// Headless sink keeping the frames it receives, optionally only the most
/// recent ones.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    frames: Vec<RecordedFrame>,
    pending_clear: Option<(usize, Colour)>,
    history: Option<usize>,
}

impl CommandRecorder {
    /// Keeps every frame. Meant for tests and short captures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `frames` frames, dropping the oldest first. At least one
    /// frame is always kept.
    pub fn with_history(frames: usize) -> Self {
        Self {
            history: Some(frames.max(1)),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Flattens the last frame into a tagged packet stream: one tag byte
    /// followed by the raw primitive, for every primitive in draw order.
    pub fn packet_bytes(&self) -> Vec<u8> {
        let Some(frame) = self.frames.last() else {
            return Vec::new();
        };
        let mut bytes = Vec::new();
        for primitive in &frame.primitives {
            bytes.push(primitive.packet_tag());
            bytes.extend_from_slice(primitive.as_bytes());
        }
        bytes
    }
}

impl DisplaySink for CommandRecorder {
    fn clear(&mut self, parity: usize, colour: Colour) {
        self.pending_clear = Some((parity, colour));
    }

    fn submit(&mut self, parity: usize, frame: &FrameSlot) {
        let clear = match self.pending_clear.take() {
            Some((cleared, colour)) if cleared == parity => Some(colour),
            _ => None,
        };
        let primitives: Vec<Primitive> = frame.drain().copied().collect();
        trace!(
            "recorded frame on slot {parity} with {} primitives",
            primitives.len()
        );
        if let Some(history) = self.history {
            if self.frames.len() >= history {
                let excess = self.frames.len() + 1 - history;
                self.frames.drain(..excess);
            }
        }
        self.frames.push(RecordedFrame {
            parity,
            clear,
            primitives,
        });
    }
}
