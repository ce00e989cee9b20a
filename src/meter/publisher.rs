//! Frame publication
//!
//! The meter pushes frames into a `FrameSink`. `MeterPublisher` hands them
//! to another thread over a bounded channel without ever blocking the audio
//! thread: when the consumer falls behind, the oldest queued frame is
//! discarded so the newest always gets through.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{trace, warn};

use super::frame::LoudnessFrame;

/// Default number of frames buffered between meter and observer
pub const DEFAULT_FRAME_QUEUE: usize = 16;

/// Destination for emitted frames
pub trait FrameSink {
    /// Accept one frame; must not block
    fn publish(&mut self, frame: LoudnessFrame);
}

impl FrameSink for Vec<LoudnessFrame> {
    fn publish(&mut self, frame: LoudnessFrame) {
        self.push(frame);
    }
}

/// Sink that discards every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardFrames;

impl FrameSink for DiscardFrames {
    fn publish(&mut self, _frame: LoudnessFrame) {}
}

/// Latest-wins publisher over a bounded channel
#[derive(Debug, Clone)]
pub struct MeterPublisher {
    sender: Sender<LoudnessFrame>,
    /// Second handle on the queue, used to evict the oldest frame
    evict: Receiver<LoudnessFrame>,
    dropped: u64,
}

/// Create a publisher and the receiver an observer reads from
pub fn frame_channel(capacity: usize) -> (MeterPublisher, Receiver<LoudnessFrame>) {
    let (sender, receiver) = bounded(capacity.max(1));
    let publisher = MeterPublisher {
        sender,
        evict: receiver.clone(),
        dropped: 0,
    };
    (publisher, receiver)
}

impl MeterPublisher {
    /// Frames discarded so far
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for MeterPublisher {
    fn publish(&mut self, frame: LoudnessFrame) {
        match self.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                if self.evict.try_recv().is_ok() {
                    self.dropped += 1;
                    trace!(time = frame.time, "Observer behind, dropped oldest frame");
                }
                if self.sender.try_send(frame).is_err() {
                    self.dropped += 1;
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }
}

impl Drop for MeterPublisher {
    fn drop(&mut self) {
        if self.dropped > 0 {
            warn!(dropped = self.dropped, "Meter observer missed frames");
        }
    }
}
