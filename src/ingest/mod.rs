//! Sample and position sources feeding the pipeline.
//!
//! Hardware adapters implement the same traits as the synthetic generators
//! here; the pipeline only ever pulls the next record.

pub mod synthetic_gps;
pub mod synthetic_iq;

pub use synthetic_gps::SyntheticGpsSource;
pub use synthetic_iq::SyntheticIqSource;

use crate::types::{PositionFix, SampleFrame};

/// Pull interface over a stream of sample frames.
pub trait SampleSource {
    /// Next available frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Option<SampleFrame>;
}

/// Pull interface over a stream of position fixes.
pub trait PositionSource {
    fn next_fix(&mut self) -> Option<PositionFix>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_frame(&mut self) -> Option<SampleFrame> {
        (**self).next_frame()
    }
}

impl<P: PositionSource + ?Sized> PositionSource for Box<P> {
    fn next_fix(&mut self) -> Option<PositionFix> {
        (**self).next_fix()
    }
}

/// Replays a fixed list of frames; useful for recorded captures and tests.
#[derive(Debug, Clone, Default)]
pub struct FrameReplay {
    frames: std::collections::VecDeque<SampleFrame>,
}

impl FrameReplay {
    pub fn new(frames: impl IntoIterator<Item = SampleFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl SampleSource for FrameReplay {
    fn next_frame(&mut self) -> Option<SampleFrame> {
        self.frames.pop_front()
    }
}

/// Replays a fixed list of fixes in the given order.
#[derive(Debug, Clone, Default)]
pub struct FixReplay {
    fixes: std::collections::VecDeque<PositionFix>,
}

impl FixReplay {
    pub fn new(fixes: impl IntoIterator<Item = PositionFix>) -> Self {
        Self {
            fixes: fixes.into_iter().collect(),
        }
    }
}

impl PositionSource for FixReplay {
    fn next_fix(&mut self) -> Option<PositionFix> {
        self.fixes.pop_front()
    }
}
