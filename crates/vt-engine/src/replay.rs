//! Non-realtime replay of recorded frames with cooperative cancellation.

use vt_ir::{PeakFrame, VoiceFrame};

use crate::engine::Engine;

/// Caller's answer to a per-frame progress check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

/// Position of a replay, passed to the progress check before each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Frames completed so far.
    pub frame: usize,
    /// Total frames, when the source knows it.
    pub total: Option<usize>,
}

impl Progress {
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.frame as f32 / total as f32),
            None => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub frames_processed: usize,
    pub cancelled: bool,
}

impl Engine {
    /// Run the engine over `frames`, handing each frame's output to `sink`.
    ///
    /// `check` is asked before every frame; on [`Flow::Cancel`] the replay
    /// stops between frames, so tracker and allocator are always left at a
    /// frame boundary.
    pub fn replay<'a, I, S, C>(&mut self, frames: I, mut sink: S, mut check: C) -> ReplayReport
    where
        I: IntoIterator<Item = &'a PeakFrame>,
        S: FnMut(usize, &VoiceFrame),
        C: FnMut(Progress) -> Flow,
    {
        let frames = frames.into_iter();
        let (lower, upper) = frames.size_hint();
        let total = (upper == Some(lower)).then_some(lower);

        let mut report = ReplayReport::default();
        for frame in frames {
            let progress = Progress {
                frame: report.frames_processed,
                total,
            };
            if check(progress) == Flow::Cancel {
                report.cancelled = true;
                break;
            }
            let out = self.process(frame);
            sink(report.frames_processed, out);
            report.frames_processed += 1;
        }
        report
    }
}
