//! Engine: one tracker and one allocator driven frame by frame.

use vt_ir::{
    ConfigError, EngineConfig, MatchMethod, PeakFrame, PriorityMode, VoiceFrame,
};

use crate::allocator::VoiceAllocator;
use crate::host;
use crate::tracker::PartialTracker;

/// A tracker + allocator pair.
///
/// Each frame is processed to completion (track, snapshot, allocate, prune)
/// before the call returns, so frames can never overlap or reorder. One
/// instance per control stream; instances share nothing.
#[derive(Clone, Debug)]
pub struct Engine {
    tracker: PartialTracker,
    allocator: VoiceAllocator,
    /// Scratch frame for host-buffer input.
    input: PeakFrame,
    frames: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracker: PartialTracker::new(config.tracker)?,
            allocator: VoiceAllocator::new(config.allocator)?,
            input: PeakFrame::new(),
            frames: 0,
        })
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            tracker: *self.tracker.config(),
            allocator: *self.allocator.config(),
        }
    }

    /// Apply a full configuration. Nothing changes unless all of it is valid.
    pub fn configure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            log::warn!("rejected engine config: {}", e);
            return Err(e);
        }
        self.tracker.configure(config.tracker)?;
        self.allocator.configure(config.allocator)
    }

    pub fn set_voice_count(&mut self, voice_count: usize) -> Result<(), ConfigError> {
        self.allocator.set_voice_count(voice_count)
    }

    pub fn set_priority(&mut self, priority: PriorityMode) {
        self.allocator.set_priority(priority);
    }

    pub fn set_min_track_length(&mut self, frames: u32) -> Result<(), ConfigError> {
        self.tracker.set_min_track_length(frames)
    }

    pub fn set_birth_thresholds(&mut self, low_db: f32, high_db: f32) -> Result<(), ConfigError> {
        self.tracker.set_birth_thresholds(low_db, high_db)
    }

    pub fn set_method(&mut self, method: MatchMethod) {
        self.tracker.set_method(method);
    }

    /// Process one frame of peaks and return this frame's voice output.
    pub fn process(&mut self, frame: &PeakFrame) -> &VoiceFrame {
        Self::run(&mut self.tracker, &mut self.allocator, frame);
        self.frames += 1;
        self.allocator.output()
    }

    /// Process one frame given as host buffers (frequencies in Hz, linear
    /// magnitudes). See [`host::fill_peak_frame`].
    pub fn process_linear(&mut self, frequencies: &[f32], magnitudes: &[f32]) -> &VoiceFrame {
        host::fill_peak_frame(&mut self.input, frequencies, magnitudes);
        Self::run(&mut self.tracker, &mut self.allocator, &self.input);
        self.frames += 1;
        self.allocator.output()
    }

    fn run(tracker: &mut PartialTracker, allocator: &mut VoiceAllocator, frame: &PeakFrame) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| Self::step(tracker, allocator, frame));
        #[cfg(not(feature = "alloc_check"))]
        Self::step(tracker, allocator, frame);
    }

    fn step(tracker: &mut PartialTracker, allocator: &mut VoiceAllocator, frame: &PeakFrame) {
        tracker.process_frame(frame);
        allocator.allocate(tracker.active_trajectories());
        tracker.prune();
    }

    /// Reset all trajectories and voice slots; configuration is kept.
    pub fn clear(&mut self) {
        log::debug!("clearing engine after {} frames", self.frames);
        self.tracker.clear();
        self.allocator.clear();
        self.frames = 0;
    }

    pub fn output(&self) -> &VoiceFrame {
        self.allocator.output()
    }

    pub fn tracker(&self) -> &PartialTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PartialTracker {
        &mut self.tracker
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut VoiceAllocator {
        &mut self.allocator
    }

    pub fn voice_count(&self) -> usize {
        self.allocator.voice_count()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Output latency in frames.
    pub const fn latency(&self) -> usize {
        0
    }
}
