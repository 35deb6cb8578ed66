//! Headless controller for voicetrack.
//!
//! Owns any number of independent engine streams, each fed from a loaded
//! peak dump, and renders them offline or on a worker thread. Shared by the
//! CLI and the integration tests.

mod render;
mod settings;

use std::sync::atomic::{AtomicBool, Ordering};

use slotmap::SlotMap;
use vt_engine::{Engine, Flow, Progress, ReplayReport};

// Re-export common types so callers don't need vt-ir/vt-engine directly.
pub use vt_engine::ConfigError;
pub use vt_formats::{write_csv, CsvWriter, FormatError};
pub use vt_ir::{
    EngineConfig, MagnitudeScale, PeakFrame, PriorityMode, VoiceFrame, VoiceState,
};

pub use render::RenderHandle;
pub use settings::{load_config, parse_config, save_config, SettingsError};

slotmap::new_key_type! {
    /// Handle to a stream owned by a [`Controller`].
    pub struct StreamKey;
}

/// One control stream: an engine and the recorded frames it replays.
#[derive(Clone, Debug)]
pub struct Stream {
    name: String,
    engine: Engine,
    frames: Vec<PeakFrame>,
}

impl Stream {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames(&self) -> &[PeakFrame] {
        &self.frames
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn peak_count(&self) -> usize {
        self.frames.iter().map(PeakFrame::len).sum()
    }
}

/// Result of an offline render.
#[derive(Clone, Debug, Default)]
pub struct Render {
    pub voices: Vec<VoiceFrame>,
    pub report: ReplayReport,
    /// Trajectories the tracker started during the render.
    pub births: u64,
}

impl Render {
    /// Number of (frame, slot) outputs in `state`.
    pub fn state_count(&self, state: VoiceState) -> usize {
        self.voices.iter().map(|v| v.count(state)).sum()
    }
}

/// Headless controller: owns streams and runs renders.
pub struct Controller {
    /// Configured engine that new streams are cloned from.
    template: Engine,
    streams: SlotMap<StreamKey, Stream>,
}

impl Controller {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            template: Engine::new(config)?,
            streams: SlotMap::with_key(),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.template.config()
    }

    /// Change the configuration used for streams added from now on.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        self.template.configure(config)
    }

    // --- Stream management ---

    pub fn add_stream(&mut self, name: &str, frames: Vec<PeakFrame>) -> StreamKey {
        let stream = Stream {
            name: name.to_string(),
            engine: self.template.clone(),
            frames,
        };
        log::info!("added stream '{}' ({} frames)", name, stream.frames.len());
        self.streams.insert(stream)
    }

    /// Parse a `.vtpk` dump and add it as a new stream.
    pub fn load_stream(&mut self, name: &str, data: &[u8]) -> Result<StreamKey, FormatError> {
        let frames = vt_formats::load_peaks(data)?;
        Ok(self.add_stream(name, frames))
    }

    pub fn remove_stream(&mut self, key: StreamKey) -> Option<Stream> {
        self.streams.remove(key)
    }

    pub fn stream(&self, key: StreamKey) -> Option<&Stream> {
        self.streams.get(key)
    }

    pub fn stream_mut(&mut self, key: StreamKey) -> Option<&mut Stream> {
        self.streams.get_mut(key)
    }

    pub fn streams(&self) -> impl Iterator<Item = (StreamKey, &Stream)> {
        self.streams.iter()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    // --- Offline rendering ---

    /// Replay a stream from a cleared engine and collect every voice frame.
    ///
    /// `on_progress` runs before each frame. Setting `cancel` stops the
    /// render at the next frame boundary; the partial result is returned.
    pub fn render_stream(
        &mut self,
        key: StreamKey,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(Progress),
    ) -> Option<Render> {
        let Stream { name, engine, frames } = self.streams.get_mut(key)?;
        engine.clear();

        let mut voices = Vec::with_capacity(frames.len());
        let report = engine.replay(
            frames.iter(),
            |_, out| voices.push(out.clone()),
            |progress| {
                on_progress(progress);
                if cancel.load(Ordering::Relaxed) {
                    Flow::Cancel
                } else {
                    Flow::Continue
                }
            },
        );

        if report.cancelled {
            log::info!("render of '{}' cancelled after {} frames", name, report.frames_processed);
        } else {
            log::info!("rendered '{}': {} frames", name, report.frames_processed);
        }
        Some(Render {
            voices,
            report,
            births: engine.tracker().births(),
        })
    }

    /// Start rendering a stream on a worker thread. The stream's own engine
    /// is left untouched; the worker runs a cleared copy.
    pub fn spawn_render(&self, key: StreamKey) -> Option<RenderHandle> {
        let stream = self.streams.get(key)?;
        log::info!("starting threaded render of '{}'", stream.name);
        Some(RenderHandle::spawn(
            stream.engine.clone(),
            stream.frames.clone(),
        ))
    }
}
