//! Threaded render: a worker replays a stream and hands voice frames back
//! through a lock-free ring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use vt_engine::{Engine, Flow, Progress, ReplayReport};
use vt_ir::{PeakFrame, VoiceFrame};

use crate::Render;

/// Voice frames buffered between worker and caller.
const RING_FRAMES: usize = 256;

/// Handle to a render running on a worker thread.
///
/// The worker blocks when the ring is full, so the caller must keep draining
/// with [`try_recv`](Self::try_recv) or call [`wait`](Self::wait).
/// Dropping the handle cancels the render and joins the worker.
pub struct RenderHandle {
    cancel: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    total: usize,
    consumer: HeapCons<VoiceFrame>,
    thread: Option<JoinHandle<(ReplayReport, u64)>>,
}

impl RenderHandle {
    pub(crate) fn spawn(engine: Engine, frames: Vec<PeakFrame>) -> Self {
        let (producer, consumer) = HeapRb::<VoiceFrame>::new(RING_FRAMES).split();
        let cancel = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let total = frames.len();

        let stop = cancel.clone();
        let count = processed.clone();
        let done = finished.clone();
        let thread = std::thread::spawn(move || render_thread(engine, frames, producer, stop, count, done));

        Self {
            cancel,
            processed,
            finished,
            total,
            consumer,
            thread: Some(thread),
        }
    }

    /// Ask the worker to stop at the next frame boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn progress(&self) -> Progress {
        Progress {
            frame: self.processed.load(Ordering::Relaxed) as usize,
            total: Some(self.total),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Next voice frame, if the worker has produced one.
    pub fn try_recv(&mut self) -> Option<VoiceFrame> {
        self.consumer.try_pop()
    }

    /// Drain every remaining frame until the worker finishes, then join it.
    /// Frames already taken with `try_recv` are not repeated.
    pub fn wait(mut self) -> Render {
        let mut voices = Vec::with_capacity(self.total);
        loop {
            let done = self.is_finished();
            while let Some(frame) = self.consumer.try_pop() {
                voices.push(frame);
            }
            if done {
                break;
            }
            std::thread::yield_now();
        }
        let (report, births) = self
            .thread
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Render { voices, report, births }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.cancel.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

fn render_thread(
    mut engine: Engine,
    frames: Vec<PeakFrame>,
    mut producer: HeapProd<VoiceFrame>,
    cancel: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
) -> (ReplayReport, u64) {
    engine.clear();
    let report = engine.replay(
        &frames,
        |_, out| {
            let mut frame = out.clone();
            // wait for room; a cancelled render drops the frame uncounted
            loop {
                match producer.try_push(frame) {
                    Ok(()) => {
                        processed.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Err(_) if cancel.load(Ordering::Relaxed) => break,
                    Err(back) => {
                        frame = back;
                        std::thread::yield_now();
                    }
                }
            }
        },
        |_| {
            if cancel.load(Ordering::Relaxed) {
                Flow::Cancel
            } else {
                Flow::Continue
            }
        },
    );
    finished.store(true, Ordering::Release);
    (report, engine.tracker().births())
}

#[cfg(test)]
mod tests {
    use crate::{Controller, EngineConfig};
    use std::sync::atomic::AtomicBool;
    use vt_engine::Peak;
    use vt_ir::PeakFrame;

    fn frames(n: usize) -> Vec<PeakFrame> {
        (0..n)
            .map(|i| {
                let f = 200.0 + (i % 50) as f32;
                PeakFrame::from_peaks(&[Peak::new(f, -10.0), Peak::new(f * 3.0, -20.0)])
            })
            .collect()
    }

    fn controller() -> Controller {
        let mut config = EngineConfig::default();
        config.allocator.voice_count = 2;
        Controller::new(config).unwrap()
    }

    #[test]
    fn threaded_render_matches_offline() {
        let mut ctl = controller();
        let key = ctl.add_stream("s", frames(600));

        let handle = ctl.spawn_render(key).unwrap();
        let threaded = handle.wait();
        assert!(!threaded.report.cancelled);
        assert_eq!(threaded.report.frames_processed, 600);

        let offline = ctl.render_stream(key, &AtomicBool::new(false), |_| {}).unwrap();
        assert_eq!(threaded.voices, offline.voices);
        assert_eq!(threaded.births, offline.births);
    }

    #[test]
    fn cancel_stops_a_blocked_worker() {
        let mut ctl = controller();
        let key = ctl.add_stream("s", frames(2000));
        let mut handle = ctl.spawn_render(key).unwrap();
        let first = loop {
            if let Some(frame) = handle.try_recv() {
                break frame;
            }
            std::thread::yield_now();
        };
        assert_eq!(first.len(), 2);

        handle.cancel();
        while !handle.is_finished() {
            std::thread::yield_now();
        }
        let delivered = handle.progress().frame;
        let render = handle.wait();
        assert!(render.report.cancelled);
        assert!(render.report.frames_processed < 2000);
        assert!(render.voices.len() <= super::RING_FRAMES);
        // progress counts only frames that reached the ring
        assert_eq!(delivered, render.voices.len() + 1);
    }

    #[test]
    fn progress_reports_total() {
        let mut ctl = controller();
        let key = ctl.add_stream("s", frames(10));
        let handle = ctl.spawn_render(key).unwrap();
        assert_eq!(handle.progress().total, Some(10));
        assert_eq!(handle.wait().voices.len(), 10);
    }

    #[test]
    fn dropping_the_handle_joins_the_worker() {
        let mut ctl = controller();
        let key = ctl.add_stream("s", frames(5000));
        let handle = ctl.spawn_render(key).unwrap();
        drop(handle);
        assert_eq!(ctl.stream_count(), 1);
    }
}
