mod controller;
mod run_state;

pub use controller::{Controller, TickReport};
pub use run_state::{CameraTransition, RunState};

use crate::config::EngineConfig;
use crate::network::Inbox;
use crate::scene::SceneBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Totals accumulated over an `Engine::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub processed: u64,
    pub malformed: u64,
    pub rejected: u64,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.frames += 1;
        self.processed += report.processed as u64;
        self.malformed += report.malformed as u64;
        self.rejected += report.rejected as u64;
    }
}

/// Fixed-rate driver for a [`Controller`].
pub struct Engine<B: SceneBackend> {
    controller: Controller<B>,
    target_frame_time: Duration,
    max_frames: Option<u64>,
    shutdown: Arc<AtomicBool>,
}

impl<B: SceneBackend> Engine<B> {
    pub fn new(config: &EngineConfig, inbox: Inbox, backend: B) -> Self {
        Self {
            controller: Controller::new(inbox, backend, config.scene_load_delay_ticks),
            target_frame_time: config.target_frame_time(),
            max_frames: config.max_frames,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn configure_max_frames(&mut self, frames: u64) {
        self.max_frames = Some(frames.max(1));
    }

    /// Flag that ends `run` after the current tick when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn controller(&self) -> &Controller<B> {
        &self.controller
    }

    /// Ticks until the frame budget is spent, the shutdown flag is raised, or
    /// every inbox sender is gone and the queue has drained.
    pub fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        log::info!(
            "[engine] ticking every {:.2} ms",
            self.target_frame_time.as_secs_f64() * 1000.0
        );

        while !self.shutdown.load(Ordering::Acquire) {
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                break;
            }

            let frame_start = Instant::now();
            let report = self.controller.tick();
            summary.record(&report);
            if report.processed > 0 || report.malformed > 0 {
                log::trace!(
                    "[engine] tick {}: {} applied, {} malformed, oldest waited {:?}",
                    report.tick,
                    report.processed,
                    report.malformed,
                    report.queue_latency
                );
            }

            if self.controller.inbox().is_closed() {
                log::warn!("[engine] inbox closed, stopping after tick {}", report.tick);
                break;
            }

            let elapsed = frame_start.elapsed();
            if let Some(remaining) = self.target_frame_time.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        log::info!(
            "[engine] stopped after {} frames ({} messages, {} malformed, {} refused)",
            summary.frames,
            summary.processed,
            summary.malformed,
            summary.rejected
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::inbox;
    use crate::scene::RecordingSceneBackend;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            tick_rate_hz: 1000.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn run_honours_frame_budget() {
        let (sender, inbox) = inbox();
        let mut engine = Engine::new(&fast_config(), inbox, RecordingSceneBackend::default());
        engine.configure_max_frames(3);
        sender.push(r#"{"position": {"y": 1}}"#);
        sender.push("not json");

        let summary = engine.run();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(engine.controller().run_state().tick(), 3);
    }

    #[test]
    fn raised_shutdown_flag_prevents_ticks() {
        let (_sender, inbox) = inbox();
        let mut engine = Engine::new(&fast_config(), inbox, RecordingSceneBackend::default());
        engine.shutdown_handle().store(true, Ordering::Release);

        assert_eq!(engine.run().frames, 0);
    }

    #[test]
    fn closed_inbox_ends_run_after_draining() {
        let (sender, inbox) = inbox();
        let mut engine = Engine::new(&fast_config(), inbox, RecordingSceneBackend::default());
        sender.push(r#"{"action": "editContext", "context": "c", "type": "scene", "scene": "Forest"}"#);
        drop(sender);

        let summary = engine.run();
        assert_eq!(summary.frames, 1);
        assert!(engine.controller().registry().contains("c"));
    }
}
