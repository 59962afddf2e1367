//! Continuous audio-level sampling for visual feedback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::audio::LevelTap;

const LEVEL_CHANNEL_CAPACITY: usize = 16;

/// Samples the shared [`LevelTap`] at a steady rate and emits one
/// normalized loudness value in `[0, 1]` per tick.
///
/// The monitor never fails: a tap with no signal reads as zero.
pub struct AudioLevelMonitor {
    tap: LevelTap,
    tick: Duration,
    levels: broadcast::Sender<f32>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl AudioLevelMonitor {
    pub fn new(tap: LevelTap, tick: Duration) -> Self {
        let (levels, _) = broadcast::channel(LEVEL_CHANNEL_CAPACITY);
        Self {
            tap,
            tick,
            levels,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Subscribe to the stream of level samples.
    pub fn subscribe(&self) -> broadcast::Receiver<f32> {
        self.levels.subscribe()
    }

    /// Begin sampling. No-op if sampling is already running.
    pub fn start(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        debug!("Starting audio level monitor ({:?} tick)", self.tick);
        self.running.store(true, Ordering::SeqCst);

        let tap = self.tap.clone();
        let levels = self.levels.clone();
        let running = self.running.clone();
        let tick = self.tick;
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let level = tap.level().clamp(0.0, 1.0);
                // No receivers is fine; the UI may not be listening yet.
                let _ = levels.send(level);
            }
        }));
    }

    /// Halt sampling. No sample is emitted after this returns.
    ///
    /// Safe to call without a prior [`start`](Self::start).
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            // Wait for full termination so no emission can race this return.
            let _ = task.await;
            debug!("Audio level monitor stopped");
        }
    }
}
