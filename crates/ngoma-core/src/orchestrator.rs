//! Glue between the UI collaborator and the session core.
//!
//! The orchestrator has no decision logic of its own: it applies incoming
//! weight edits through the prompt store, forwards transport toggles to the
//! session controller, and fans controller notifications and level samples
//! back out on a single notification channel. The level monitor runs
//! exactly while playback is in the `playing` state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::audio::{AudioSink, LevelTap};
use crate::backend::MusicBackend;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{Notification, PlaybackState, UiIntent};
use crate::level::AudioLevelMonitor;
use crate::prompt::{PromptStore, WeightedPromptSet};
use crate::session::{SessionCommand, SessionController};

pub struct Orchestrator<B: MusicBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    sink: Arc<dyn AudioSink>,
    store: PromptStore,
}

impl<B: MusicBackend> Orchestrator<B> {
    pub fn new(
        backend: Arc<B>,
        config: SessionConfig,
        sink: Arc<dyn AudioSink>,
        store: PromptStore,
    ) -> Self {
        Self {
            backend,
            config,
            sink,
            store,
        }
    }

    /// Wire everything together and run until the intent channel closes.
    pub async fn run(
        mut self,
        mut intents: mpsc::Receiver<UiIntent>,
        notices: mpsc::Sender<Notification>,
    ) {
        let tap = LevelTap::new();
        let mut monitor =
            AudioLevelMonitor::new(tap.clone(), Duration::from_millis(self.config.level_tick_ms));
        let mut levels = monitor.subscribe();

        let controller = SessionController::new(
            self.backend.clone(),
            self.config.clone(),
            self.sink.clone(),
            tap,
        );
        let mut notifications = controller.subscribe();
        let (commands, command_rx) = mpsc::channel(self.config.channel_capacity);
        let controller_task = tokio::spawn(controller.run(command_rx));

        // Seed the controller with the startup snapshot so the first
        // session establishment already carries the initial weights.
        let _ = commands
            .send(SessionCommand::SetWeightedPrompts(self.store.snapshot()))
            .await;

        info!("Orchestrator running");
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    None => break,
                    Some(UiIntent::PlayPause) => {
                        let _ = commands.send(SessionCommand::PlayPause).await;
                    }
                    Some(UiIntent::PromptsChanged { prompts }) => {
                        match apply_weights(&mut self.store, &prompts) {
                            Ok(true) => {
                                let _ = commands
                                    .send(SessionCommand::SetWeightedPrompts(self.store.snapshot()))
                                    .await;
                            }
                            Ok(false) => {}
                            Err(err) => {
                                let _ = notices
                                    .send(Notification::Error { message: err.to_string() })
                                    .await;
                            }
                        }
                    }
                },
                notification = notifications.recv() => match notification {
                    Ok(notification) => {
                        if let Notification::PlaybackStateChanged { state } = &notification {
                            if *state == PlaybackState::Playing {
                                monitor.start();
                            } else {
                                monitor.stop().await;
                            }
                        }
                        if notices.send(notification).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Notification fan-out lagged, skipped {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                level = levels.recv() => {
                    if let Ok(level) = level {
                        if notices
                            .send(Notification::AudioLevelChanged { level })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                },
            }
        }

        monitor.stop().await;
        drop(commands);
        let _ = controller_task.await;
        info!("Orchestrator stopped");
    }
}

/// Apply a UI weight edit to the store.
///
/// Validates every entry before mutating so a bad edit leaves the store
/// untouched. Returns whether any stored weight actually changed.
fn apply_weights(store: &mut PromptStore, incoming: &WeightedPromptSet) -> Result<bool> {
    for (prompt_id, prompt) in incoming {
        if store.get(prompt_id).is_none() {
            return Err(Error::UnknownPrompt(prompt_id.clone()));
        }
        if !prompt.weight.is_finite() || prompt.weight < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Weight for {prompt_id} must be a non-negative number, got {}",
                prompt.weight
            )));
        }
    }
    let mut changed = false;
    for (prompt_id, prompt) in incoming {
        changed |= store.set_weight(prompt_id, prompt.weight)?;
    }
    Ok(changed)
}
