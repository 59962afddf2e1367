//! Streaming session lifecycle state machine.
//!
//! The controller owns exactly one logical backend session at a time and
//! keeps it synchronized with the current weighted-prompt snapshot and the
//! user's transport intent. It runs as a single task selecting over UI
//! commands, events from the live session, and completions of in-flight
//! backend calls. Completions carry the session epoch they were issued
//! under; anything from a replaced session is discarded.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::audio::{AudioSink, LevelTap};
use crate::backend::{BackendEvent, MusicBackend, SessionHandle};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{Notification, PlaybackState};
use crate::prompt::WeightedPromptSet;

const NOTIFICATION_CAPACITY: usize = 64;
const INTERNAL_CAPACITY: usize = 16;
/// Establishment attempts for a fresh session (one retry).
const CONNECT_ATTEMPTS: usize = 2;

/// Internal lifecycle state. Observed by consumers only through
/// [`Notification::PlaybackStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Paused,
    Recovering,
    Failed,
}

impl SessionState {
    /// Total, deterministic mapping to the public transport view.
    pub fn playback(self) -> PlaybackState {
        match self {
            SessionState::Idle | SessionState::Failed => PlaybackState::Stopped,
            SessionState::Connecting | SessionState::Recovering => PlaybackState::Loading,
            SessionState::Streaming => PlaybackState::Playing,
            SessionState::Paused => PlaybackState::Paused,
        }
    }
}

/// Commands accepted by the controller task.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Apply a weighted-prompt snapshot. Cached until a session exists,
    /// debounced by value, coalesced last-write-wins while one submission
    /// is in flight.
    SetWeightedPrompts(WeightedPromptSet),
    /// Toggle the transport.
    PlayPause,
}

/// Completion of an in-flight backend call, tagged with the epoch it was
/// issued under.
enum Internal<H> {
    ConnectDone {
        epoch: u64,
        result: Result<(H, mpsc::Receiver<BackendEvent>)>,
    },
    SubmitDone {
        epoch: u64,
        result: Result<()>,
    },
}

enum Input<H> {
    Command(Option<SessionCommand>),
    Internal(Internal<H>),
    Backend(Option<BackendEvent>),
}

/// Owns the lifecycle of one logical streaming session to the generative
/// backend.
pub struct SessionController<B: MusicBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    sink: Arc<dyn AudioSink>,
    tap: LevelTap,
    notifications: broadcast::Sender<Notification>,
    state: SessionState,
    handle: Option<Arc<B::Handle>>,
    backend_rx: Option<mpsc::Receiver<BackendEvent>>,
    /// Bumped on every session teardown/replacement; stale completions
    /// compare against it and are dropped.
    epoch: u64,
    /// Whether this session instance already spent its single reconnect.
    recovered: bool,
    /// Last snapshot requested by the caller; resubmitted on reconnect.
    last_requested: Option<WeightedPromptSet>,
    /// Latest snapshot waiting behind an in-flight submission.
    pending: Option<WeightedPromptSet>,
    submitting: bool,
}

impl<B: MusicBackend> SessionController<B> {
    pub fn new(
        backend: Arc<B>,
        config: SessionConfig,
        sink: Arc<dyn AudioSink>,
        tap: LevelTap,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            backend,
            config,
            sink,
            tap,
            notifications,
            state: SessionState::Idle,
            handle: None,
            backend_rx: None,
            epoch: 0,
            recovered: false,
            last_requested: None,
            pending: None,
            submitting: false,
        }
    }

    /// Subscribe to controller notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state.playback()
    }

    /// Drive the controller until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let (internal_tx, mut internal_rx) = mpsc::channel(INTERNAL_CAPACITY);
        info!("Session controller running (model {})", self.config.model_id);

        loop {
            let input: Input<B::Handle> = {
                let backend_event = async {
                    match self.backend_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    cmd = commands.recv() => Input::Command(cmd),
                    Some(msg) = internal_rx.recv() => Input::Internal(msg),
                    event = backend_event => Input::Backend(event),
                }
            };

            match input {
                Input::Command(None) => {
                    info!("Command channel closed, shutting session controller down");
                    self.teardown_session();
                    break;
                }
                Input::Command(Some(command)) => self.handle_command(command, &internal_tx),
                Input::Internal(message) => self.handle_internal(message, &internal_tx),
                Input::Backend(event) => self.handle_backend_event(event, &internal_tx).await,
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand, tx: &mpsc::Sender<Internal<B::Handle>>) {
        match command {
            SessionCommand::SetWeightedPrompts(set) => self.apply_prompts(set, tx),
            SessionCommand::PlayPause => self.toggle(tx),
        }
    }

    fn apply_prompts(&mut self, set: WeightedPromptSet, tx: &mpsc::Sender<Internal<B::Handle>>) {
        if set.is_empty() {
            self.notify_error("At least one prompt is required".to_string());
            return;
        }
        if self.last_requested.as_ref() == Some(&set) {
            debug!("Prompt set unchanged, skipping backend round-trip");
            return;
        }
        self.last_requested = Some(set.clone());

        let Some(handle) = self.handle.clone() else {
            debug!("No live session, caching prompt set for establishment");
            return;
        };
        if self.submitting {
            // Last-write-wins: the in-flight submission drains this slot.
            self.pending = Some(set);
        } else {
            self.spawn_submit(handle, set, tx);
        }
    }

    fn toggle(&mut self, tx: &mpsc::Sender<Internal<B::Handle>>) {
        match self.state {
            SessionState::Idle => self.begin_connect(false, tx),
            SessionState::Failed => {
                // Terminal for the old instance; the toggle constructs a
                // fresh session with its reconnect allowance restored.
                info!("Retrying from failed session");
                self.begin_connect(false, tx);
            }
            SessionState::Connecting | SessionState::Recovering => {
                info!("Playback cancelled while loading");
                self.teardown_session();
                self.set_state(SessionState::Idle);
            }
            SessionState::Streaming => {
                self.tap.reset();
                self.set_state(SessionState::Paused);
                if let Some(handle) = self.handle.clone() {
                    tokio::spawn(async move {
                        if let Err(err) = handle.pause().await {
                            warn!("Backend pause failed: {err}");
                        }
                    });
                }
            }
            SessionState::Paused => {
                self.set_state(SessionState::Streaming);
                if let Some(handle) = self.handle.clone() {
                    tokio::spawn(async move {
                        if let Err(err) = handle.play().await {
                            warn!("Backend resume failed: {err}");
                        }
                    });
                }
            }
        }
    }

    fn begin_connect(&mut self, recovery: bool, tx: &mpsc::Sender<Internal<B::Handle>>) {
        self.epoch = self.epoch.wrapping_add(1);
        if !recovery {
            self.recovered = false;
        }
        self.set_state(if recovery {
            SessionState::Recovering
        } else {
            SessionState::Connecting
        });

        let attempts = if recovery { 1 } else { CONNECT_ATTEMPTS };
        let backend = self.backend.clone();
        let model_id = self.config.model_id.clone();
        let epoch = self.epoch;
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut result = backend.create_session(&model_id).await;
            for _ in 1..attempts {
                match &result {
                    Ok(_) => break,
                    Err(err) => {
                        warn!("Session establishment failed, retrying: {err}");
                        result = backend.create_session(&model_id).await;
                    }
                }
            }
            let _ = tx.send(Internal::ConnectDone { epoch, result }).await;
        });
    }

    fn handle_internal(&mut self, message: Internal<B::Handle>, tx: &mpsc::Sender<Internal<B::Handle>>) {
        match message {
            Internal::ConnectDone { epoch, result } => {
                if epoch != self.epoch {
                    debug!("Discarding establishment result for a replaced session");
                    if let Ok((handle, _events)) = result {
                        tokio::spawn(async move {
                            let _ = handle.stop().await;
                        });
                    }
                    return;
                }
                match result {
                    Ok((handle, events)) => {
                        let handle = Arc::new(handle);
                        self.backend_rx = Some(events);
                        self.handle = Some(handle.clone());
                        if let Some(set) = self.last_requested.clone() {
                            self.spawn_submit(handle.clone(), set, tx);
                        }
                        tokio::spawn(async move {
                            if let Err(err) = handle.play().await {
                                warn!("Backend play failed: {err}");
                            }
                        });
                        // Streaming is entered on SessionReady, not here.
                    }
                    Err(err) => self.fail(err.to_string()),
                }
            }
            Internal::SubmitDone { epoch, result } => {
                if epoch != self.epoch {
                    debug!("Discarding prompt submission result for a replaced session");
                    return;
                }
                self.submitting = false;
                match result {
                    Ok(()) => {}
                    Err(Error::InvalidPrompt(message)) => self.notify_error(message),
                    Err(Error::TransientStream(message)) => {
                        self.begin_recovery(message, tx);
                        return;
                    }
                    Err(err) => {
                        self.fail(err.to_string());
                        return;
                    }
                }
                if let Some(set) = self.pending.take() {
                    if let Some(handle) = self.handle.clone() {
                        self.spawn_submit(handle, set, tx);
                    }
                }
            }
        }
    }

    async fn handle_backend_event(
        &mut self,
        event: Option<BackendEvent>,
        tx: &mpsc::Sender<Internal<B::Handle>>,
    ) {
        match event {
            None => {
                // The session's event channel closed without a terminal event.
                self.backend_rx = None;
                self.begin_recovery("stream closed unexpectedly".to_string(), tx);
            }
            Some(BackendEvent::SessionReady) => {
                if matches!(self.state, SessionState::Connecting | SessionState::Recovering) {
                    info!("Backend session established");
                    self.set_state(SessionState::Streaming);
                }
            }
            Some(BackendEvent::Audio(frame)) => {
                if self.state != SessionState::Streaming {
                    // No buffered frames played late after pause/stop.
                    return;
                }
                self.tap.update(&frame);
                if let Err(err) = self.sink.write(frame).await {
                    // Degrade to silent operation rather than crashing.
                    warn!("Audio output degraded: {err}");
                }
            }
            Some(BackendEvent::FilteredPrompt(notice)) => {
                info!("Prompt filtered: {} ({})", notice.text, notice.reason);
                self.notify(Notification::FilteredPrompt {
                    text: notice.text,
                    reason: notice.reason,
                });
            }
            Some(BackendEvent::StreamInterrupted(reason)) => self.begin_recovery(reason, tx),
            Some(BackendEvent::SessionClosed(message)) => self.fail(message),
        }
    }

    fn begin_recovery(&mut self, reason: String, tx: &mpsc::Sender<Internal<B::Handle>>) {
        if matches!(self.state, SessionState::Idle | SessionState::Failed) {
            return;
        }
        if self.recovered {
            self.fail(reason);
            return;
        }
        self.recovered = true;
        warn!("Transient stream error, attempting one reconnect: {reason}");
        self.teardown_session();
        self.begin_connect(true, tx);
    }

    fn spawn_submit(
        &mut self,
        handle: Arc<B::Handle>,
        set: WeightedPromptSet,
        tx: &mpsc::Sender<Internal<B::Handle>>,
    ) {
        self.submitting = true;
        let epoch = self.epoch;
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = handle.set_weighted_prompts(&set).await;
            let _ = tx.send(Internal::SubmitDone { epoch, result }).await;
        });
    }

    fn fail(&mut self, message: String) {
        warn!("Session failed: {message}");
        self.teardown_session();
        self.notify(Notification::Error { message });
        self.set_state(SessionState::Failed);
    }

    /// Release the current session. Local effects are immediate; the
    /// backend-side teardown is awaited asynchronously and any late
    /// completion for the old epoch is discarded.
    fn teardown_session(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.submitting = false;
        self.pending = None;
        self.backend_rx = None;
        self.tap.reset();
        if let Some(handle) = self.handle.take() {
            debug!("Releasing backend session");
            tokio::spawn(async move {
                let _ = handle.stop().await;
            });
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.notify(Notification::PlaybackStateChanged {
            state: next.playback(),
        });
    }

    fn notify_error(&self, message: String) {
        warn!("{message}");
        self.notify(Notification::Error { message });
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine; the UI may attach later.
        let _ = self.notifications.send(notification);
    }
}
