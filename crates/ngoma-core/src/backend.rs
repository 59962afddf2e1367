//! Contract for the generative-audio backend collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::error::Result;
use crate::prompt::WeightedPromptSet;

/// Advisory notice that the backend declined or altered a submitted prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredPromptNotice {
    pub text: String,
    pub reason: String,
}

/// Asynchronous signals emitted by a live backend session.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// The backend confirmed session establishment; audio will follow.
    SessionReady,
    /// A decoded chunk of generated audio.
    Audio(AudioFrame),
    /// A submitted prompt was filtered. Advisory, weights are untouched.
    FilteredPrompt(FilteredPromptNotice),
    /// Transient mid-stream disconnect; the session may be reconnected.
    StreamInterrupted(String),
    /// Terminal failure; the session is gone.
    SessionClosed(String),
}

/// Handle to one logical backend session.
///
/// All methods take `&self` so the handle can be shared with in-flight
/// submission tasks; implementations are expected to be channel-backed.
#[async_trait]
pub trait SessionHandle: Send + Sync + 'static {
    /// Replace the session's weighted-prompt set.
    ///
    /// Fails with [`Error::InvalidPrompt`](crate::Error::InvalidPrompt)
    /// when the backend rejects the set outright; per-prompt filtering
    /// arrives asynchronously as [`BackendEvent::FilteredPrompt`].
    async fn set_weighted_prompts(&self, prompts: &WeightedPromptSet) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Release the session on the backend side.
    async fn stop(&self) -> Result<()>;
}

/// The generative-audio backend.
#[async_trait]
pub trait MusicBackend: Send + Sync + 'static {
    type Handle: SessionHandle;

    /// Establish a new session against `model_id`.
    ///
    /// Returns the handle plus the event stream for that session; dropping
    /// the receiver does not tear the session down, [`SessionHandle::stop`]
    /// does.
    async fn create_session(
        &self,
        model_id: &str,
    ) -> Result<(Self::Handle, mpsc::Receiver<BackendEvent>)>;
}
