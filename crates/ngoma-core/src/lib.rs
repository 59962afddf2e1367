//! Ngoma core: session orchestration for prompt-weighted realtime
//! generative music.
//!
//! The crate owns the prompt palette and its weights, a resilient session
//! state machine over a pluggable generative-audio backend, and the
//! audio-level sampling that drives visual feedback. Controllers, UIs and
//! concrete backends live outside; they talk to the core through
//! [`UiIntent`], [`Notification`] and the [`MusicBackend`] trait.

#![forbid(unsafe_code)]

pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod level;
pub mod orchestrator;
pub mod prompt;
pub mod session;

pub use audio::{AudioFrame, AudioSink, LevelTap, NullSink};
pub use backend::{BackendEvent, FilteredPromptNotice, MusicBackend, SessionHandle};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use events::{Notification, PlaybackState, UiIntent};
pub use level::AudioLevelMonitor;
pub use orchestrator::Orchestrator;
pub use prompt::{
    build_initial_prompts, default_palette, PalettePrompt, Prompt, PromptStore, WeightedPromptSet,
};
pub use session::{SessionCommand, SessionController, SessionState};
