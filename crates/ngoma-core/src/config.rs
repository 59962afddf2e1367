//! Session configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the streaming session core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Generative music model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Sample rate of the backend audio stream (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio level sampling interval (ms)
    #[serde(default = "default_level_tick_ms")]
    pub level_tick_ms: u64,

    /// Depth of the command and event channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_model_id() -> String {
    "lyria-realtime-exp".to_string()
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_level_tick_ms() -> u64 {
    50
}
fn default_channel_capacity() -> usize {
    32
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            sample_rate: default_sample_rate(),
            level_tick_ms: default_level_tick_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}
