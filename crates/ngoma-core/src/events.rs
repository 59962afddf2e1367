//! Typed publish/subscribe contract between the core and the UI.

use serde::{Deserialize, Serialize};

use crate::prompt::WeightedPromptSet;

/// Public view of the session state, for UI transport sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Loading,
    Playing,
    Paused,
}

/// Intents consumed from the UI collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiIntent {
    /// The user edited prompt weights.
    PromptsChanged { prompts: WeightedPromptSet },
    /// Toggle the transport.
    PlayPause,
}

/// Notifications produced for the UI and notification surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    PlaybackStateChanged { state: PlaybackState },
    /// Advisory filter feedback, shown as toast and inline marker.
    FilteredPrompt { text: String, reason: String },
    /// Fatal or advisory failure message, shown as toast.
    Error { message: String },
    /// Normalized loudness in `[0, 1]`, drives the visual meter.
    AudioLevelChanged { level: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_use_the_public_wire_names() {
        let json = serde_json::to_value(Notification::PlaybackStateChanged {
            state: PlaybackState::Loading,
        })
        .expect("serialize");
        assert_eq!(json["type"], "playback-state-changed");
        assert_eq!(json["state"], "loading");

        let json = serde_json::to_value(Notification::AudioLevelChanged { level: 0.25 })
            .expect("serialize");
        assert_eq!(json["type"], "audio-level-changed");

        let json = serde_json::to_value(Notification::FilteredPrompt {
            text: "Warm Cellos".to_string(),
            reason: "unsupported content".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "filtered-prompt");
    }

    #[test]
    fn intents_deserialize_from_the_public_wire_names() {
        let intent: UiIntent =
            serde_json::from_str(r#"{"type":"play-pause"}"#).expect("deserialize");
        assert!(matches!(intent, UiIntent::PlayPause));

        let intent: UiIntent =
            serde_json::from_str(r#"{"type":"prompts-changed","prompts":{}}"#)
                .expect("deserialize");
        assert!(matches!(intent, UiIntent::PromptsChanged { .. }));
    }
}
