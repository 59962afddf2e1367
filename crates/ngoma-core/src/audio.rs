//! Audio frame types and the output-graph seam.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;

/// A decoded chunk of backend audio, interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.channels as f32 / self.sample_rate as f32
    }
}

/// The host audio output graph node.
///
/// Writes may fail when the device is unavailable; the session controller
/// logs those and keeps streaming rather than crashing.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn write(&self, frame: AudioFrame) -> Result<()>;
}

/// Sink that discards every frame. Used when no output device is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn write(&self, _frame: AudioFrame) -> Result<()> {
        Ok(())
    }
}

/// Loudness tap shared between the session controller and the level monitor.
///
/// The controller writes a new value for every frame it forwards and resets
/// the tap whenever forwarding stops; the monitor only reads. A tap with no
/// signal reads as zero.
#[derive(Debug, Clone, Default)]
pub struct LevelTap {
    level: Arc<Mutex<f32>>,
}

impl LevelTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the loudness of a forwarded frame, normalized into `[0, 1]`.
    pub fn update(&self, frame: &AudioFrame) {
        let finite: Vec<f32> = frame
            .samples
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .collect();
        if finite.is_empty() {
            self.set(0.0);
            return;
        }

        let rms = (finite.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
            / finite.len() as f64)
            .sqrt() as f32;
        // RMS of a full-scale sine is 1/sqrt(2); scale so it reads as 1.0.
        self.set((rms * std::f32::consts::SQRT_2).clamp(0.0, 1.0));
    }

    pub fn reset(&self) {
        self.set(0.0);
    }

    pub fn level(&self) -> f32 {
        match self.level.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, value: f32) {
        match self.level.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_reads_zero_without_signal() {
        let tap = LevelTap::new();
        assert_eq!(tap.level(), 0.0);
    }

    #[test]
    fn tap_normalizes_a_full_scale_sine_to_one() {
        let samples: Vec<f32> = (0..480)
            .map(|i| (i as f32 / 480.0 * std::f32::consts::TAU).sin())
            .collect();
        let tap = LevelTap::new();
        tap.update(&AudioFrame::new(samples, 1, 48_000));
        assert!((tap.level() - 1.0).abs() < 0.01, "level {}", tap.level());
    }

    #[test]
    fn tap_clamps_hot_signals_and_ignores_non_finite_samples() {
        let tap = LevelTap::new();
        tap.update(&AudioFrame::new(vec![4.0; 64], 1, 48_000));
        assert_eq!(tap.level(), 1.0);

        tap.update(&AudioFrame::new(vec![f32::NAN; 8], 1, 48_000));
        assert_eq!(tap.level(), 0.0);
    }

    #[test]
    fn tap_resets_to_zero() {
        let tap = LevelTap::new();
        tap.update(&AudioFrame::new(vec![0.5; 64], 1, 48_000));
        assert!(tap.level() > 0.0);
        tap.reset();
        assert_eq!(tap.level(), 0.0);
    }

    #[test]
    fn frame_duration_handles_degenerate_shapes() {
        assert_eq!(AudioFrame::new(vec![0.0; 96], 2, 48_000).duration_secs(), 0.001);
        assert_eq!(AudioFrame::new(Vec::new(), 0, 0).duration_secs(), 0.0);
    }
}
