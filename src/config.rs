use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Tunable constants for the whole reactive pipeline.
///
/// Every section falls back to its defaults when missing from a config file,
/// so a partial JSON document such as `{"beat": {"threshold": 1.3}}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VisualizerConfig {
    pub spectrum: SpectrumConfig,
    pub beat: BeatConfig,
    pub bars: BarConfig,
    pub particles: ParticleConfig,
    pub playback: PlaybackConfig,
    pub camera: CameraConfig,
    /// Seed for particle velocities and hues; `None` draws from OS entropy
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Number of magnitude bins per frame (fft size is twice this)
    pub bins: usize,
    /// Temporal smoothing between analyser frames, in [0, 1)
    pub smoothing: f32,
    /// Floor applied to the dB output so silence stays finite
    pub min_decibels: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            bins: 64,
            smoothing: 0.8,
            min_decibels: -140.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Energy must exceed the rolling average by this factor
    pub threshold: f32,
    /// Number of energy samples in the rolling window
    pub history: usize,
    /// Refractory interval between two reported beats, in seconds
    pub interval: f64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            threshold: 1.118,
            history: 15,
            interval: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    pub count: usize,
    /// Distance between neighbouring bars along x
    pub spacing: f32,
    /// Calibration offset mapping the analyser's dB range to a multiplier
    pub offset: f32,
    /// Vertical gain applied to the reactive scale
    pub amplification: f32,
    /// Idle wave: radians per second of travel
    pub idle_speed: f32,
    /// Idle wave: phase step between neighbouring bars
    pub idle_phase_step: f32,
    pub idle_base: f32,
    pub idle_gain: f32,
    /// Idle hue = height / idle_hue_divisor + idle_hue_offset
    pub idle_hue_divisor: f32,
    pub idle_hue_offset: f32,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            count: 64,
            spacing: 3.0,
            offset: 140.0,
            amplification: 28.0,
            idle_speed: 2.0,
            idle_phase_step: 0.3,
            idle_base: 1.5,
            idle_gain: 7.0,
            idle_hue_divisor: 15.0,
            idle_hue_offset: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Particles per cluster
    pub per_cluster: usize,
    /// Each velocity component is uniform in [-range, range)
    pub velocity_range: f32,
    /// Fixed per-frame position step, deliberately not scaled by real time
    pub step_scale: f32,
    /// Fixed per-frame opacity decay
    pub decay: f32,
    pub size: f32,
    pub initial_opacity: f32,
    /// Optional cap on live clusters; oldest are retired first
    pub max_clusters: Option<usize>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            per_cluster: 2,
            velocity_range: 5.0,
            step_scale: 0.1,
            decay: 0.001,
            size: 2.0,
            initial_opacity: 1.0,
            max_clusters: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Start playing as soon as a track finishes decoding
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { autoplay: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Share of the pending drag rotation applied each frame, in (0, 1]
    pub damping: f32,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            damping: 0.25,
            rotate_speed: 1.0,
            min_distance: 10.0,
            max_distance: 500.0,
        }
    }
}

impl VisualizerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bars.count == 0 {
            return Err(ConfigError::ZeroCount("bars.count"));
        }
        if self.spectrum.bins == 0 {
            return Err(ConfigError::ZeroCount("spectrum.bins"));
        }
        if self.spectrum.bins < self.bars.count {
            return Err(ConfigError::SpectrumTooShort {
                bins: self.spectrum.bins,
                bars: self.bars.count,
            });
        }
        if !(0.0..1.0).contains(&self.spectrum.smoothing) {
            return Err(out_of_range("spectrum.smoothing", self.spectrum.smoothing));
        }
        if self.beat.history == 0 {
            return Err(ConfigError::ZeroCount("beat.history"));
        }
        if self.beat.interval < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "beat.interval",
                value: self.beat.interval,
            });
        }
        if self.bars.offset <= 0.0 {
            return Err(out_of_range("bars.offset", self.bars.offset));
        }
        if self.particles.per_cluster == 0 {
            return Err(ConfigError::ZeroCount("particles.per_cluster"));
        }
        if self.particles.decay <= 0.0 {
            return Err(out_of_range("particles.decay", self.particles.decay));
        }
        if self.particles.initial_opacity <= 0.0 {
            return Err(out_of_range(
                "particles.initial_opacity",
                self.particles.initial_opacity,
            ));
        }
        if self.particles.velocity_range < 0.0 {
            return Err(out_of_range(
                "particles.velocity_range",
                self.particles.velocity_range,
            ));
        }
        if self.particles.max_clusters == Some(0) {
            return Err(ConfigError::ZeroCount("particles.max_clusters"));
        }
        if !(self.camera.damping > 0.0 && self.camera.damping <= 1.0) {
            return Err(out_of_range("camera.damping", self.camera.damping));
        }
        if self.camera.min_distance <= 0.0 {
            return Err(out_of_range("camera.min_distance", self.camera.min_distance));
        }
        if self.camera.max_distance < self.camera.min_distance {
            return Err(out_of_range("camera.max_distance", self.camera.max_distance));
        }
        Ok(())
    }
}

fn out_of_range(name: &'static str, value: f32) -> ConfigError {
    ConfigError::OutOfRange {
        name,
        value: value as f64,
    }
}
