//! Audio-reactive bar field with beat-triggered particle bursts.
//!
//! The reactive core (`audio`, `effects`, `frame_driver`) is plain numeric
//! state; `graphics` and `ui` draw it with wgpu and egui.

pub mod audio;
pub mod config;
pub mod effects;
pub mod error;
pub mod frame_driver;
pub mod graphics;
pub mod ui;

pub use config::VisualizerConfig;
pub use error::{ConfigError, PlaybackError};
pub use frame_driver::{AudioInput, DriveMode, FrameDriver, FrameReport, RenderTarget, SceneState};
