// src/lib.rs
pub mod actions;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod fingers;
pub mod gate;
pub mod landmarks;
pub mod mediapipe_bridge;
pub mod overlay;
pub mod pipeline;
pub mod slot;
pub mod tracking;

pub use classifier::{classify, Classification, Gesture};
pub use config::AppConfig;
pub use pipeline::{Collaborators, Pipeline, PipelineError, PipelineStatus, StopOutcome};
