// src/config.rs - Application configuration
use crate::actions::ActionTable;
use crate::capture::CameraSettings;
use crate::classifier::Gesture;
use crate::dispatch::{
    ActionDispatcher, ActionSettings, DryRunRunner, OsCommandRunner, SystemController,
};
use crate::fingers::DEFAULT_FINGER_TOLERANCE;
use crate::gate::GateConfig;
use crate::mediapipe_bridge::{LandmarkEstimator, SidecarEstimator, SimulatedEstimator};
use crate::pipeline::PipelineConfig;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "GESTURE_CONTROL_CONFIG";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("estimator sidecar program is empty")]
    EmptySidecarProgram,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    pub finger_tolerance: f64,
    pub hold_time_secs: f64,
    pub cooldown_secs: f64,
    /// Per-gesture minimum confidence, keyed by gesture label.
    pub min_confidence: HashMap<Gesture, f64>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            finger_tolerance: DEFAULT_FINGER_TOLERANCE,
            hold_time_secs: 1.0,
            cooldown_secs: 2.0,
            min_confidence: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub frame_delay_ms: u64,
    pub read_retry_delay_ms: u64,
    pub max_consecutive_errors: u32,
    pub max_reopen_attempts: u32,
    pub stop_timeout_ms: u64,
    pub settle_delay_ms: u64,
    /// TrueType font for the frame label.
    pub label_font: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_delay_ms: 50,
            read_retry_delay_ms: 100,
            max_consecutive_errors: 5,
            max_reopen_attempts: 1,
            stop_timeout_ms: 3000,
            settle_delay_ms: 1000,
            label_font: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    /// External landmark process speaking the line protocol on stdin/stdout.
    Sidecar {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Simulation {
        #[serde(default = "default_dwell_frames")]
        dwell_frames: u64,
        #[serde(default = "default_gap_frames")]
        gap_frames: u64,
    },
}

fn default_dwell_frames() -> u64 {
    60
}

fn default_gap_frames() -> u64 {
    20
}

impl EstimatorConfig {
    pub fn is_simulation(&self) -> bool {
        matches!(self, EstimatorConfig::Simulation { .. })
    }

    pub fn build(&self) -> anyhow::Result<Box<dyn LandmarkEstimator>> {
        match self {
            EstimatorConfig::Sidecar { program, args } => {
                Ok(Box::new(SidecarEstimator::spawn(program, args)?))
            }
            EstimatorConfig::Simulation {
                dwell_frames,
                gap_frames,
            } => {
                warn!("no landmark sidecar configured, running the gesture simulation");
                Ok(Box::new(SimulatedEstimator::new(*dwell_frames, *gap_frames)))
            }
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Simulation {
            dwell_frames: default_dwell_frames(),
            gap_frames: default_gap_frames(),
        }
    }
}

/// Whether fired gestures reach the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Live,
    DryRun,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/actions.csv`.
    pub action_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraSettings,
    pub recognition: RecognitionConfig,
    pub pipeline: PipelineSettings,
    pub estimator: EstimatorConfig,
    pub actions: ActionSettings,
    pub storage: StorageConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            recognition: RecognitionConfig::default(),
            pipeline: PipelineSettings::default(),
            estimator: EstimatorConfig::default(),
            actions: ActionSettings::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gesturecontrol", "gesture_control")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

impl AppConfig {
    /// Resolution order: `$GESTURE_CONTROL_CONFIG`, the platform config file,
    /// then built-in defaults. An explicitly named file must exist.
    pub fn load() -> anyhow::Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                info!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.recognition;
        check_range("recognition.finger_tolerance", r.finger_tolerance, 0.0, 0.5)?;
        if !(r.hold_time_secs.is_finite() && r.hold_time_secs > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "recognition.hold_time_secs",
            });
        }
        if !(r.cooldown_secs.is_finite() && r.cooldown_secs > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "recognition.cooldown_secs",
            });
        }
        for (gesture, min) in &r.min_confidence {
            check_range(&format!("recognition.min_confidence.{gesture}"), *min, 0.0, 1.0)?;
        }

        let p = &self.pipeline;
        let positive = [
            ("pipeline.frame_delay_ms", p.frame_delay_ms),
            ("pipeline.read_retry_delay_ms", p.read_retry_delay_ms),
            ("pipeline.max_consecutive_errors", u64::from(p.max_consecutive_errors)),
            ("pipeline.stop_timeout_ms", p.stop_timeout_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }

        if self.camera.width == 0 {
            return Err(ConfigError::NotPositive { field: "camera.width" });
        }
        if self.camera.height == 0 {
            return Err(ConfigError::NotPositive { field: "camera.height" });
        }
        if self.camera.fps == 0 {
            return Err(ConfigError::NotPositive { field: "camera.fps" });
        }

        if let EstimatorConfig::Sidecar { program, .. } = &self.estimator {
            if program.trim().is_empty() {
                return Err(ConfigError::EmptySidecarProgram);
            }
        }
        Ok(())
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            hold_time: Duration::from_secs_f64(self.recognition.hold_time_secs),
            cooldown: Duration::from_secs_f64(self.recognition.cooldown_secs),
        }
    }

    pub fn action_table(&self) -> ActionTable {
        ActionTable::with_overrides(&self.recognition.min_confidence)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            camera: self.camera.clone(),
            gate: self.gate_config(),
            finger_tolerance: self.recognition.finger_tolerance,
            frame_delay: Duration::from_millis(p.frame_delay_ms),
            read_retry_delay: Duration::from_millis(p.read_retry_delay_ms),
            max_consecutive_errors: p.max_consecutive_errors,
            max_reopen_attempts: p.max_reopen_attempts,
            stop_timeout: Duration::from_millis(p.stop_timeout_ms),
            settle_delay: Duration::from_millis(p.settle_delay_ms),
            label_font: p.label_font.clone(),
        }
    }

    /// Simulated landmarks never drive real commands.
    pub fn command_mode(&self) -> CommandMode {
        if self.estimator.is_simulation() || self.actions.dry_run {
            CommandMode::DryRun
        } else {
            CommandMode::Live
        }
    }

    pub fn dispatcher(&self, actions: ActionTable) -> Box<dyn ActionDispatcher> {
        match self.command_mode() {
            CommandMode::Live => {
                let runner =
                    OsCommandRunner::new(self.actions.browser_url.clone(), self.screenshots_dir());
                Box::new(SystemController::new(actions, runner))
            }
            CommandMode::DryRun => {
                warn!("dry run: fired gestures are logged, no commands are executed");
                Box::new(SystemController::new(actions, DryRunRunner))
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        match project_dirs() {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => {
                warn!("no platform data directory, using ./gesture_control_data");
                PathBuf::from("gesture_control_data")
            }
        }
    }

    pub fn action_log_path(&self) -> PathBuf {
        self.storage
            .action_log
            .clone()
            .unwrap_or_else(|| self.data_dir().join("actions.csv"))
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.actions
            .screenshots_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("screenshots"))
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}
