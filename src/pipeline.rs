// src/pipeline.rs - Capture → recognition → gate → dispatch loop on a background thread
use crate::actions::{ActionTable, DEFAULT_MIN_CONFIDENCE};
use crate::capture::{CameraSettings, CaptureDevice, CaptureError, CaptureFactory};
use crate::classifier::Gesture;
use crate::data::ActionLog;
use crate::dispatch::ActionDispatcher;
use crate::fingers::{FingerStateExtractor, DEFAULT_FINGER_TOLERANCE};
use crate::gate::{GateConfig, GateFire, GestureGate};
use crate::mediapipe_bridge::{LandmarkEstimator, RawHands};
use crate::overlay;
use crate::slot::{LatestResult, SharedSlot};
use crate::tracking::GestureTracker;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const FIRE_FLASH: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub camera: CameraSettings,
    pub gate: GateConfig,
    pub finger_tolerance: f64,
    pub frame_delay: Duration,
    pub read_retry_delay: Duration,
    /// Consecutive failed reads that abort the capture session.
    pub max_consecutive_errors: u32,
    /// Re-opens allowed per session after aborted capture before the loop
    /// gives up.
    pub max_reopen_attempts: u32,
    pub stop_timeout: Duration,
    pub settle_delay: Duration,
    /// Font for the gesture label. Falls back to a system font.
    pub label_font: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            gate: GateConfig::default(),
            finger_tolerance: DEFAULT_FINGER_TOLERANCE,
            frame_delay: Duration::from_millis(50),
            read_retry_delay: Duration::from_millis(100),
            max_consecutive_errors: 5,
            max_reopen_attempts: 1,
            stop_timeout: Duration::from_secs(3),
            settle_delay: Duration::from_secs(1),
            label_font: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is already running")]
    AlreadyRunning,
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(#[source] CaptureError),
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("pipeline thread exited during startup")]
    StartupAborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
    /// The loop did not exit within the stop timeout. It has been told to
    /// stop and keeps the pipeline busy until it does.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Cancelled,
    TooManyFailures,
    DeviceLost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatus {
    pub running: bool,
    pub camera_index: u32,
    pub gesture: Option<Gesture>,
    pub confidence: f64,
    pub frame_id: u64,
    pub last_exit: Option<ExitReason>,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first. Returns true when
    /// cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

type Shared<T> = Arc<Mutex<T>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything the pipeline talks to besides its own state.
pub struct Collaborators {
    pub capture: Arc<dyn CaptureFactory>,
    pub estimator: Box<dyn LandmarkEstimator>,
    pub dispatcher: Box<dyn ActionDispatcher>,
    pub log: Arc<dyn ActionLog>,
}

struct Session {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Pipeline {
    capture: Arc<dyn CaptureFactory>,
    estimator: Shared<Box<dyn LandmarkEstimator>>,
    dispatcher: Shared<Box<dyn ActionDispatcher>>,
    log: Arc<dyn ActionLog>,
    actions: Arc<ActionTable>,
    config: PipelineConfig,
    slot: SharedSlot,
    camera_index: u32,
    session: Option<Session>,
    last_exit: Shared<Option<ExitReason>>,
}

impl Pipeline {
    pub fn new(parts: Collaborators, actions: ActionTable, config: PipelineConfig) -> Self {
        let camera_index = config.camera.index;
        Self {
            capture: parts.capture,
            estimator: Arc::new(Mutex::new(parts.estimator)),
            dispatcher: Arc::new(Mutex::new(parts.dispatcher)),
            log: parts.log,
            actions: Arc::new(actions),
            config,
            slot: SharedSlot::new(),
            camera_index,
            session: None,
            last_exit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn latest(&self) -> SharedSlot {
        self.slot.clone()
    }

    pub fn action_table(&self) -> &ActionTable {
        &self.actions
    }

    pub fn action_log(&self) -> Arc<dyn ActionLog> {
        Arc::clone(&self.log)
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    pub fn status(&self) -> PipelineStatus {
        let latest = self.slot.snapshot();
        PipelineStatus {
            running: self.is_running(),
            camera_index: self.camera_index,
            gesture: latest.gesture,
            confidence: latest.confidence,
            frame_id: latest.frame_id,
            last_exit: *lock(&self.last_exit),
        }
    }

    /// Opens the device on the loop thread and returns once it has produced
    /// a frame. On failure nothing keeps running.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        self.reap();

        let token = CancellationToken::new();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = Worker {
            capture: Arc::clone(&self.capture),
            estimator: Arc::clone(&self.estimator),
            dispatcher: Arc::clone(&self.dispatcher),
            log: Arc::clone(&self.log),
            actions: Arc::clone(&self.actions),
            config: self.config.clone(),
            camera_index: self.camera_index,
            slot: self.slot.clone(),
            token: token.clone(),
            last_exit: Arc::clone(&self.last_exit),
        };
        *lock(&self.last_exit) = None;

        let handle = thread::Builder::new()
            .name("gesture-pipeline".to_string())
            .spawn(move || worker.run(ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(camera = self.camera_index, "pipeline started");
                self.session = Some(Session { token, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                error!(camera = self.camera_index, error = %e, "pipeline failed to start");
                Err(PipelineError::DeviceUnavailable(e))
            }
            Err(_) => {
                let _ = handle.join();
                error!(camera = self.camera_index, "pipeline thread died during startup");
                Err(PipelineError::StartupAborted)
            }
        }
    }

    /// Signals the loop and waits up to the stop timeout for it to exit.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(session) = self.session.as_ref() else {
            return StopOutcome::NotRunning;
        };
        if session.handle.is_finished() {
            self.reap();
            return StopOutcome::NotRunning;
        }

        session.token.cancel();
        let deadline = Instant::now() + self.config.stop_timeout;
        while !session.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "pipeline did not stop in time"
                );
                return StopOutcome::TimedOut;
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.reap();
        info!("pipeline stopped");
        StopOutcome::Stopped
    }

    /// Switches devices. A running pipeline is stopped, given the settle
    /// delay, and restarted on the new device.
    pub fn set_camera(&mut self, index: u32) -> Result<(), PipelineError> {
        if index == self.camera_index && self.is_running() {
            return Ok(());
        }

        let was_running = self.is_running();
        if was_running {
            if self.stop() == StopOutcome::TimedOut {
                return Err(PipelineError::AlreadyRunning);
            }
            thread::sleep(self.config.settle_delay);
        }

        info!(from = self.camera_index, to = index, "switching camera");
        self.camera_index = index;
        if was_running {
            self.start()
        } else {
            Ok(())
        }
    }

    fn reap(&mut self) {
        if let Some(session) = self.session.take() {
            if session.handle.join().is_err() {
                error!("pipeline thread panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Step {
    Frame(RgbImage, RawHands),
    Failed,
}

struct Worker {
    capture: Arc<dyn CaptureFactory>,
    estimator: Shared<Box<dyn LandmarkEstimator>>,
    dispatcher: Shared<Box<dyn ActionDispatcher>>,
    log: Arc<dyn ActionLog>,
    actions: Arc<ActionTable>,
    config: PipelineConfig,
    camera_index: u32,
    slot: SharedSlot,
    token: CancellationToken,
    last_exit: Shared<Option<ExitReason>>,
}

impl Worker {
    fn run(self, ready: mpsc::Sender<Result<(), CaptureError>>) {
        let device = match self.open_verified() {
            Ok(device) => {
                let _ = ready.send(Ok(()));
                device
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        drop(ready);

        let reason = self.run_loop(device);
        *lock(&self.last_exit) = Some(reason);
        self.slot.clear_gesture();
        info!(?reason, camera = self.camera_index, "pipeline loop exited");
    }

    /// Opens the device and reads one frame to prove it delivers.
    fn open_verified(&self) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let mut device = self.capture.open(self.camera_index, &self.config.camera)?;
        for _ in 0..self.config.max_consecutive_errors.max(1) {
            match device.read() {
                Ok(Some(_)) => return Ok(device),
                Ok(None) => debug!(camera = self.camera_index, "test frame missed"),
                Err(e) => debug!(camera = self.camera_index, error = %e, "test frame failed"),
            }
            if self.token.sleep(self.config.read_retry_delay) {
                break;
            }
        }
        device.release();
        Err(CaptureError::Unavailable {
            index: self.camera_index,
            reason: "no frame received from device".to_string(),
        })
    }

    fn run_loop(&self, mut device: Box<dyn CaptureDevice>) -> ExitReason {
        let tracker = GestureTracker::new(FingerStateExtractor::new(self.config.finger_tolerance));
        let mut gate = GestureGate::new(self.config.gate);
        let font = overlay::find_label_font(self.config.label_font.as_deref());
        let mut failures = 0u32;
        let mut reopens = 0u32;
        let mut frame_id = 0u64;
        let mut flash_until: Option<Instant> = None;

        let reason = loop {
            if self.token.is_cancelled() {
                break ExitReason::Cancelled;
            }

            let (mut frame, hands) = match self.next_step(device.as_mut()) {
                Step::Frame(frame, hands) => (frame, hands),
                Step::Failed => {
                    failures += 1;
                    if failures < self.config.max_consecutive_errors {
                        if self.token.sleep(self.config.read_retry_delay) {
                            break ExitReason::Cancelled;
                        }
                        continue;
                    }

                    warn!(
                        camera = self.camera_index,
                        failures, "too many consecutive capture failures"
                    );
                    device.release();
                    if reopens >= self.config.max_reopen_attempts {
                        break ExitReason::TooManyFailures;
                    }
                    reopens += 1;
                    if self.token.sleep(self.config.settle_delay) {
                        break ExitReason::Cancelled;
                    }
                    match self.capture.open(self.camera_index, &self.config.camera) {
                        Ok(reopened) => {
                            info!(
                                camera = self.camera_index,
                                attempt = reopens,
                                "camera re-opened"
                            );
                            device = reopened;
                            failures = 0;
                            continue;
                        }
                        Err(e) => {
                            error!(camera = self.camera_index, error = %e, "camera re-open failed");
                            break ExitReason::DeviceLost;
                        }
                    }
                }
            };
            failures = 0;
            frame_id += 1;

            let analysis = tracker.analyze(&hands);
            let classification = analysis.classification;
            let now = Instant::now();

            let min_confidence = classification
                .gesture
                .and_then(|g| self.actions.min_confidence(g))
                .unwrap_or(DEFAULT_MIN_CONFIDENCE);
            let flashing = flash_until.is_some_and(|until| now < until);
            overlay::annotate(&mut frame, &analysis, min_confidence, flashing, font.as_ref());

            self.slot.publish(LatestResult {
                frame: Some(Arc::new(frame)),
                gesture: classification.gesture,
                confidence: classification.confidence,
                finger_states: analysis.finger_states,
                frame_id,
            });

            if let Some(fire) =
                gate.update(classification.gesture, classification.confidence, now, &self.actions)
            {
                flash_until = Some(now + FIRE_FLASH);
                self.handle_fire(fire);
            }

            if self.token.sleep(self.config.frame_delay) {
                break ExitReason::Cancelled;
            }
        };

        device.release();
        reason
    }

    fn next_step(&self, device: &mut dyn CaptureDevice) -> Step {
        let frame = match device.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(camera = self.camera_index, "frame read missed");
                return Step::Failed;
            }
            Err(e) => {
                warn!(camera = self.camera_index, error = %e, "frame read failed");
                return Step::Failed;
            }
        };

        let estimated = lock(&self.estimator).process(&frame);
        match estimated {
            Ok(hands) => Step::Frame(frame, hands),
            Err(e) => {
                warn!(error = %e, "landmark estimation failed");
                Step::Failed
            }
        }
    }

    fn handle_fire(&self, fire: GateFire) {
        let Some(action) = self.actions.get(fire.gesture) else {
            return;
        };
        info!(
            gesture = %fire.gesture,
            confidence = fire.confidence,
            held_ms = fire.held_for.as_millis() as u64,
            "gesture fired"
        );

        let executed = lock(&self.dispatcher).execute(fire.gesture);
        if !executed {
            warn!(gesture = %fire.gesture, "action not executed, nothing logged");
            return;
        }

        match self.log.append(fire.gesture, action.description, fire.confidence) {
            Ok(record) => debug!(id = record.id, "action recorded"),
            Err(e) => error!(error = %e, "failed to record action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_token_cuts_sleep_short() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        assert!(token.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn uncancelled_sleep_runs_to_completion() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert!(!token.sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn default_config_matches_loop_timings() {
        let config = PipelineConfig::default();
        assert_eq!(config.frame_delay, Duration::from_millis(50));
        assert_eq!(config.read_retry_delay, Duration::from_millis(100));
        assert_eq!(config.max_consecutive_errors, 5);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
    }
}
