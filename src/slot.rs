// src/slot.rs - Most-recent-result cell shared between the pipeline and readers
use crate::classifier::Gesture;
use crate::fingers::FingerStates;
use image::RgbImage;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct LatestResult {
    pub frame: Option<Arc<RgbImage>>,
    pub gesture: Option<Gesture>,
    pub confidence: f64,
    pub finger_states: FingerStates,
    pub frame_id: u64,
}

/// Single-value cell: every publish overwrites, readers copy out the latest
/// value. Both sides hold the lock only for a clone.
#[derive(Debug, Clone, Default)]
pub struct SharedSlot {
    inner: Arc<Mutex<LatestResult>>,
}

impl SharedSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: LatestResult) {
        *self.lock() = result;
    }

    pub fn snapshot(&self) -> LatestResult {
        self.lock().clone()
    }

    /// Gesture and confidence without touching the frame.
    pub fn current_gesture(&self) -> (Option<Gesture>, f64) {
        let guard = self.lock();
        (guard.gesture, guard.confidence)
    }

    /// Keeps the last frame but drops the gesture so stopped pipelines do
    /// not report a stale detection.
    pub fn clear_gesture(&self) {
        let mut guard = self.lock();
        guard.gesture = None;
        guard.confidence = 0.0;
        guard.finger_states = FingerStates::NONE;
    }

    fn lock(&self) -> MutexGuard<'_, LatestResult> {
        // A panicking writer cannot leave a half-assigned value behind, so the
        // poisoned contents are still a complete result.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
