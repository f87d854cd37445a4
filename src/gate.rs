// src/gate.rs - Hold-time + cooldown debounce for gesture actions
use crate::actions::ActionTable;
use crate::classifier::Gesture;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Minimum unbroken run of the same gesture before it can fire.
    pub hold_time: Duration,
    /// Minimum spacing between two fired actions, across all gestures.
    pub cooldown: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hold_time: Duration::from_secs_f64(1.0),
            cooldown: Duration::from_secs_f64(2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Tracking { gesture: Gesture, since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateFire {
    pub gesture: Gesture,
    pub confidence: f64,
    pub held_for: Duration,
}

/// Turns noisy per-frame classifications into discrete action triggers.
///
/// A gesture fires only when it has been observed continuously for
/// `hold_time` and at least `cooldown` has passed since the previous fire.
/// Observations below the gesture's minimum confidence, or for gestures
/// without an action entry, count as "no gesture" and break the run.
#[derive(Debug, Clone)]
pub struct GestureGate {
    config: GateConfig,
    state: GateState,
    last_fire: Option<Instant>,
    last_fired: Option<Gesture>,
}

impl GestureGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: GateState::Idle,
            last_fire: None,
            last_fired: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn last_fired(&self) -> Option<Gesture> {
        self.last_fired
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
        self.last_fire = None;
        self.last_fired = None;
    }

    pub fn update(
        &mut self,
        gesture: Option<Gesture>,
        confidence: f64,
        now: Instant,
        actions: &ActionTable,
    ) -> Option<GateFire> {
        let observed = gesture.filter(|g| {
            actions
                .min_confidence(*g)
                .is_some_and(|min| confidence >= min)
        });

        let Some(observed) = observed else {
            self.state = GateState::Idle;
            return None;
        };

        let since = match self.state {
            GateState::Tracking { gesture, since } if gesture == observed => since,
            _ => {
                debug!(gesture = %observed, "gate tracking new gesture");
                self.state = GateState::Tracking {
                    gesture: observed,
                    since: now,
                };
                return None;
            }
        };

        let held_for = now.saturating_duration_since(since);
        if held_for < self.config.hold_time {
            return None;
        }

        let cooled_down = self
            .last_fire
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.cooldown);
        if !cooled_down {
            return None;
        }

        self.last_fire = Some(now);
        self.last_fired = Some(observed);
        Some(GateFire {
            gesture: observed,
            confidence,
            held_for,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn gate() -> GestureGate {
        GestureGate::new(GateConfig::default())
    }

    #[test]
    fn fires_once_after_hold_time() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        let mut fires = Vec::new();
        // 50 ms updates for 1.5 s
        for step in 0..=30 {
            let now = t0 + ms(step * 50);
            if let Some(fire) = gate.update(Some(Gesture::OpenHand), 0.95, now, &table) {
                fires.push((step, fire));
            }
        }

        assert_eq!(fires.len(), 1);
        let (step, fire) = fires[0];
        assert_eq!(step, 20);
        assert_eq!(fire.gesture, Gesture::OpenHand);
        assert_eq!(fire.held_for, ms(1000));
        assert_eq!(gate.last_fired(), Some(Gesture::OpenHand));
    }

    #[test]
    fn sustained_gesture_refires_only_after_cooldown() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        let fire_times: Vec<u64> = (0..=80)
            .map(|step| step * 50)
            .filter(|&t| {
                gate.update(Some(Gesture::ThumbsUp), 0.85, t0 + ms(t), &table)
                    .is_some()
            })
            .collect();

        assert_eq!(fire_times, vec![1000, 3000]);
    }

    #[test]
    fn gesture_change_restarts_hold() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0, &table).is_none());
        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(900), &table).is_none());
        assert!(gate.update(Some(Gesture::ClosedFist), 0.9, t0 + ms(950), &table).is_none());
        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(1000), &table).is_none());
        assert_eq!(
            gate.state(),
            GateState::Tracking {
                gesture: Gesture::OpenHand,
                since: t0 + ms(1000)
            }
        );

        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(1900), &table).is_none());
        let fire = gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(2000), &table);
        assert_eq!(fire.map(|f| f.gesture), Some(Gesture::OpenHand));
    }

    #[test]
    fn missing_hand_breaks_the_run() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        gate.update(Some(Gesture::RockSign), 0.82, t0, &table);
        gate.update(None, 0.0, t0 + ms(500), &table);
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.update(Some(Gesture::RockSign), 0.82, t0 + ms(1200), &table).is_none());
        assert!(gate.update(Some(Gesture::RockSign), 0.82, t0 + ms(2200), &table).is_some());
    }

    #[test]
    fn low_confidence_never_fires() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        for step in 0..200 {
            let fire = gate.update(Some(Gesture::TwoFingers), 0.69, t0 + ms(step * 50), &table);
            assert!(fire.is_none());
        }
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn unmapped_gesture_never_fires() {
        let table = ActionTable::empty();
        let mut gate = gate();
        let t0 = Instant::now();

        for step in 0..100 {
            assert!(gate
                .update(Some(Gesture::OpenHand), 0.95, t0 + ms(step * 50), &table)
                .is_none());
        }
    }

    #[test]
    fn cooldown_spans_different_gestures() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        gate.update(Some(Gesture::OpenHand), 0.95, t0, &table);
        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(1000), &table).is_some());

        gate.update(Some(Gesture::ClosedFist), 0.9, t0 + ms(1100), &table);
        // Held long enough but still inside the cooldown of the first fire
        assert!(gate.update(Some(Gesture::ClosedFist), 0.9, t0 + ms(2100), &table).is_none());
        assert!(gate.update(Some(Gesture::ClosedFist), 0.9, t0 + ms(3000), &table).is_some());
    }

    #[test]
    fn reset_clears_history() {
        let table = ActionTable::default();
        let mut gate = gate();
        let t0 = Instant::now();

        gate.update(Some(Gesture::OpenHand), 0.95, t0, &table);
        gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(1000), &table);
        gate.reset();

        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(gate.last_fired(), None);
        // No cooldown carries over
        gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(1100), &table);
        assert!(gate.update(Some(Gesture::OpenHand), 0.95, t0 + ms(2100), &table).is_some());
    }
}
