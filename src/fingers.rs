// src/fingers.rs - Per-finger extension from landmark geometry
use crate::landmarks::{Finger, FingerGeometry, HandPose};
use std::fmt;

pub const DEFAULT_FINGER_TOLERANCE: f64 = 0.02;

/// Extension flags in [`Finger::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FingerStates(pub [bool; 5]);

impl FingerStates {
    pub const NONE: FingerStates = FingerStates([false; 5]);

    pub fn get(&self, finger: Finger) -> bool {
        self.0[finger.index()]
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&e| e).count()
    }

    /// Extended fingers excluding the thumb.
    pub fn others_extended(&self) -> usize {
        self.0[1..].iter().filter(|&&e| e).count()
    }

    pub fn as_array(&self) -> [bool; 5] {
        self.0
    }
}

impl From<[bool; 5]> for FingerStates {
    fn from(states: [bool; 5]) -> Self {
        Self(states)
    }
}

impl fmt::Display for FingerStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, extended) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", u8::from(*extended))?;
        }
        write!(f, "]")
    }
}

/// Axis-comparison heuristic with a single tolerance margin.
///
/// The thumb is judged on x (the frame is mirrored, so an extended thumb
/// lies left of its base); the other fingers on y, where a smaller value is
/// higher in the image.
#[derive(Debug, Clone, Copy)]
pub struct FingerStateExtractor {
    tolerance: f64,
}

impl Default for FingerStateExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FINGER_TOLERANCE)
    }
}

impl FingerStateExtractor {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn extract(&self, pose: &HandPose) -> FingerStates {
        self.extract_geometry(&pose.geometry())
    }

    pub fn extract_geometry(&self, geometry: &FingerGeometry) -> FingerStates {
        let mut states = [false; 5];
        for finger in Finger::ALL {
            let pair = geometry.pair(finger);
            states[finger.index()] = match finger {
                Finger::Thumb => pair.tip.x < pair.base.x + self.tolerance,
                _ => pair.tip.y < pair.base.y + self.tolerance,
            };
        }
        FingerStates(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::test_poses::{curled_hand, hand_with};
    use crate::landmarks::{INDEX_MCP, INDEX_TIP, THUMB_MCP, THUMB_TIP};

    fn pose(points: &[[f64; 3]]) -> HandPose {
        HandPose::from_raw(points).unwrap()
    }

    #[test]
    fn curled_hand_has_no_extended_fingers() {
        let states = FingerStateExtractor::default().extract(&pose(&curled_hand()));
        assert_eq!(states, FingerStates::NONE);
        assert_eq!(states.count(), 0);
    }

    #[test]
    fn detects_each_finger_independently() {
        let extractor = FingerStateExtractor::default();
        for finger in Finger::ALL {
            let mut expected = [false; 5];
            expected[finger.index()] = true;
            let states = extractor.extract(&pose(&hand_with(expected)));
            assert_eq!(states.as_array(), expected, "finger {}", finger.as_str());
        }
    }

    #[test]
    fn tolerance_admits_near_misses() {
        let mut points = curled_hand();
        // Index tip 0.01 below its base: curled without tolerance, extended with it
        points[INDEX_TIP] = [points[INDEX_MCP][0], points[INDEX_MCP][1] + 0.01, 0.0];
        // Thumb tip 0.01 right of its base
        points[THUMB_TIP] = [points[THUMB_MCP][0] + 0.01, points[THUMB_MCP][1], 0.0];
        let hand = pose(&points);

        let strict = FingerStateExtractor::new(0.0).extract(&hand);
        assert!(!strict.get(Finger::Index));
        assert!(!strict.get(Finger::Thumb));

        let tolerant = FingerStateExtractor::default().extract(&hand);
        assert!(tolerant.get(Finger::Index));
        assert!(tolerant.get(Finger::Thumb));
    }

    #[test]
    fn display_is_compact() {
        let states = FingerStates([true, false, true, true, false]);
        assert_eq!(states.to_string(), "[1,0,1,1,0]");
        assert_eq!(states.others_extended(), 2);
    }
}
