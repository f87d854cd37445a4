// src/tracking.rs - Landmarks → finger states → gesture for one frame
use crate::classifier::{classify, Classification};
use crate::fingers::{FingerStateExtractor, FingerStates};
use crate::landmarks::HandPose;
use crate::mediapipe_bridge::RawHands;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub pose: Option<HandPose>,
    pub finger_states: FingerStates,
    pub classification: Classification,
}

impl FrameAnalysis {
    pub fn empty() -> Self {
        Self {
            pose: None,
            finger_states: FingerStates::NONE,
            classification: Classification::NONE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    extractor: FingerStateExtractor,
}

impl GestureTracker {
    pub fn new(extractor: FingerStateExtractor) -> Self {
        Self { extractor }
    }

    /// Only the first hand is considered. A malformed hand degrades to
    /// "no gesture" for this frame.
    pub fn analyze(&self, hands: &RawHands) -> FrameAnalysis {
        let Some(first) = hands.first() else {
            return FrameAnalysis::empty();
        };

        let pose = match HandPose::from_raw(first) {
            Ok(pose) => pose,
            Err(e) => {
                debug!(error = %e, "discarding malformed hand");
                return FrameAnalysis::empty();
            }
        };

        let finger_states = self.extractor.extract(&pose);
        let classification = classify(&finger_states, Some(&pose));

        FrameAnalysis {
            pose: Some(pose),
            finger_states,
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Gesture;
    use crate::mediapipe_bridge::synthetic_hand;

    #[test]
    fn no_hand_is_no_gesture() {
        let analysis = GestureTracker::default().analyze(&Vec::new());
        assert_eq!(analysis, FrameAnalysis::empty());
    }

    #[test]
    fn malformed_hand_is_no_gesture_not_a_fist() {
        let hands = vec![vec![[0.5, 0.5, 0.0]; 7]];
        let analysis = GestureTracker::default().analyze(&hands);
        assert_eq!(analysis.classification, Classification::NONE);
        assert_eq!(analysis.finger_states, FingerStates::NONE);
        assert!(analysis.pose.is_none());
    }

    #[test]
    fn only_first_hand_is_used() {
        let hands = vec![
            synthetic_hand([false, true, true, false, false]),
            synthetic_hand([true; 5]),
        ];
        let analysis = GestureTracker::default().analyze(&hands);
        assert_eq!(analysis.classification.gesture, Some(Gesture::TwoFingers));
        assert_eq!(analysis.classification.confidence, 0.88);
    }
}
