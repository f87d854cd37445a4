// src/classifier.rs - Ordered rule table from finger states to gestures
use crate::fingers::FingerStates;
use crate::landmarks::{Finger, HandPose};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Per-gesture minimum confidences in the action table are calibrated
// against these values.
pub const OPEN_HAND_CONFIDENCE: f64 = 0.95;
pub const CLOSED_FIST_CONFIDENCE: f64 = 0.90;
pub const THUMBS_UP_CONFIDENCE: f64 = 0.85;
pub const TWO_FINGERS_CONFIDENCE: f64 = 0.88;
pub const ROCK_SIGN_CONFIDENCE: f64 = 0.82;
pub const THUMBS_UP_RELAXED_CONFIDENCE: f64 = 0.80;
pub const OPEN_HAND_RELAXED_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    OpenHand,
    ClosedFist,
    ThumbsUp,
    TwoFingers,
    RockSign,
}

impl Gesture {
    pub const ALL: [Gesture; 5] = [
        Gesture::OpenHand,
        Gesture::ClosedFist,
        Gesture::ThumbsUp,
        Gesture::TwoFingers,
        Gesture::RockSign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::OpenHand => "open_hand",
            Gesture::ClosedFist => "closed_fist",
            Gesture::ThumbsUp => "thumbs_up",
            Gesture::TwoFingers => "two_fingers",
            Gesture::RockSign => "rock_sign",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Gesture::OpenHand => "Open Hand",
            Gesture::ClosedFist => "Closed Fist",
            Gesture::ThumbsUp => "Thumbs Up",
            Gesture::TwoFingers => "Two Fingers",
            Gesture::RockSign => "Rock Sign",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gesture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown gesture label: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub gesture: Option<Gesture>,
    pub confidence: f64,
}

impl Classification {
    pub const NONE: Classification = Classification {
        gesture: None,
        confidence: 0.0,
    };

    fn of(gesture: Gesture, confidence: f64) -> Self {
        Self {
            gesture: Some(gesture),
            confidence,
        }
    }

    pub fn label(&self) -> &'static str {
        self.gesture.map_or("none", |g| g.as_str())
    }
}

/// Maps finger states to a gesture; first matching rule wins.
///
/// The later rules only recover from imperfect extension detection. The
/// two-finger and rock rules require a curled thumb, so a thumb plus two
/// fingers lands in the relaxed open-hand rule.
pub fn classify(states: &FingerStates, _pose: Option<&HandPose>) -> Classification {
    let thumb = states.get(Finger::Thumb);
    let index = states.get(Finger::Index);
    let middle = states.get(Finger::Middle);
    let ring = states.get(Finger::Ring);
    let pinky = states.get(Finger::Pinky);
    let extended = states.count();

    if extended == 5 {
        Classification::of(Gesture::OpenHand, OPEN_HAND_CONFIDENCE)
    } else if extended == 0 {
        Classification::of(Gesture::ClosedFist, CLOSED_FIST_CONFIDENCE)
    } else if thumb && states.others_extended() == 0 {
        Classification::of(Gesture::ThumbsUp, THUMBS_UP_CONFIDENCE)
    } else if !thumb && index && middle && !ring && !pinky {
        Classification::of(Gesture::TwoFingers, TWO_FINGERS_CONFIDENCE)
    } else if !thumb && index && pinky && !middle && !ring {
        Classification::of(Gesture::RockSign, ROCK_SIGN_CONFIDENCE)
    } else if thumb && states.others_extended() <= 1 {
        Classification::of(Gesture::ThumbsUp, THUMBS_UP_RELAXED_CONFIDENCE)
    } else if extended >= 3 {
        Classification::of(Gesture::OpenHand, OPEN_HAND_RELAXED_CONFIDENCE)
    } else {
        Classification::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_vectors() -> impl Iterator<Item = FingerStates> {
        (0u8..32).map(|bits| {
            let mut states = [false; 5];
            for (i, s) in states.iter_mut().enumerate() {
                *s = bits & (1 << i) != 0;
            }
            FingerStates(states)
        })
    }

    fn check(states: [bool; 5], gesture: Option<Gesture>, confidence: f64) {
        let result = classify(&FingerStates(states), None);
        assert_eq!(result.gesture, gesture, "states {:?}", states);
        assert_eq!(result.confidence, confidence, "states {:?}", states);
    }

    #[test]
    fn all_extended_is_open_hand() {
        check([true; 5], Some(Gesture::OpenHand), 0.95);
    }

    #[test]
    fn none_extended_is_closed_fist() {
        check([false; 5], Some(Gesture::ClosedFist), 0.90);
    }

    #[test]
    fn exact_gestures() {
        check([true, false, false, false, false], Some(Gesture::ThumbsUp), 0.85);
        check([false, true, true, false, false], Some(Gesture::TwoFingers), 0.88);
        check([false, true, false, false, true], Some(Gesture::RockSign), 0.82);
    }

    #[test]
    fn thumb_with_one_other_is_relaxed_thumbs_up() {
        check([true, true, false, false, false], Some(Gesture::ThumbsUp), 0.80);
        check([true, false, false, false, true], Some(Gesture::ThumbsUp), 0.80);
    }

    #[test]
    fn three_fingers_fall_back_to_open_hand() {
        let result = classify(&FingerStates([true, true, true, false, false]), None);
        assert_eq!(result.gesture, Some(Gesture::OpenHand));
        assert_eq!(result.confidence, 0.85);
        assert!(result.confidence < OPEN_HAND_CONFIDENCE);

        check([false, true, true, true, false], Some(Gesture::OpenHand), 0.85);
        check([true, true, false, false, true], Some(Gesture::OpenHand), 0.85);
        check([false, true, true, true, true], Some(Gesture::OpenHand), 0.85);
    }

    #[test]
    fn unmatched_pairs_are_none() {
        check([false, false, true, true, false], None, 0.0);
        check([false, true, false, true, false], None, 0.0);
        check([false, false, false, false, true], None, 0.0);
    }

    #[test]
    fn every_vector_is_classified_consistently() {
        for states in all_vectors() {
            let result = classify(&states, None);
            match result.gesture {
                None => assert_eq!(result.confidence, 0.0),
                Some(_) => assert!(result.confidence >= 0.80 && result.confidence <= 0.95),
            }
            if states.count() == 5 {
                assert_eq!(result, Classification::of(Gesture::OpenHand, 0.95));
            }
            if states.count() == 0 {
                assert_eq!(result, Classification::of(Gesture::ClosedFist, 0.90));
            }
        }
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for gesture in Gesture::ALL {
            assert_eq!(gesture.as_str().parse::<Gesture>(), Ok(gesture));
        }
        assert!("wave".parse::<Gesture>().is_err());
    }
}
