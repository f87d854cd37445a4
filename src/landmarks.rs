// src/landmarks.rs - Hand landmark geometry in MediaPipe hand topology
use nalgebra::Vector3;
use thiserror::Error;

/// Normalized image-space point: x and y in [0, 1] with y growing downward,
/// z is depth relative to the wrist.
pub type Landmark = Vector3<f64>;

pub const HAND_LANDMARK_COUNT: usize = 21;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Skeleton edges for drawing.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC),
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP),
    (INDEX_MCP, INDEX_PIP),
    (INDEX_PIP, INDEX_DIP),
    (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP),
    (MIDDLE_MCP, MIDDLE_PIP),
    (MIDDLE_PIP, MIDDLE_DIP),
    (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP),
    (RING_MCP, RING_PIP),
    (RING_PIP, RING_DIP),
    (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP),
    (WRIST, PINKY_MCP),
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
];

#[derive(Debug, Error, PartialEq)]
pub enum LandmarkError {
    #[error("expected {HAND_LANDMARK_COUNT} hand landmarks, got {0}")]
    WrongCount(usize),
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// Fingers in the fixed order used by every per-finger vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }

    /// (tip, base) landmark indices used for the extension test.
    pub fn tip_and_base(self) -> (usize, usize) {
        match self {
            Finger::Thumb => (THUMB_TIP, THUMB_MCP),
            Finger::Index => (INDEX_TIP, INDEX_MCP),
            Finger::Middle => (MIDDLE_TIP, MIDDLE_MCP),
            Finger::Ring => (RING_TIP, RING_MCP),
            Finger::Pinky => (PINKY_TIP, PINKY_MCP),
        }
    }
}

/// One validated hand skeleton. Landmark order is the estimator's order and
/// is never permuted.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    landmarks: [Landmark; HAND_LANDMARK_COUNT],
}

impl HandPose {
    pub fn from_landmarks(points: &[Landmark]) -> Result<Self, LandmarkError> {
        if points.len() != HAND_LANDMARK_COUNT {
            return Err(LandmarkError::WrongCount(points.len()));
        }

        let mut landmarks = [Landmark::zeros(); HAND_LANDMARK_COUNT];
        for (index, (slot, point)) in landmarks.iter_mut().zip(points).enumerate() {
            if !point.iter().all(|c| c.is_finite()) {
                return Err(LandmarkError::NonFinite { index });
            }
            *slot = *point;
        }

        Ok(Self { landmarks })
    }

    pub fn from_raw(points: &[[f64; 3]]) -> Result<Self, LandmarkError> {
        let converted: Vec<Landmark> = points
            .iter()
            .map(|p| Landmark::new(p[0], p[1], p[2]))
            .collect();
        Self::from_landmarks(&converted)
    }

    pub fn landmarks(&self) -> &[Landmark; HAND_LANDMARK_COUNT] {
        &self.landmarks
    }

    pub fn finger(&self, finger: Finger) -> FingerPair {
        let (tip, base) = finger.tip_and_base();
        FingerPair {
            tip: self.landmarks[tip],
            base: self.landmarks[base],
        }
    }

    pub fn geometry(&self) -> FingerGeometry {
        FingerGeometry {
            thumb: self.finger(Finger::Thumb),
            index: self.finger(Finger::Index),
            middle: self.finger(Finger::Middle),
            ring: self.finger(Finger::Ring),
            pinky: self.finger(Finger::Pinky),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerPair {
    pub tip: Landmark,
    pub base: Landmark,
}

/// Named tip/base pairs extracted once from a [`HandPose`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerGeometry {
    pub thumb: FingerPair,
    pub index: FingerPair,
    pub middle: FingerPair,
    pub ring: FingerPair,
    pub pinky: FingerPair,
}

impl FingerGeometry {
    pub fn pair(&self, finger: Finger) -> &FingerPair {
        match finger {
            Finger::Thumb => &self.thumb,
            Finger::Index => &self.index,
            Finger::Middle => &self.middle,
            Finger::Ring => &self.ring,
            Finger::Pinky => &self.pinky,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_poses::*;
    use super::*;

    #[test]
    fn rejects_wrong_landmark_count() {
        let points = vec![[0.0; 3]; 20];
        assert_eq!(
            HandPose::from_raw(&points).unwrap_err(),
            LandmarkError::WrongCount(20)
        );
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let mut points = curled_hand();
        points[INDEX_TIP][1] = f64::NAN;
        assert_eq!(
            HandPose::from_raw(&points).unwrap_err(),
            LandmarkError::NonFinite { index: INDEX_TIP }
        );
    }

    #[test]
    fn geometry_uses_fixed_indices() {
        let mut points = curled_hand();
        points[THUMB_TIP] = [0.11, 0.12, 0.13];
        points[PINKY_MCP] = [0.21, 0.22, 0.23];
        let pose = HandPose::from_raw(&points).unwrap();
        let geometry = pose.geometry();

        assert_eq!(geometry.thumb.tip, Landmark::new(0.11, 0.12, 0.13));
        assert_eq!(geometry.pinky.base, Landmark::new(0.21, 0.22, 0.23));
        assert_eq!(geometry.pair(Finger::Thumb), &geometry.thumb);
    }

    #[test]
    fn connections_stay_in_range() {
        assert!(HAND_CONNECTIONS
            .iter()
            .all(|&(a, b)| a < HAND_LANDMARK_COUNT && b < HAND_LANDMARK_COUNT));
    }
}
