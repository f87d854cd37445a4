// src/mediapipe_bridge.rs - Hand landmark estimation collaborators
use crate::landmarks::{
    Finger, HAND_LANDMARK_COUNT, INDEX_DIP, INDEX_MCP, INDEX_PIP, INDEX_TIP, MIDDLE_DIP,
    MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP, PINKY_DIP, PINKY_MCP, PINKY_PIP, PINKY_TIP, RING_DIP,
    RING_MCP, RING_PIP, RING_TIP, THUMB_CMC, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};
use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{info, warn};

/// Raw per-hand landmark lists, in estimator order.
pub type RawHands = Vec<Vec<[f64; 3]>>;

pub trait LandmarkEstimator: Send {
    /// Zero or more hands for the frame. Callers use only the first.
    fn process(&mut self, frame: &RgbImage) -> Result<RawHands>;
}

#[derive(Serialize)]
struct FrameHeader<'a> {
    width: u32,
    height: u32,
    format: &'a str,
    len: usize,
}

#[derive(Deserialize)]
struct SidecarReply {
    #[serde(default)]
    hands: RawHands,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external landmark process (for example a MediaPipe Hands helper)
/// and talks to it over stdin/stdout.
///
/// Per frame the bridge writes one JSON header line followed by `len` bytes
/// of packed RGB8 pixels, then reads one JSON line back:
/// `{"hands": [[[x, y, z], ...21 points], ...]}` or `{"error": "..."}`.
pub struct SidecarEstimator {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SidecarEstimator {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        info!(program, ?args, "starting landmark sidecar");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start landmark sidecar `{program}`"))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("sidecar stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("sidecar stdout unavailable"))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl LandmarkEstimator for SidecarEstimator {
    fn process(&mut self, frame: &RgbImage) -> Result<RawHands> {
        let pixels = frame.as_raw();
        let header = FrameHeader {
            width: frame.width(),
            height: frame.height(),
            format: "rgb8",
            len: pixels.len(),
        };

        serde_json::to_writer(&mut self.stdin, &header)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.write_all(pixels)?;
        self.stdin.flush().context("landmark sidecar closed its input")?;

        self.line.clear();
        let read = self.stdout.read_line(&mut self.line)?;
        if read == 0 {
            bail!("landmark sidecar exited");
        }

        let reply: SidecarReply =
            serde_json::from_str(self.line.trim()).context("malformed sidecar reply")?;
        if let Some(error) = reply.error {
            bail!("landmark sidecar error: {error}");
        }
        Ok(reply.hands)
    }
}

impl Drop for SidecarEstimator {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "failed to stop landmark sidecar");
        }
        let _ = self.child.wait();
    }
}

/// Deterministic stand-in for a real estimator: cycles through every gesture
/// with a short no-hand gap between them.
pub struct SimulatedEstimator {
    frame: u64,
    dwell_frames: u64,
    gap_frames: u64,
}

/// Finger-state patterns the simulation cycles through.
pub const SIMULATION_SEQUENCE: [[bool; 5]; 5] = [
    [true, true, true, true, true],
    [false, false, false, false, false],
    [true, false, false, false, false],
    [false, true, true, false, false],
    [false, true, false, false, true],
];

impl SimulatedEstimator {
    pub fn new(dwell_frames: u64, gap_frames: u64) -> Self {
        Self {
            frame: 0,
            dwell_frames: dwell_frames.max(1),
            gap_frames,
        }
    }
}

impl Default for SimulatedEstimator {
    fn default() -> Self {
        // ~3 s per gesture and ~1 s gap at 20 frames/s
        Self::new(60, 20)
    }
}

impl LandmarkEstimator for SimulatedEstimator {
    fn process(&mut self, _frame: &RgbImage) -> Result<RawHands> {
        let period = self.dwell_frames + self.gap_frames;
        let position = self.frame % period;
        let step = (self.frame / period) as usize % SIMULATION_SEQUENCE.len();
        let sway = 0.005 * (self.frame as f64 * 0.2).sin();
        self.frame += 1;

        if position >= self.dwell_frames {
            return Ok(Vec::new());
        }

        let mut hand = synthetic_hand(SIMULATION_SEQUENCE[step]);
        for point in &mut hand {
            point[0] += sway;
        }
        Ok(vec![hand])
    }
}

/// Landmark chain (base → tip) for each finger.
fn finger_chain(finger: Finger) -> [usize; 4] {
    match finger {
        Finger::Thumb => [THUMB_CMC, THUMB_MCP, THUMB_IP, THUMB_TIP],
        Finger::Index => [INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
        Finger::Middle => [MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
        Finger::Ring => [RING_MCP, RING_PIP, RING_DIP, RING_TIP],
        Finger::Pinky => [PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
    }
}

/// Plausible upright hand whose fingers are extended where `extended` is
/// true, with margins well clear of the extraction tolerance.
pub fn synthetic_hand(extended: [bool; 5]) -> Vec<[f64; 3]> {
    let mut points = vec![[0.0; 3]; HAND_LANDMARK_COUNT];
    points[WRIST] = [0.5, 0.85, 0.0];

    for finger in Finger::ALL {
        let chain = finger_chain(finger);
        let is_extended = extended[finger.index()];

        let (base, tip) = match finger {
            Finger::Thumb => {
                // Thumb chain starts at the CMC; the extension test uses the MCP
                let mcp = [0.38, 0.7, -0.02];
                let tip = if is_extended {
                    [mcp[0] - 0.12, mcp[1] - 0.04, -0.03]
                } else {
                    [mcp[0] + 0.08, mcp[1] + 0.02, -0.03]
                };
                points[chain[0]] = lerp(points[WRIST], mcp, 0.5);
                points[chain[1]] = mcp;
                points[chain[2]] = lerp(mcp, tip, 0.5);
                points[chain[3]] = tip;
                continue;
            }
            _ => {
                let x = 0.42 + 0.06 * (finger.index() as f64 - 1.0);
                let base = [x, 0.6, 0.0];
                let tip = if is_extended {
                    [x, base[1] - 0.25, -0.02]
                } else {
                    [x, base[1] + 0.08, -0.04]
                };
                (base, tip)
            }
        };

        points[chain[0]] = base;
        points[chain[1]] = lerp(base, tip, 1.0 / 3.0);
        points[chain[2]] = lerp(base, tip, 2.0 / 3.0);
        points[chain[3]] = tip;
    }

    points
}

fn lerp(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{classify, Gesture};
    use crate::fingers::FingerStateExtractor;
    use crate::landmarks::HandPose;

    fn blank() -> RgbImage {
        RgbImage::new(8, 8)
    }

    #[test]
    fn synthetic_hands_extract_to_their_pattern() {
        let extractor = FingerStateExtractor::default();
        for pattern in SIMULATION_SEQUENCE {
            let pose = HandPose::from_raw(&synthetic_hand(pattern)).unwrap();
            assert_eq!(extractor.extract(&pose).as_array(), pattern);
        }
    }

    #[test]
    fn simulation_cycles_through_every_gesture() {
        let mut estimator = SimulatedEstimator::new(3, 2);
        let extractor = FingerStateExtractor::default();
        let mut seen = Vec::new();

        for _ in 0..25 {
            let hands = estimator.process(&blank()).unwrap();
            let Some(first) = hands.first() else {
                continue;
            };
            let pose = HandPose::from_raw(first).unwrap();
            let gesture = classify(&extractor.extract(&pose), Some(&pose)).gesture;
            if seen.last() != Some(&gesture) {
                seen.push(gesture);
            }
        }

        assert_eq!(
            seen,
            vec![
                Some(Gesture::OpenHand),
                Some(Gesture::ClosedFist),
                Some(Gesture::ThumbsUp),
                Some(Gesture::TwoFingers),
                Some(Gesture::RockSign),
            ]
        );
    }

    #[test]
    fn simulation_leaves_gaps_without_hands() {
        let mut estimator = SimulatedEstimator::new(2, 1);
        let counts: Vec<usize> = (0..6)
            .map(|_| estimator.process(&blank()).unwrap().len())
            .collect();
        assert_eq!(counts, vec![1, 1, 0, 1, 1, 0]);
    }

    #[test]
    fn missing_sidecar_program_is_an_error() {
        let result = SidecarEstimator::spawn("definitely-not-a-landmark-sidecar", &[]);
        assert!(result.is_err());
    }
}
