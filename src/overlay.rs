// src/overlay.rs - Debug annotations drawn onto published frames
use crate::classifier::Classification;
use crate::fingers::FingerStates;
use crate::landmarks::{HandPose, HAND_CONNECTIONS};
use crate::tracking::FrameAnalysis;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

const BONE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 48, 48]);
const EXTENDED_COLOR: Rgb<u8> = Rgb([76, 175, 80]);
const CURLED_COLOR: Rgb<u8> = Rgb([70, 70, 78]);
const BAR_BACKGROUND: Rgb<u8> = Rgb([30, 30, 35]);
const FIRE_COLOR: Rgb<u8> = Rgb([255, 152, 0]);

const MARGIN: i32 = 10;
const CELL: u32 = 18;
const LABEL_SCALE: f32 = 18.0;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "not a usable font");
            None
        }
    }
}

/// The configured font, else the first system font that loads.
pub fn find_label_font(configured: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = configured {
        if let Some(font) = load_font(path) {
            return Some(font);
        }
        warn!(path = %path.display(), "configured label font unavailable");
    }
    let font = SYSTEM_FONTS.iter().find_map(|path| load_font(Path::new(path)));
    if font.is_none() {
        debug!("no label font found, gesture labels are not drawn");
    }
    font
}

pub fn gesture_label(classification: &Classification) -> Option<String> {
    classification
        .gesture
        .map(|gesture| format!("{} {:.2}", gesture.display_name(), classification.confidence))
}

pub fn annotate(
    frame: &mut RgbImage,
    analysis: &FrameAnalysis,
    min_confidence: f64,
    fired: bool,
    font: Option<&FontVec>,
) {
    if let Some(pose) = &analysis.pose {
        draw_skeleton(frame, pose);
    }
    draw_finger_strip(frame, &analysis.finger_states);
    draw_confidence_bar(frame, analysis.classification.confidence, min_confidence);
    if let (Some(font), Some(label)) = (font, gesture_label(&analysis.classification)) {
        draw_label(frame, font, &label);
    }
    if fired {
        draw_fire_border(frame);
    }
}

/// Below the confidence bar.
fn draw_label(frame: &mut RgbImage, font: &FontVec, label: &str) {
    let y = MARGIN + 14;
    if frame.width() as i32 <= MARGIN || frame.height() as i32 <= y + LABEL_SCALE as i32 {
        return;
    }
    draw_text_mut(frame, BONE_COLOR, MARGIN, y, PxScale::from(LABEL_SCALE), font, label);
}

fn to_pixel(frame: &RgbImage, x: f64, y: f64) -> (f32, f32) {
    (
        (x * frame.width() as f64) as f32,
        (y * frame.height() as f64) as f32,
    )
}

fn draw_skeleton(frame: &mut RgbImage, pose: &HandPose) {
    let points: Vec<(f32, f32)> = pose
        .landmarks()
        .iter()
        .map(|lm| to_pixel(frame, lm.x, lm.y))
        .collect();

    for &(from, to) in HAND_CONNECTIONS.iter() {
        draw_line_segment_mut(frame, points[from], points[to], BONE_COLOR);
    }
    for &(x, y) in &points {
        draw_filled_circle_mut(frame, (x as i32, y as i32), 3, JOINT_COLOR);
    }
}

/// Five cells along the bottom-left edge, one per finger.
fn draw_finger_strip(frame: &mut RgbImage, states: &FingerStates) {
    if frame.height() < CELL + MARGIN as u32 * 2 {
        return;
    }
    let y = frame.height() as i32 - MARGIN - CELL as i32;
    for (i, extended) in states.as_array().iter().enumerate() {
        let x = MARGIN + i as i32 * (CELL as i32 + 4);
        let color = if *extended { EXTENDED_COLOR } else { CURLED_COLOR };
        draw_filled_rect_mut(frame, Rect::at(x, y).of_size(CELL, CELL), color);
    }
}

fn draw_confidence_bar(frame: &mut RgbImage, confidence: f64, min_confidence: f64) {
    let width = frame.width().saturating_sub(MARGIN as u32 * 2).min(200);
    if width == 0 {
        return;
    }
    let height = 8;
    draw_filled_rect_mut(
        frame,
        Rect::at(MARGIN, MARGIN).of_size(width, height),
        BAR_BACKGROUND,
    );

    let filled = (width as f64 * confidence.clamp(0.0, 1.0)) as u32;
    if filled > 0 {
        let color = if confidence >= min_confidence {
            EXTENDED_COLOR
        } else {
            FIRE_COLOR
        };
        draw_filled_rect_mut(frame, Rect::at(MARGIN, MARGIN).of_size(filled, height), color);
    }

    let marker = MARGIN + (width as f64 * min_confidence.clamp(0.0, 1.0)) as i32;
    draw_line_segment_mut(
        frame,
        (marker as f32, MARGIN as f32 - 2.0),
        (marker as f32, (MARGIN + height as i32) as f32 + 2.0),
        BONE_COLOR,
    );
}

fn draw_fire_border(frame: &mut RgbImage) {
    for inset in 0..3u32 {
        let (w, h) = (frame.width(), frame.height());
        if w <= inset * 2 || h <= inset * 2 {
            return;
        }
        draw_hollow_rect_mut(
            frame,
            Rect::at(inset as i32, inset as i32).of_size(w - inset * 2, h - inset * 2),
            FIRE_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::GestureTracker;
    use crate::mediapipe_bridge::synthetic_hand;

    #[test]
    fn annotation_marks_extended_fingers() {
        let mut frame = RgbImage::new(320, 240);
        let analysis = GestureTracker::default().analyze(&vec![synthetic_hand([
            true, false, false, false, false,
        ])]);
        annotate(&mut frame, &analysis, 0.7, false, None);

        let y = 240 - MARGIN as u32 - CELL / 2;
        assert_eq!(*frame.get_pixel(MARGIN as u32 + CELL / 2, y), EXTENDED_COLOR);
        assert_eq!(
            *frame.get_pixel(MARGIN as u32 + CELL + 4 + CELL / 2, y),
            CURLED_COLOR
        );
    }

    #[test]
    fn tiny_frames_do_not_panic() {
        let mut frame = RgbImage::new(2, 2);
        let analysis = GestureTracker::default().analyze(&vec![synthetic_hand([true; 5])]);
        annotate(&mut frame, &analysis, 0.7, true, None);
    }

    #[test]
    fn label_names_gesture_and_confidence() {
        let analysis = GestureTracker::default().analyze(&vec![synthetic_hand([true; 5])]);
        assert_eq!(
            gesture_label(&analysis.classification).as_deref(),
            Some("Open Hand 0.95")
        );
        assert_eq!(gesture_label(&FrameAnalysis::empty().classification), None);
    }

    #[test]
    fn label_is_drawn_when_a_font_is_available() {
        let Some(font) = find_label_font(None) else {
            return;
        };
        let analysis = GestureTracker::default().analyze(&vec![synthetic_hand([true; 5])]);
        let mut plain = RgbImage::new(320, 240);
        let mut labelled = RgbImage::new(320, 240);
        annotate(&mut plain, &analysis, 0.7, false, None);
        annotate(&mut labelled, &analysis, 0.7, false, Some(&font));
        assert_ne!(plain, labelled);
    }

    #[test]
    fn non_font_files_are_rejected() {
        let dir = std::env::temp_dir().join(format!("gc-font-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        assert!(load_font(&path).is_none());
        assert!(load_font(&dir.join("missing.ttf")).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn fire_border_is_drawn() {
        let mut frame = RgbImage::new(64, 64);
        annotate(&mut frame, &FrameAnalysis::empty(), 0.7, true, None);
        assert_eq!(*frame.get_pixel(0, 32), FIRE_COLOR);
    }
}
