// src/ui.rs - Dashboard widgets
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use gesture_control::fingers::FingerStates;
use gesture_control::landmarks::Finger;
use image::RgbImage;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub muted: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            muted: Color32::from_rgb(70, 70, 78),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = Color32::from_rgb(70, 130, 240);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);
    visuals.window_rounding = egui::Rounding::same(12.0);

    visuals
}

/// Filled dot plus label, green while streaming.
pub fn status_indicator(ui: &mut egui::Ui, theme: &Theme, running: bool) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(14.0), egui::Sense::hover());
        let color = if running { theme.success } else { theme.error };
        ui.painter().circle_filled(rect.center(), 6.0, color);
        ui.label(if running { "Streaming" } else { "Not streaming" });
    });
}

/// Horizontal bar with a tick at the action threshold.
pub fn confidence_bar(ui: &mut egui::Ui, theme: &Theme, value: f64, threshold: f64) {
    let bar_width = ui.available_width().min(260.0);
    let bar_height = 20.0;
    let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;
    let painter = ui.painter();

    painter.rect_filled(rect, egui::Rounding::same(4.0), theme.surface);

    let value = value.clamp(0.0, 1.0) as f32;
    let fill_rect = Rect::from_min_size(rect.min, Vec2::new(bar_width * value, bar_height));
    let color = if f64::from(value) >= threshold {
        theme.success
    } else if value > 0.0 {
        theme.warning
    } else {
        theme.muted
    };
    painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

    let x = rect.left() + bar_width * threshold.clamp(0.0, 1.0) as f32;
    painter.line_segment(
        [Pos2::new(x, rect.top() - 2.0), Pos2::new(x, rect.bottom() + 2.0)],
        Stroke::new(2.0, theme.text_primary),
    );

    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        format!("{:.0}%", value * 100.0),
        egui::FontId::proportional(12.0),
        theme.text_primary,
    );
}

pub fn finger_strip(ui: &mut egui::Ui, theme: &Theme, states: &FingerStates) {
    ui.horizontal(|ui| {
        for finger in Finger::ALL {
            let extended = states.get(finger);
            let (rect, _) = ui.allocate_exact_size(Vec2::new(52.0, 26.0), egui::Sense::hover());
            let fill = if extended { theme.success } else { theme.muted };
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), fill);
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                finger.as_str(),
                egui::FontId::proportional(11.0),
                if extended {
                    theme.text_primary
                } else {
                    theme.text_secondary
                },
            );
        }
    });
}

/// Live frame display backed by a single reused texture.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            texture: None,
            aspect_ratio: 4.0 / 3.0,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &RgbImage) {
        if frame.width() == 0 || frame.height() == 0 {
            return;
        }
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_raw());
        self.aspect_ratio = frame.width() as f32 / frame.height() as f32;

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, Default::default()),
            None => {
                self.texture = Some(ctx.load_texture("video_frame", image, Default::default()));
            }
        }
    }

    pub fn show(&self, ui: &mut egui::Ui, streaming: bool) {
        let widget_width = ui.available_width();
        let widget_height = widget_width / self.aspect_ratio;

        let size = Vec2::new(widget_width, widget_height);
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        match (&self.texture, streaming) {
            (Some(texture), true) => {
                ui.painter().image(
                    texture.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            _ => {
                ui.painter()
                    .rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Camera not streaming",
                    egui::FontId::proportional(16.0),
                    Color32::from_rgb(150, 150, 155),
                );
            }
        }
    }
}
