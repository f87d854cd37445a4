// src/app.rs - Dashboard over a running gesture pipeline
use crate::ui::{self as widgets, Theme, VideoWidget};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use gesture_control::actions::DEFAULT_MIN_CONFIDENCE;
use gesture_control::capture::{list_cameras, CameraDescriptor};
use gesture_control::data::{ActionLog, ActionRecord, GestureStats};
use gesture_control::slot::SharedSlot;
use gesture_control::{Pipeline, StopOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

const HISTORY_REFRESH: Duration = Duration::from_secs(1);
const RECENT_LIMIT: usize = 10;

pub struct GestureControlApp {
    pipeline: Pipeline,
    slot: SharedSlot,
    log: Arc<dyn ActionLog>,
    theme: Theme,
    video: VideoWidget,

    cameras: Vec<CameraDescriptor>,
    selected_camera: u32,

    recent: Vec<ActionRecord>,
    stats: Vec<GestureStats>,
    last_refresh: Option<Instant>,
    last_frame_id: u64,
    message: Option<(String, bool)>,
}

impl GestureControlApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, mut pipeline: Pipeline) -> Self {
        let message = match pipeline.start() {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "could not start pipeline");
                Some((format!("Could not start camera: {e}"), true))
            }
        };

        Self {
            slot: pipeline.latest(),
            log: pipeline.action_log(),
            selected_camera: pipeline.camera_index(),
            pipeline,
            theme: Theme::default(),
            video: VideoWidget::new(),
            cameras: list_cameras(),
            recent: Vec::new(),
            stats: Vec::new(),
            last_refresh: None,
            last_frame_id: 0,
            message,
        }
    }

    fn refresh_history(&mut self) {
        if self
            .last_refresh
            .is_some_and(|at| at.elapsed() < HISTORY_REFRESH)
        {
            return;
        }
        self.last_refresh = Some(Instant::now());

        match self.log.recent(RECENT_LIMIT) {
            Ok(recent) => self.recent = recent,
            Err(e) => warn!(error = %e, "failed to read recent actions"),
        }
        match self.log.stats() {
            Ok(stats) => self.stats = stats,
            Err(e) => warn!(error = %e, "failed to read action stats"),
        }
    }

    fn start(&mut self) {
        self.message = match self.pipeline.start() {
            Ok(()) => Some(("Camera started".to_string(), false)),
            Err(e) => Some((format!("Could not start camera: {e}"), true)),
        };
    }

    fn stop(&mut self) {
        self.message = match self.pipeline.stop() {
            StopOutcome::Stopped => Some(("Camera stopped".to_string(), false)),
            StopOutcome::NotRunning => None,
            StopOutcome::TimedOut => Some(("Camera is still shutting down".to_string(), true)),
        };
    }

    fn switch_camera(&mut self, index: u32) {
        self.message = match self.pipeline.set_camera(index) {
            Ok(()) => Some((format!("Switched to camera {index}"), false)),
            Err(e) => Some((format!("Could not switch to camera {index}: {e}"), true)),
        };
        self.selected_camera = self.pipeline.camera_index();
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        let running = self.pipeline.is_running();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.heading("Gesture Control");
                ui.separator();
                widgets::status_indicator(ui, &self.theme, running);
                ui.separator();

                let start = ui.add_enabled(
                    !running,
                    egui::Button::new("▶ Start").fill(self.theme.success),
                );
                if start.clicked() {
                    self.start();
                }
                let stop = ui.add_enabled(
                    running,
                    egui::Button::new("⏹ Stop").fill(self.theme.error),
                );
                if stop.clicked() {
                    self.stop();
                }

                ui.separator();
                let mut selected = self.selected_camera;
                let selected_text = self
                    .cameras
                    .iter()
                    .find(|c| c.index == selected)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| format!("Camera {selected}"));
                egui::ComboBox::from_id_source("camera_select")
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for camera in &self.cameras {
                            ui.selectable_value(
                                &mut selected,
                                camera.index,
                                format!("[{}] {}", camera.index, camera.name),
                            );
                        }
                    });
                if ui.button("⟳").on_hover_text("Rescan cameras").clicked() {
                    self.cameras = list_cameras();
                }
                if selected != self.selected_camera {
                    self.switch_camera(selected);
                }

                if let Some((text, is_error)) = &self.message {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let color = if *is_error {
                            self.theme.error
                        } else {
                            self.theme.text_secondary
                        };
                        ui.colored_label(color, text);
                    });
                }
            });
            ui.add_space(8.0);
        });
    }

    fn render_detection_panel(&self, ui: &mut egui::Ui) {
        let latest = self.slot.snapshot();
        ui.heading("Detection");

        let label = latest
            .gesture
            .map(|g| g.display_name())
            .unwrap_or("No gesture");
        let color = if latest.gesture.is_some() {
            self.theme.primary
        } else {
            egui::Color32::GRAY
        };
        ui.label(egui::RichText::new(label).size(26.0).color(color));

        let threshold = latest
            .gesture
            .and_then(|g| self.pipeline.action_table().min_confidence(g))
            .unwrap_or(DEFAULT_MIN_CONFIDENCE);
        ui.label(format!("Confidence: {:.1}%", latest.confidence * 100.0));
        widgets::confidence_bar(ui, &self.theme, latest.confidence, threshold);

        ui.add_space(8.0);
        ui.label("Fingers:");
        widgets::finger_strip(ui, &self.theme, &latest.finger_states);

        if let Some(action) = latest
            .gesture
            .and_then(|g| self.pipeline.action_table().get(g))
        {
            ui.add_space(8.0);
            ui.label(
                egui::RichText::new(format!("Action: {}", action.description))
                    .color(self.theme.text_secondary),
            );
        }
    }

    fn render_mappings(&self, ui: &mut egui::Ui) {
        ui.heading("Gestures");
        ui.push_id("mappings", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto().at_least(110.0))
                .column(Column::remainder())
                .column(Column::auto())
                .header(20.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("Gesture");
                    });
                    header.col(|ui| {
                        ui.strong("Action");
                    });
                    header.col(|ui| {
                        ui.strong("Min");
                    });
                })
                .body(|mut body| {
                    for (gesture, action) in self.pipeline.action_table().iter() {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(gesture.display_name());
                            });
                            row.col(|ui| {
                                ui.label(action.description);
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.0}%", action.min_confidence * 100.0));
                            });
                        });
                    }
                });
        });
    }

    fn render_recent(&self, ui: &mut egui::Ui) {
        ui.heading("Recent actions");
        if self.recent.is_empty() {
            ui.label(egui::RichText::new("No actions yet").color(egui::Color32::GRAY));
            return;
        }
        ui.push_id("recent", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto().at_least(70.0))
                .column(Column::auto().at_least(110.0))
                .column(Column::remainder())
                .column(Column::auto())
                .header(20.0, |mut header| {
                    for title in ["Time", "Gesture", "Action", "Conf."] {
                        header.col(|ui| {
                            ui.strong(title);
                        });
                    }
                })
                .body(|mut body| {
                    for record in &self.recent {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(record.timestamp.format("%H:%M:%S").to_string());
                            });
                            row.col(|ui| {
                                ui.label(record.gesture.display_name());
                            });
                            row.col(|ui| {
                                ui.label(&record.action);
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.0}%", record.confidence * 100.0));
                            });
                        });
                    }
                });
        });
    }

    fn render_stats(&self, ui: &mut egui::Ui) {
        ui.heading("Usage");
        if self.stats.is_empty() {
            ui.label(egui::RichText::new("No usage recorded").color(egui::Color32::GRAY));
            return;
        }
        ui.push_id("stats", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto().at_least(110.0))
                .column(Column::auto())
                .column(Column::auto())
                .column(Column::remainder())
                .header(20.0, |mut header| {
                    for title in ["Gesture", "Uses", "Avg. conf.", "Last used"] {
                        header.col(|ui| {
                            ui.strong(title);
                        });
                    }
                })
                .body(|mut body| {
                    for stat in &self.stats {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(stat.gesture.display_name());
                            });
                            row.col(|ui| {
                                ui.label(stat.total_uses.to_string());
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.0}%", stat.avg_confidence * 100.0));
                            });
                            row.col(|ui| {
                                ui.label(stat.last_used.format("%Y-%m-%d %H:%M:%S").to_string());
                            });
                        });
                    }
                });
        });
    }
}

impl eframe::App for GestureControlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let latest = self.slot.snapshot();
        if latest.frame_id != self.last_frame_id {
            if let Some(frame) = &latest.frame {
                self.video.update_frame(ctx, frame);
            }
            self.last_frame_id = latest.frame_id;
        }
        self.refresh_history();

        self.render_header(ctx);

        egui::SidePanel::right("history")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_mappings(ui);
                    ui.separator();
                    self.render_recent(ui);
                    ui.separator();
                    self.render_stats(ui);
                });
            });

        let running = self.pipeline.is_running();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                columns[0].group(|ui| {
                    ui.heading("Camera");
                    self.video.show(ui, running);
                });
                columns[1].group(|ui| {
                    self.render_detection_panel(ui);
                });
            });
        });

        ctx.request_repaint_after(Duration::from_millis(50));
    }
}
