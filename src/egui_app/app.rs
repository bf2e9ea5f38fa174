use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, RichText, TextureHandle, TextureOptions};
use image::RgbImage;

use crate::session::SessionController;

const PREVIEW_SIZE: egui::Vec2 = egui::vec2(320.0, 240.0);
const REPAINT_INTERVAL: Duration = Duration::from_millis(33);

/// Renders the session snapshot and forwards clicks to the controller.
///
/// All session logic lives in the controller; this shell only pumps `tick`,
/// draws labels per the render projection, and maps buttons to actions.
pub struct PostureApp {
    controller: SessionController,
    preview_tex: Option<TextureHandle>,
}

impl PostureApp {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            preview_tex: None,
        }
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.controller.preview_frame() else {
            return;
        };
        let image = color_image_from_rgb(&frame);
        match self.preview_tex.as_mut() {
            Some(tex) if tex.size() == image.size => tex.set(image, TextureOptions::LINEAR),
            _ => {
                self.preview_tex =
                    Some(ctx.load_texture("camera_preview", image, TextureOptions::LINEAR));
            }
        }
    }

    fn draw_preview(&self, ui: &mut egui::Ui) {
        let (rect, _response) = ui.allocate_exact_size(PREVIEW_SIZE, egui::Sense::hover());
        if let Some(tex) = &self.preview_tex {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(tex.id(), rect, uv, Color32::WHITE);
        } else {
            ui.painter().rect_filled(rect, 6.0, Color32::from_rgb(12, 12, 12));
        }
    }
}

fn color_image_from_rgb(frame: &RgbImage) -> egui::ColorImage {
    egui::ColorImage::from_rgb(
        [frame.width() as usize, frame.height() as usize],
        frame.as_raw(),
    )
}

impl eframe::App for PostureApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.tick(now);
        self.refresh_preview(ctx);
        let snapshot = self.controller.snapshot();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("PosturePal");
            ui.add_space(8.0);
            self.draw_preview(ui);
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                if ui.button("Capture upright").clicked() {
                    self.controller.label_upright(now);
                }
                if ui.button("Capture slouched").clicked() {
                    self.controller.label_slouched(now);
                }
                if snapshot.train_visible && ui.button("Train").clicked() {
                    self.controller.start_training();
                }
                if snapshot.predict_visible && ui.button(&snapshot.predict_label).clicked() {
                    self.controller.toggle_predicting(now);
                }
                if snapshot.clear_visible && ui.button("Clear samples").clicked() {
                    self.controller.clear_samples();
                }
                if snapshot.switch_camera_visible && ui.button("Switch camera").clicked() {
                    self.controller.switch_camera();
                }
            });

            ui.add_space(8.0);
            egui::Grid::new("session_labels").num_columns(2).show(ui, |ui| {
                ui.label("Training");
                ui.label(&snapshot.training_label);
                ui.end_row();
                ui.label("Epoch");
                ui.label(&snapshot.epoch_label);
                ui.end_row();
                ui.label("Accuracy");
                ui.label(&snapshot.accuracy_label);
                ui.end_row();
                ui.label("Samples");
                ui.label(&snapshot.samples_label);
                ui.end_row();
                ui.label("Prediction");
                ui.label(&snapshot.prediction_label);
                ui.end_row();
            });

            if !snapshot.status.is_empty() {
                ui.add_space(8.0);
                ui.label(RichText::new(&snapshot.status).color(Color32::from_rgb(220, 90, 90)));
            }
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
