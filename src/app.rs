use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CubepickApp {
    pub state: AppState,
}

impl CubepickApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for CubepickApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: display + extraction controls ----
        egui::SidePanel::left("control_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: picker image ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::picker_plot(ui, &mut self.state);
        });

        // ---- Floating spectrum window ----
        plot::spectrum_window(ctx, &mut self.state);
    }
}
