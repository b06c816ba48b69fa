use eframe::egui::{self, Color32, DragValue, RichText, Ui};

use crate::color::{Colormap, Stretch};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open cube…").clicked() {
                open_cube_dialog(state);
                ui.close_menu();
            }
            let can_save = state
                .extractor
                .as_ref()
                .is_some_and(|ex| ex.spectrum().is_ok());
            if ui
                .add_enabled(can_save, egui::Button::new("Save spectrum…"))
                .clicked()
            {
                save_spectrum_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(extractor) = &state.extractor {
            let shape = extractor.cube().shape();
            let file = state
                .cube_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ui.label(format!("{file}  {shape}"));
            ui.separator();
            ui.label(format!("{} spaxels selected", extractor.mask().len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") || msg.starts_with("Warning") {
                Color32::RED
            } else {
                Color32::LIGHT_GREEN
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – display and extraction controls
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Display");
    ui.separator();

    let mut display_changed = false;

    ui.strong("Colormap");
    egui::ComboBox::from_id_salt("colormap")
        .selected_text(state.config.colormap.label())
        .show_ui(ui, |ui: &mut Ui| {
            for cmap in Colormap::ALL {
                if ui
                    .selectable_label(state.config.colormap == cmap, cmap.label())
                    .clicked()
                {
                    state.config.colormap = cmap;
                    display_changed = true;
                }
            }
        });

    ui.strong("Stretch");
    egui::ComboBox::from_id_salt("stretch")
        .selected_text(state.config.stretch.label())
        .show_ui(ui, |ui: &mut Ui| {
            for stretch in Stretch::ALL {
                if ui
                    .selectable_label(state.config.stretch == stretch, stretch.label())
                    .clicked()
                {
                    state.config.stretch = stretch;
                    display_changed = true;
                }
            }
        });

    ui.strong("Percentile cuts");
    ui.horizontal(|ui: &mut Ui| {
        let (lo, hi) = &mut state.config.norm_percentiles;
        display_changed |= ui
            .add(DragValue::new(lo).speed(0.5).range(0.0..=100.0).suffix("%"))
            .changed();
        display_changed |= ui
            .add(DragValue::new(hi).speed(0.5).range(0.0..=100.0).suffix("%"))
            .changed();
    });
    if state.config.norm_percentiles.0 > state.config.norm_percentiles.1 {
        state.config.norm_percentiles.1 = state.config.norm_percentiles.0;
    }

    ui.checkbox(
        &mut state.config.celestial_coordinates,
        "Sky coordinate readout",
    );

    if display_changed {
        state.invalidate_texture();
    }

    ui.add_space(8.0);
    ui.heading("Extraction");
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Redshift");
        ui.add(
            DragValue::new(&mut state.config.redshift)
                .speed(0.01)
                .range(0.0..=20.0),
        );
    });
    ui.checkbox(&mut state.config.plot_output, "Plot spectrum on OK");

    ui.add_space(4.0);
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Reset").clicked() {
            state.reset_selection();
        }
        let has_selection = state
            .extractor
            .as_ref()
            .is_some_and(|ex| !ex.mask().is_empty());
        if ui
            .add_enabled(has_selection, egui::Button::new("OK"))
            .clicked()
        {
            state.commit();
        }
    });

    let has_spectrum = state
        .extractor
        .as_ref()
        .is_some_and(|ex| ex.spectrum().is_ok());
    if has_spectrum && ui.button("Show spectrum").clicked() {
        state.show_spectrum = true;
    }

    // ---- Cursor readout ----
    ui.add_space(8.0);
    ui.separator();
    if let Some(info) = &state.cursor_info {
        ui.monospace(format!("x={} y={}", info.x, info.y));
        ui.monospace(format!("value: {:.4e}", info.value));
        if info.selected {
            ui.monospace("selected");
        }
        if let Some((ra, dec)) = info.sky {
            ui.monospace(format!("RA {ra:.6}°  Dec {dec:.6}°"));
        }
    } else {
        ui.monospace("cursor off grid");
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_cube_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open IFU datacube")
        .add_filter("FITS cube", &["fits", "fit"])
        .pick_file();

    if let Some(path) = file {
        state.load_cube(&path);
    }
}

pub fn save_spectrum_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save extracted spectrum")
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("FITS", &["fits", "fit"])
        .set_file_name("spectrum.csv")
        .save_file();

    if let Some(path) = file {
        state.save_spectrum(&path);
    }
}
