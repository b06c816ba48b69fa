use eframe::egui::{self, Color32, Ui};
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotImage, PlotPoint, PlotPoints};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Picker plot (central panel)
// ---------------------------------------------------------------------------

/// Render the picker image and resolve clicks into spaxel toggles.
pub fn picker_plot(ui: &mut Ui, state: &mut AppState) {
    let Some(texture) = state.picker_texture(ui.ctx()).cloned() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a datacube to start picking  (File → Open cube…)");
        });
        return;
    };
    let Some(extractor) = &state.extractor else {
        return;
    };
    let (ny, nx) = extractor.cube().shape().spatial();
    let (w, h) = (nx as f64, ny as f64);

    let mut hover: Option<(f64, f64)> = None;
    let mut clicked: Option<(f64, f64)> = None;

    Plot::new("picker_plot")
        .data_aspect(1.0)
        .x_axis_label("x [spaxel]")
        .y_axis_label("y [spaxel]")
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            // Image spans [0, nx] x [0, ny]; spaxel (0, 0) sits at the
            // lower-left, so plot position maps to a spaxel by truncation.
            plot_ui.image(
                PlotImage::new(
                    &texture,
                    PlotPoint::new(w / 2.0, h / 2.0),
                    [w as f32, h as f32],
                )
                .name("picker"),
            );

            if let Some(p) = plot_ui.pointer_coordinate() {
                hover = Some((p.x, p.y));
            }
            if plot_ui.response().clicked() {
                clicked = hover;
            }
            if plot_ui.response().double_clicked() {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([0.0, 0.0], [w, h]));
            }
        });

    state.update_cursor(hover);
    if let Some((px, py)) = clicked {
        state.toggle_at(px, py);
    }
}

// ---------------------------------------------------------------------------
// Spectrum window
// ---------------------------------------------------------------------------

/// Show the committed spectrum in a closable window.
pub fn spectrum_window(ctx: &egui::Context, state: &mut AppState) {
    if !state.show_spectrum {
        return;
    }
    let Some(spectrum) = state
        .extractor
        .as_ref()
        .and_then(|ex| ex.spectrum().ok())
        .cloned()
    else {
        state.show_spectrum = false;
        return;
    };

    let mut open = state.show_spectrum;
    egui::Window::new("Extracted spectrum")
        .open(&mut open)
        .default_size([700.0, 380.0])
        .show(ctx, |ui: &mut Ui| {
            Plot::new("spectrum_plot")
                .legend(Legend::default())
                .x_axis_label("Wavelength [µm]")
                .y_axis_label("Flux")
                .show(ui, |plot_ui| {
                    let flux: PlotPoints = spectrum
                        .wavelength
                        .iter()
                        .zip(&spectrum.flux)
                        .map(|(&x, &y)| [x, y])
                        .collect();
                    plot_ui.line(
                        Line::new(flux)
                            .name("flux")
                            .color(Color32::LIGHT_BLUE)
                            .width(1.5),
                    );

                    let error: PlotPoints = spectrum
                        .wavelength
                        .iter()
                        .zip(&spectrum.error)
                        .map(|(&x, &y)| [x, y])
                        .collect();
                    plot_ui.line(
                        Line::new(error)
                            .name("error")
                            .color(Color32::GRAY)
                            .width(1.0)
                            .fill(0.0),
                    );
                });
        });
    state.show_spectrum = open;
}
