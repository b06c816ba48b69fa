use std::path::{Path, PathBuf};

use eframe::egui;
use log::{error, info, warn};

use crate::color::{self, Normalization};
use crate::config::ExtractorConfig;
use crate::data::error::ExtractError;
use crate::data::extract::Extractor;
use crate::data::loader;

/// Hover readout for the picker display.
#[derive(Debug, Clone)]
pub struct CursorInfo {
    pub x: usize,
    pub y: usize,
    pub value: f64,
    pub selected: bool,
    /// (RA, Dec) in degrees when celestial readout is enabled and available.
    pub sky: Option<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Display and extraction settings.
    pub config: ExtractorConfig,

    /// Live selector over the loaded cube (None until a cube is opened).
    pub extractor: Option<Extractor>,

    /// Path of the loaded cube, for the title bar and status line.
    pub cube_path: Option<PathBuf>,

    /// Cached picker texture; rebuilt when `texture_dirty` is set.
    pub texture: Option<egui::TextureHandle>,
    texture_dirty: bool,

    /// Whatever the pointer is over on the picker.
    pub cursor_info: Option<CursorInfo>,

    /// Whether the spectrum window is open.
    pub show_spectrum: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            config: ExtractorConfig::default(),
            extractor: None,
            cube_path: None,
            texture: None,
            texture_dirty: false,
            cursor_info: None,
            show_spectrum: false,
            status_message: None,
        }
    }
}

impl AppState {
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Load a cube and stand up a fresh selector over it.
    pub fn load_cube(&mut self, path: &Path) {
        match loader::load_cube(path, &self.config)
            .and_then(|cube| Extractor::new(cube, &self.config, None))
        {
            Ok(extractor) => {
                let shape = extractor.cube().shape();
                self.status_message = None;
                self.show_spectrum = false;
                self.extractor = Some(extractor);
                self.cube_path = Some(path.to_path_buf());
                self.invalidate_texture();
                info!("ready to pick: {shape} cube from {}", path.display());
            }
            Err(e) => {
                error!("failed to load {}: {e}", path.display());
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Toggle the spaxel under a picker-plot position.
    pub fn toggle_at(&mut self, px: f64, py: f64) {
        if let Some(extractor) = &mut self.extractor {
            extractor.toggle_at(px, py);
            self.status_message = None;
            self.invalidate_texture();
        }
    }

    /// The Reset button: clear the whole selection.
    pub fn reset_selection(&mut self) {
        if let Some(extractor) = &mut self.extractor {
            extractor.reset();
            self.status_message = None;
            self.invalidate_texture();
        }
    }

    /// The OK button: commit the selection into a spectrum.
    pub fn commit(&mut self) {
        let Some(extractor) = &mut self.extractor else {
            return;
        };
        extractor.set_redshift(self.config.redshift);
        match extractor.commit() {
            Ok(spectrum) => {
                let channels = spectrum.len();
                self.status_message = Some(format!(
                    "Extracted {channels} channels from {} spaxels",
                    extractor.mask().len()
                ));
                if self.config.plot_output {
                    self.show_spectrum = true;
                }
            }
            Err(e @ ExtractError::Selection) => {
                warn!("commit rejected: {e}");
                self.status_message = Some(format!("Warning: {e}"));
            }
            Err(e) => {
                error!("commit failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Write the committed spectrum to `path`.
    pub fn save_spectrum(&mut self, path: &Path) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        match extractor.save_spectrum(path) {
            Ok(()) => {
                self.status_message = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                error!("failed to save {}: {e}", path.display());
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Mark the picker texture stale (mask or display settings changed).
    pub fn invalidate_texture(&mut self) {
        self.texture_dirty = true;
    }

    /// The picker texture, rebuilt on demand.
    pub fn picker_texture(&mut self, ctx: &egui::Context) -> Option<&egui::TextureHandle> {
        let extractor = self.extractor.as_ref()?;
        if self.texture_dirty || self.texture.is_none() {
            let image = extractor.picker_image();
            let norm =
                Normalization::from_image(image, self.config.norm_percentiles, self.config.stretch);
            let rendered =
                color::render_picker(image, extractor.mask(), &norm, self.config.colormap);
            self.texture =
                Some(ctx.load_texture("picker", rendered, egui::TextureOptions::NEAREST));
            self.texture_dirty = false;
        }
        self.texture.as_ref()
    }

    /// Update the hover readout for a pointer position in plot coordinates.
    pub fn update_cursor(&mut self, pos: Option<(f64, f64)>) {
        self.cursor_info = pos.and_then(|(px, py)| {
            let extractor = self.extractor.as_ref()?;
            let cube = extractor.cube();
            let (ny, nx) = cube.shape().spatial();
            if px < 0.0 || py < 0.0 {
                return None;
            }
            let (x, y) = (px.floor() as usize, py.floor() as usize);
            if x >= nx || y >= ny {
                return None;
            }
            let sky = (self.config.celestial_coordinates)
                .then(|| cube.celestial.map(|wcs| wcs.pix_to_world(x as f64, y as f64)))
                .flatten();
            Some(CursorInfo {
                x,
                y,
                value: extractor.picker_image().at(y, x),
                selected: extractor.mask().contains(y, x),
                sky,
            })
        });
    }
}
