use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::{Colormap, Stretch};

/// Construction-time configuration of the extractor. Every field has a
/// default, so a config file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// EXTNAME of the flux extension in the cube file.
    pub sci_extension: String,
    /// EXTNAME of the standard-error extension.
    pub err_extension: String,
    /// Show approximate sky coordinates in the hover readout.
    pub celestial_coordinates: bool,
    /// Pop up the spectrum plot after each commit.
    pub plot_output: bool,
    /// Redshift used for the rest-wavelength column.
    pub redshift: f64,
    /// Stretch applied to the picker image before colormapping.
    pub stretch: Stretch,
    /// Percentile cuts for the picker normalization.
    pub norm_percentiles: (f64, f64),
    /// Picker colormap.
    pub colormap: Colormap,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            sci_extension: "SCI".to_string(),
            err_extension: "ERR".to_string(),
            celestial_coordinates: false,
            plot_output: false,
            redshift: 0.0,
            stretch: Stretch::Sqrt,
            norm_percentiles: (5.0, 95.0),
            colormap: Colormap::Gray,
        }
    }
}

impl ExtractorConfig {
    /// Load overrides from a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<ExtractorConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_nirspec_conventions() {
        let config = ExtractorConfig::default();
        assert_eq!(config.sci_extension, "SCI");
        assert_eq!(config.err_extension, "ERR");
        assert_eq!(config.redshift, 0.0);
        assert_eq!(config.norm_percentiles, (5.0, 95.0));
        assert_eq!(config.stretch, Stretch::Sqrt);
    }

    #[test]
    fn partial_json_overrides_only_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "redshift": 1.25, "err_extension": "UNCERT" }"#).unwrap();

        let config = ExtractorConfig::from_json_file(&path).unwrap();
        assert_eq!(config.redshift, 1.25);
        assert_eq!(config.err_extension, "UNCERT");
        assert_eq!(config.sci_extension, "SCI");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ExtractorConfig {
            plot_output: true,
            colormap: Colormap::Heat,
            ..ExtractorConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: ExtractorConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.plot_output, true);
        assert_eq!(back.colormap, Colormap::Heat);
    }
}
