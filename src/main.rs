mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::CubepickApp;
use config::ExtractorConfig;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("usage: cubepick [--config <config.json>] [cube.fits]");
            std::process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => match ExtractorConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e:#}");
                std::process::exit(2);
            }
        },
        None => ExtractorConfig::default(),
    };

    let mut state = AppState::with_config(config);
    if let Some(path) = &args.cube {
        state.load_cube(path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Cubepick – IFU Spectrum Picker",
        options,
        Box::new(|_cc| Ok(Box::new(CubepickApp::new(state)))),
    )
}

/// Command line: an optional cube path plus an optional JSON config.
struct Args {
    cube: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
        let mut cube = None;
        let mut config = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                other if other.starts_with('-') => {
                    return Err(format!("unknown option '{other}'"));
                }
                other => {
                    if cube.replace(PathBuf::from(other)).is_some() {
                        return Err("at most one cube path is accepted".to_string());
                    }
                }
            }
        }
        Ok(Args { cube, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn bare_invocation_has_no_paths() {
        let args = parse(&[]).unwrap();
        assert!(args.cube.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn cube_and_config_are_both_accepted() {
        let args = parse(&["--config", "settings.json", "cube.fits"]).unwrap();
        assert_eq!(args.cube.unwrap(), PathBuf::from("cube.fits"));
        assert_eq!(args.config.unwrap(), PathBuf::from("settings.json"));
    }

    #[test]
    fn two_cube_paths_are_rejected() {
        assert!(parse(&["a.fits", "b.fits"]).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse(&["--cube", "a.fits"]).is_err());
    }
}
