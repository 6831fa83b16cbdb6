use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Result, WaveVizError};

pub const DEFAULT_WAVES_RATIO: f64 = 0.15;
pub const DEFAULT_BACKGROUND_RATIO: f64 = 0.2;
/// Used when `--vis-ratio` is given without a value.
pub const DEFAULT_SHARED_RATIO: f64 = 0.2;
pub const DEFAULT_WAVES_COLOR: &str = "0xffffff";
pub const DEFAULT_WAVES_OPACITY: f64 = 0.9;
pub const DEFAULT_BACKGROUND_COLOR: &str = "0x000000";
pub const DEFAULT_BACKGROUND_OPACITY: f64 = 0.5;

/// Separator ffmpeg's `showwaves` expects between colors.
pub const COLOR_SEPARATOR: &str = "|";

/// How the waveform band and its background band are sized relative to the
/// background image height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RatioMode {
    /// Independent ratios for the waves and for the strip behind them.
    Dual { waves: f64, background: f64 },
    /// One ratio shared by both bands, so the waves fill the strip.
    Shared(f64),
}

impl Default for RatioMode {
    fn default() -> Self {
        Self::Dual {
            waves: DEFAULT_WAVES_RATIO,
            background: DEFAULT_BACKGROUND_RATIO,
        }
    }
}

impl RatioMode {
    pub fn waves_ratio(&self) -> f64 {
        match *self {
            Self::Dual { waves, .. } => waves,
            Self::Shared(ratio) => ratio,
        }
    }

    pub fn background_ratio(&self) -> f64 {
        match *self {
            Self::Dual { background, .. } => background,
            Self::Shared(ratio) => ratio,
        }
    }
}

/// Everything a single run needs, built once from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub audio: PathBuf,
    pub background: PathBuf,
    pub output: PathBuf,
    pub ratios: RatioMode,
    pub waves_colors: Vec<String>,
    pub waves_opacity: f64,
    pub background_color: String,
    pub background_opacity: f64,
    /// Pass `-y` so ffmpeg replaces an existing output file.
    #[serde(default)]
    pub overwrite: bool,
    /// Probe and plan, but do not run ffmpeg.
    #[serde(default)]
    pub dry_run: bool,
}

impl RunConfig {
    /// Creates a config for the three required paths with every optional
    /// setting at its default.
    pub fn new(
        audio: impl Into<PathBuf>,
        background: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            audio: audio.into(),
            background: background.into(),
            output: output.into(),
            ratios: RatioMode::default(),
            waves_colors: vec![DEFAULT_WAVES_COLOR.to_string()],
            waves_opacity: DEFAULT_WAVES_OPACITY,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            overwrite: false,
            dry_run: false,
        }
    }

    /// Re-checks the invariants the command line parser enforces, for callers
    /// that assemble a config by hand.
    pub fn validate(&self) -> Result<()> {
        for (option, path) in [
            ("--audio", &self.audio),
            ("--background", &self.background),
            ("--output", &self.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(WaveVizError::invalid_argument(option, "path must not be empty"));
            }
        }

        match self.ratios {
            RatioMode::Dual { waves, background } => {
                check_unit_interval("--vis-waves-to-vid-ratio", waves)?;
                check_unit_interval("--vis-background-to-vid-ratio", background)?;
            }
            RatioMode::Shared(ratio) => check_unit_interval("--vis-ratio", ratio)?,
        }
        check_unit_interval("--vis-color-opacity", self.waves_opacity)?;
        check_unit_interval("--background-color-opacity", self.background_opacity)?;

        if self.waves_colors.is_empty() {
            return Err(WaveVizError::invalid_argument(
                "--vis-color",
                "at least one color is required",
            ));
        }
        if self.waves_colors.iter().any(|c| c.trim().is_empty()) {
            return Err(WaveVizError::invalid_argument("--vis-color", "colors must not be empty"));
        }
        if self.background_color.trim().is_empty() {
            return Err(WaveVizError::invalid_argument(
                "--background-color",
                "color must not be empty",
            ));
        }
        Ok(())
    }

    /// The waveform colors as the single `a|b|c` value `showwaves` takes.
    pub fn waves_color_spec(&self) -> String {
        self.waves_colors.join(COLOR_SEPARATOR)
    }
}

/// Parses a float literal restricted to `[0.0, 1.0]`.
///
/// The error strings are shown verbatim by the command line parser.
pub fn parse_unit_interval(value: &str) -> std::result::Result<f64, String> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' not a floating-point literal"))?;
    if !in_unit_interval(parsed) {
        return Err(format!("'{value}' not in range [0.0, 1.0]"));
    }
    Ok(parsed)
}

fn check_unit_interval(option: &str, value: f64) -> Result<()> {
    if in_unit_interval(value) {
        Ok(())
    } else {
        Err(WaveVizError::invalid_argument(
            option,
            format!("'{value}' not in range [0.0, 1.0]"),
        ))
    }
}

// NaN fails both comparisons and is rejected.
fn in_unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
