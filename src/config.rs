use serde_derive::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::alert::{AlertThresholds, Tone};
use crate::centroid::DEFAULT_MAX_CENTROID_DISTANCE;
use crate::error::Error;
use crate::estimator::Calibration;
use crate::rolling_avg::DEFAULT_WINDOW;
use crate::speed::DEFAULT_FPS;

pub const CONFIG_ENV: &str = "POTHOLE_CONFIG";

const DEFAULT_HIGH_TONE_HZ: u32 = 1000;
const DEFAULT_HIGH_TONE_MS: u64 = 300;
const DEFAULT_LOW_TONE_HZ: u32 = 700;
const DEFAULT_LOW_TONE_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// detection `i` pairs with detection `i` of the previous frame
    #[default]
    Index,
    /// nearest centroid within `max_centroid_distance` pixels
    Centroid,
}

impl FromStr for TrackingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(TrackingMode::Index),
            "centroid" => Ok(TrackingMode::Centroid),
            other => Err(Error::InvalidConfig(format!(
                "unknown tracking mode {:?} (expected \"index\" or \"centroid\")",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PotholeConfigFile {
    calibration: Option<CalibrationFile>,
    speed: Option<SpeedFile>,
    alert: Option<AlertFile>,
    tracking: Option<TrackingFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CalibrationFile {
    pixels_per_meter: Option<f32>,
    focal_length: Option<f32>,
    known_width: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeedFile {
    default_fps: Option<f32>,
    window: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertFile {
    high_width: Option<f32>,
    high_speed: Option<f32>,
    low_width: Option<f32>,
    low_speed: Option<f32>,
    high_tone_hz: Option<u32>,
    high_tone_ms: Option<u64>,
    low_tone_hz: Option<u32>,
    low_tone_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingFile {
    mode: Option<TrackingMode>,
    max_centroid_distance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PotholeConfig {
    pub calibration: Calibration,
    /// used when the video source reports no usable frame rate
    pub default_fps: f32,
    /// speed smoothing window, in frames
    pub window: usize,
    pub alert: AlertThresholds,
    pub high_tone: Tone,
    pub low_tone: Tone,
    pub tracking: TrackingMode,
    /// centroid gate, in pixels
    pub max_centroid_distance: f32,
}

impl Default for PotholeConfig {
    fn default() -> Self {
        Self::from_file(PotholeConfigFile::default())
    }
}

impl PotholeConfig {
    /// Reads the file named by `POTHOLE_CONFIG` if set, then applies environment overrides.
    pub fn load() -> Result<Self, Error> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load_from(Path::new(&path)),
            _ => {
                let mut cfg = Self::default();
                cfg.apply_env()?;
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    /// Same as [`PotholeConfig::load`] with an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses TOML without looking at the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        let file: PotholeConfigFile = toml::from_str(raw)?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PotholeConfigFile) -> Self {
        let defaults = Calibration::default();
        let calibration = file.calibration.unwrap_or_default();
        let speed = file.speed.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let tracking = file.tracking.unwrap_or_default();
        let thresholds = AlertThresholds::default();

        Self {
            calibration: Calibration {
                pixels_per_meter: calibration
                    .pixels_per_meter
                    .unwrap_or(defaults.pixels_per_meter),
                focal_length: calibration.focal_length.unwrap_or(defaults.focal_length),
                known_width: calibration.known_width.unwrap_or(defaults.known_width),
            },
            default_fps: speed.default_fps.unwrap_or(DEFAULT_FPS),
            window: speed.window.unwrap_or(DEFAULT_WINDOW),
            alert: AlertThresholds {
                high_width_m: alert.high_width.unwrap_or(thresholds.high_width_m),
                high_speed_kmh: alert.high_speed.unwrap_or(thresholds.high_speed_kmh),
                low_width_m: alert.low_width.unwrap_or(thresholds.low_width_m),
                low_speed_kmh: alert.low_speed.unwrap_or(thresholds.low_speed_kmh),
            },
            high_tone: Tone::new(
                alert.high_tone_hz.unwrap_or(DEFAULT_HIGH_TONE_HZ),
                alert.high_tone_ms.unwrap_or(DEFAULT_HIGH_TONE_MS),
            ),
            low_tone: Tone::new(
                alert.low_tone_hz.unwrap_or(DEFAULT_LOW_TONE_HZ),
                alert.low_tone_ms.unwrap_or(DEFAULT_LOW_TONE_MS),
            ),
            tracking: tracking.mode.unwrap_or_default(),
            max_centroid_distance: tracking
                .max_centroid_distance
                .unwrap_or(DEFAULT_MAX_CENTROID_DISTANCE),
        }
    }

    fn apply_env(&mut self) -> Result<(), Error> {
        if let Some(v) = env_f32("POTHOLE_PIXELS_PER_METER")? {
            self.calibration.pixels_per_meter = v;
        }
        if let Some(v) = env_f32("POTHOLE_FOCAL_LENGTH")? {
            self.calibration.focal_length = v;
        }
        if let Some(v) = env_f32("POTHOLE_KNOWN_WIDTH")? {
            self.calibration.known_width = v;
        }
        if let Some(v) = env_f32("POTHOLE_DEFAULT_FPS")? {
            self.default_fps = v;
        }
        if let Ok(mode) = std::env::var("POTHOLE_TRACKING") {
            if !mode.trim().is_empty() {
                self.tracking = mode.parse()?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.calibration.validate()?;

        if !(self.default_fps > 0.0 && self.default_fps.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "default_fps must be a positive number, got {}",
                self.default_fps
            )));
        }
        if self.window == 0 {
            return Err(Error::InvalidConfig(
                "speed window must hold at least one sample".to_string(),
            ));
        }
        if !(self.max_centroid_distance > 0.0 && self.max_centroid_distance.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "max_centroid_distance must be a positive number, got {}",
                self.max_centroid_distance
            )));
        }

        let t = &self.alert;
        for (name, value) in [
            ("high_width", t.high_width_m),
            ("high_speed", t.high_speed_kmh),
            ("low_width", t.low_width_m),
            ("low_speed", t.low_speed_kmh),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "alert {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        for (name, tone) in [("high", self.high_tone), ("low", self.low_tone)] {
            if tone.frequency_hz == 0 || tone.duration.is_zero() {
                return Err(Error::InvalidConfig(format!(
                    "{} alert tone needs a non-zero frequency and duration",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PotholeConfigFile, Error> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&raw).map_err(|e| {
        Error::InvalidConfig(format!("invalid config file {}: {}", path.display(), e))
    })
}

fn env_f32(key: &str) -> Result<Option<f32>, Error> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{} must be a number, got {:?}", key, value))),
        _ => Ok(None),
    }
}
