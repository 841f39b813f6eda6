use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Multiply a km/h value by this to obtain m/s.
pub const KMH_TO_MPS: f64 = 5.0 / 18.0;

/// Default minimum speed (km/h) for a segment to count as running.
pub const DEFAULT_RUNNING_SPEED_KMH: f64 = 9.0;
/// Default interval length (meters) used to chunk the track for the histogram.
pub const DEFAULT_INTERVAL_M: f64 = 100.0;
/// Default split length (meters).
pub const DEFAULT_SPLIT_M: f64 = 1000.0;
/// In-flight interval speeds below this (m/s) count towards rest time.
pub const REST_SPEED_MPS: f64 = 0.5;

/// One recorded position along a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
    pub timestamp: DateTime<Utc>,
}

/// File formats the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackFormat {
    Gpx,
    Fit,
}

impl TrackFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "gpx" => Some(TrackFormat::Gpx),
            "fit" => Some(TrackFormat::Fit),
            _ => None,
        }
    }

    /// Guess the format from the payload when the file name does not tell.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.get(8..12) == Some(b".FIT".as_slice()) {
            return Some(TrackFormat::Fit);
        }
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
        let head = head.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("<?xml") || head.starts_with("<gpx") {
            return Some(TrackFormat::Gpx);
        }
        None
    }
}

/// Output of the file adapters: the samples plus the metadata the report needs.
#[derive(Debug, Clone)]
pub struct ParsedTrack {
    pub name: String,
    pub samples: Vec<Sample>,
    /// Recorded by a device whose activities can be linked to online.
    pub from_garmin_device: bool,
    pub format: TrackFormat,
}

/// User-facing knobs of the reduction pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReductionOptions {
    /// Segments at or above this speed (km/h) count as running.
    pub running_speed_kmh: f64,
    /// Distance (m) after which the interval accumulator flushes.
    pub interval_m: f64,
    /// Length (m) of one split.
    pub split_m: f64,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            running_speed_kmh: DEFAULT_RUNNING_SPEED_KMH,
            interval_m: DEFAULT_INTERVAL_M,
            split_m: DEFAULT_SPLIT_M,
        }
    }
}

impl ReductionOptions {
    pub fn validate(&self) -> Result<(), TrackError> {
        for (name, value) in [
            ("running_speed", self.running_speed_kmh),
            ("interval", self.interval_m),
            ("split", self.split_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackError::InvalidOption { name, value });
            }
        }
        Ok(())
    }

    pub fn running_speed_mps(&self) -> f64 {
        self.running_speed_kmh * KMH_TO_MPS
    }
}

/// Coarse grouping of [`TrackError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Config,
    TemporalOrder,
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Failed to decode track file: {0}")]
    ParseError(String),
    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),
    #[error("Sample {index} has no {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("Sample {index} has a non-finite {field}")]
    NonFiniteField { index: usize, field: &'static str },
    #[error("A track needs at least two samples, found {0}")]
    InsufficientSamples(usize),
    #[error("Invalid {name}: {value} (must be a positive number)")]
    InvalidOption { name: &'static str, value: f64 },
    #[error("Timestamp of sample {index} is earlier than the one before it")]
    TimestampRegression { index: usize },
    /// `start..=index` are the samples the zero-time stretch spans.
    #[error(
        "Samples {start} to {index} cover {distance:.1} m with no elapsed time \
         (duplicated timestamps?)"
    )]
    ZeroElapsedTime {
        start: usize,
        index: usize,
        distance: f64,
    },
}

impl TrackError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackError::InvalidOption { .. } => ErrorCategory::Config,
            TrackError::TimestampRegression { .. } => ErrorCategory::TemporalOrder,
            _ => ErrorCategory::Input,
        }
    }
}
