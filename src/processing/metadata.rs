use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::processing::types::ParsedTrack;

const GARMIN_ACTIVITY_URL: &str = "https://connect.garmin.com/modern/activity/";
/// Marker some exports append to revised file names.
const REVISION_SUFFIX: &str = "_-REV-_";

/// Descriptive fields shown next to the computed statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub generated_by: String,
    pub raw_name: String,
    pub name: String,
    /// UTC calendar date of the first sample, `YYYY-MM-DD`.
    pub start_date: String,
    /// e.g. `12 May 2024 Sun`.
    pub friendly_date: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub start_time_ms: i64,
    pub activity_type: &'static str,
    pub activity_link: Option<String>,
}

impl TrackMetadata {
    pub fn new(file_name: &str, track: &ParsedTrack, start: DateTime<Utc>) -> Self {
        Self {
            generated_by: file_name.to_string(),
            raw_name: track.name.clone(),
            name: clean_name(&track.name),
            start_date: start.format("%Y-%m-%d").to_string(),
            friendly_date: start.format("%d %b %Y %a").to_string(),
            year: start.year(),
            month: start.month(),
            day: start.day(),
            start_time_ms: start.timestamp_millis(),
            activity_type: "running",
            activity_link: activity_link(file_name, track.from_garmin_device),
        }
    }
}

/// Keep ASCII letters, digits and whitespace, trimmed.
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_ascii_digit() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Link to the online activity for device exports named `<anything>_<id>.<ext>`.
pub fn activity_link(file_name: &str, from_garmin_device: bool) -> Option<String> {
    if !from_garmin_device {
        return None;
    }
    let base = match file_name.find(REVISION_SUFFIX) {
        Some(cut) => &file_name[..cut],
        None => file_name,
    };
    let underscore = base.find('_')?;
    let dot = base.rfind('.')?;
    if underscore >= dot {
        return None;
    }
    let id = &base[underscore + 1..dot];
    if id.is_empty() {
        return None;
    }
    Some(format!("{GARMIN_ACTIVITY_URL}{id}"))
}
