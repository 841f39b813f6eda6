//! Distance on a spherical Earth and the speed, pace and time conversions the
//! report is built from.
//!
//! Pace and clock values are truncated to whole seconds, never rounded.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Mean Earth radius used by [`distance`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in meters between two WGS84 coordinates (degrees),
/// using the haversine formula.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

/// Minutes and seconds needed to cover one kilometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pace {
    pub minutes: u64,
    pub seconds: u64,
}

impl Pace {
    /// Split fractional minutes-per-km into truncated minutes and seconds.
    pub fn from_minutes(pace_minutes: f64) -> Self {
        let pace_minutes = pace_minutes.max(0.0);
        let minutes = pace_minutes.trunc();
        let seconds = ((pace_minutes - minutes) * 60.0).max(0.0);
        Self {
            minutes: minutes as u64,
            seconds: seconds as u64,
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

/// Pace for a speed in km/h, or `None` when the speed is not a positive finite
/// number.
pub fn speed_to_pace(speed_kmh: f64) -> Option<Pace> {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return None;
    }
    Some(Pace::from_minutes(60.0 / speed_kmh))
}

/// Render whole seconds as `HH:MM:SS`, or `MM:SS` when `include_hours` is false
/// and the duration is under an hour.
pub fn format_time(seconds: u64, include_hours: bool) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    if include_hours || hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeFormatError {
    #[error("expected MM:SS or HH:MM:SS, got {0:?}")]
    FieldCount(String),
    #[error("{0:?} is not a number")]
    NotANumber(String),
    #[error("{field} {value} is out of range in {input:?}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        input: String,
    },
    #[error("{0:?} is too long to count in seconds")]
    Overflow(String),
}

/// Inverse of [`format_time`]: accepts `MM:SS` or `HH:MM:SS`.
///
/// The leading field is unbounded; every following field must be below 60.
pub fn parse_time(formatted: &str) -> Result<u64, TimeFormatError> {
    let fields: Vec<&str> = formatted.trim().split(':').collect();
    let names: &[&'static str] = match fields.len() {
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimeFormatError::FieldCount(formatted.to_string())),
    };

    let mut total = 0u64;
    for (position, (raw, name)) in fields.iter().zip(names).enumerate() {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeFormatError::NotANumber((*raw).to_string()));
        }
        let value: u64 = raw
            .parse()
            .map_err(|_| TimeFormatError::NotANumber((*raw).to_string()))?;
        if position > 0 && value >= 60 {
            return Err(TimeFormatError::OutOfRange {
                field: name,
                value,
                input: formatted.to_string(),
            });
        }
        total = total
            .checked_mul(60)
            .and_then(|minutes| minutes.checked_add(value))
            .ok_or_else(|| TimeFormatError::Overflow(formatted.to_string()))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_points() {
        assert_eq!(distance(47.3769, 8.5417, 47.3769, 8.5417), 0.0);
        assert_eq!(distance(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (51.5074, -0.1278, 48.8566, 2.3522),
            (-33.8688, 151.2093, -37.8136, 144.9631),
            (0.0, 179.9, 0.0, -179.9),
        ];
        for (lat1, lon1, lat2, lon2) in pairs {
            assert_eq!(
                distance(lat1, lon1, lat2, lon2),
                distance(lat2, lon2, lat1, lon1)
            );
        }
    }

    #[test]
    fn distance_matches_known_values() {
        // One thousandth of a degree along the equator.
        let d = distance(0.0, 0.0, 0.0, 0.001);
        assert!((d - 111.195).abs() < 0.01, "got {d}");

        // London to Paris is roughly 343.5 km on a sphere.
        let d = distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_556.0).abs() < 1_000.0, "got {d}");
    }

    #[test]
    fn pace_truncates_seconds() {
        // 60 / 11 = 5.4545... min/km -> 5:27.27 -> 5:27
        assert_eq!(speed_to_pace(11.0), Some(Pace { minutes: 5, seconds: 27 }));
        assert_eq!(speed_to_pace(12.0).map(|p| p.to_string()).as_deref(), Some("5:00"));
        assert_eq!(speed_to_pace(7.0).map(|p| p.to_string()).as_deref(), Some("8:34"));
        assert_eq!(speed_to_pace(60.0).map(|p| p.to_string()).as_deref(), Some("1:00"));
    }

    #[test]
    fn pace_requires_positive_speed() {
        assert_eq!(speed_to_pace(0.0), None);
        assert_eq!(speed_to_pace(-3.0), None);
        assert_eq!(speed_to_pace(f64::INFINITY), None);
        assert_eq!(speed_to_pace(f64::NAN), None);
    }

    #[test]
    fn time_formatting_pads_fields() {
        assert_eq!(format_time(0, true), "00:00:00");
        assert_eq!(format_time(0, false), "00:00");
        assert_eq!(format_time(59, false), "00:59");
        assert_eq!(format_time(305, false), "05:05");
        assert_eq!(format_time(3723, false), "01:02:03");
        assert_eq!(format_time(3723, true), "01:02:03");
        assert_eq!(format_time(360_000, true), "100:00:00");
    }

    #[test]
    fn parse_time_accepts_both_layouts() {
        assert_eq!(parse_time("05:07"), Ok(307));
        assert_eq!(parse_time("01:02:03"), Ok(3723));
        assert_eq!(parse_time("125:00"), Ok(7500));
    }

    #[test]
    fn parse_time_rejects_malformed_input() {
        assert!(matches!(parse_time("12"), Err(TimeFormatError::FieldCount(_))));
        assert!(matches!(parse_time("1:2:3:4"), Err(TimeFormatError::FieldCount(_))));
        assert!(matches!(parse_time("ab:10"), Err(TimeFormatError::NotANumber(_))));
        assert!(matches!(parse_time("10:"), Err(TimeFormatError::NotANumber(_))));
        assert!(matches!(parse_time("-1:10"), Err(TimeFormatError::NotANumber(_))));
        assert!(matches!(
            parse_time("01:75:00"),
            Err(TimeFormatError::OutOfRange { field: "minutes", .. })
        ));
        assert!(matches!(
            parse_time("10:60"),
            Err(TimeFormatError::OutOfRange { field: "seconds", .. })
        ));
        assert!(matches!(
            parse_time("18446744073709551615:00"),
            Err(TimeFormatError::Overflow(_))
        ));
        // Fits after the multiplication, overflows on the addition.
        assert!(matches!(
            parse_time("307445734561825860:59"),
            Err(TimeFormatError::Overflow(_))
        ));
        assert_eq!(
            parse_time("307445734561825860:15"),
            Ok(18_446_744_073_709_551_615)
        );
    }

    #[test]
    fn formatted_times_round_trip() {
        for canonical in ["00:00:00", "01:02:03", "23:59:59", "100:00:01"] {
            let seconds = parse_time(canonical).expect("canonical time parses");
            assert_eq!(format_time(seconds, true), canonical);
        }
        for canonical in ["00:00", "05:07", "59:59"] {
            let seconds = parse_time(canonical).expect("canonical time parses");
            assert_eq!(format_time(seconds, false), canonical);
        }
    }
}
