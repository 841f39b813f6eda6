//! Adapters from track files to [`ParsedTrack`].
//!
//! GPX documents are read with the `gpx` crate: every track point of every
//! track and segment becomes a sample, in document order. FIT activities are
//! decoded with `fitparser`; positions arrive as semicircles and are converted
//! to degrees. Both adapters require an elevation and a timestamp on every
//! sample they emit.

use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Utc};
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};

use crate::processing::types::{ParsedTrack, Sample, TrackError, TrackFormat};

/// 2^31 semicircles make up 180 degrees.
const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Decode a track file into samples, picking the decoder from the file name or,
/// failing that, from the payload itself.
pub fn parse_track(bytes: &[u8], file_name: &str) -> Result<ParsedTrack, TrackError> {
    let format = TrackFormat::from_filename(file_name)
        .or_else(|| TrackFormat::sniff(bytes))
        .ok_or_else(|| TrackError::UnsupportedFormat(file_name.to_string()))?;

    match format {
        TrackFormat::Gpx => parse_gpx(bytes, file_name),
        TrackFormat::Fit => parse_fit(bytes, file_name),
    }
}

/// Read every track point of every track and segment in document order.
pub fn parse_gpx(bytes: &[u8], file_name: &str) -> Result<ParsedTrack, TrackError> {
    let gpx =
        gpx::read(Cursor::new(bytes)).map_err(|err| TrackError::ParseError(err.to_string()))?;

    let from_garmin_device = gpx
        .creator
        .as_deref()
        .is_some_and(|creator| creator.starts_with("Garmin"));
    let name = gpx
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.name.clone())
        .or_else(|| gpx.tracks.iter().find_map(|track| track.name.clone()))
        .unwrap_or_else(|| file_stem(file_name));

    let points = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points);

    let mut samples = Vec::new();
    for (index, point) in points.enumerate() {
        let elevation = point.elevation.ok_or(TrackError::MissingField {
            index,
            field: "elevation",
        })?;
        let time = point.time.as_ref().ok_or(TrackError::MissingField {
            index,
            field: "timestamp",
        })?;
        let formatted = time
            .format()
            .map_err(|err| TrackError::ParseError(format!("sample {index}: {err}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&formatted)
            .map_err(|err| TrackError::ParseError(format!("sample {index}: {err}")))?
            .with_timezone(&Utc);

        samples.push(Sample {
            latitude: point.point().y(),
            longitude: point.point().x(),
            elevation,
            timestamp,
        });
    }

    Ok(ParsedTrack {
        name,
        samples,
        from_garmin_device,
        format: TrackFormat::Gpx,
    })
}

/// Read positioned `record` messages of a FIT activity.
///
/// Records without a position (e.g. before a satellite fix) are not samples and
/// are skipped; a positioned record without altitude or timestamp is an error.
pub fn parse_fit(bytes: &[u8], file_name: &str) -> Result<ParsedTrack, TrackError> {
    let records =
        fitparser::from_bytes(bytes).map_err(|err| TrackError::ParseError(err.to_string()))?;

    let from_garmin_device = records.iter().any(is_garmin_file_id);
    let mut samples = Vec::new();

    for record in records.iter().filter(|record| matches!(record.kind(), MesgNum::Record)) {
        let mut latitude: Option<f64> = None;
        let mut longitude: Option<f64> = None;
        let mut altitude: Option<f64> = None;
        let mut enhanced_altitude: Option<f64> = None;
        let mut timestamp: Option<DateTime<Utc>> = None;

        for field in record.fields() {
            match (field.name(), field.value()) {
                ("position_lat", Value::SInt32(v)) => {
                    latitude = Some(*v as f64 * SEMICIRCLES_TO_DEGREES);
                }
                ("position_long", Value::SInt32(v)) => {
                    longitude = Some(*v as f64 * SEMICIRCLES_TO_DEGREES);
                }
                ("altitude", value) => altitude = value_to_f64(value),
                ("enhanced_altitude", value) => enhanced_altitude = value_to_f64(value),
                ("timestamp", Value::Timestamp(t)) => timestamp = Some(t.with_timezone(&Utc)),
                _ => {}
            }
        }

        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            continue;
        };
        let index = samples.len();
        let elevation = enhanced_altitude
            .or(altitude)
            .ok_or(TrackError::MissingField {
                index,
                field: "elevation",
            })?;
        let timestamp = timestamp.ok_or(TrackError::MissingField {
            index,
            field: "timestamp",
        })?;

        samples.push(Sample {
            latitude,
            longitude,
            elevation,
            timestamp,
        });
    }

    Ok(ParsedTrack {
        name: file_stem(file_name),
        samples,
        from_garmin_device,
        format: TrackFormat::Fit,
    })
}

fn is_garmin_file_id(record: &FitDataRecord) -> bool {
    matches!(record.kind(), MesgNum::FileId)
        && record.fields().iter().any(|field| {
            field.name() == "manufacturer"
                && field.value().to_string().eq_ignore_ascii_case("garmin")
        })
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::SInt8(v) => Some(*v as f64),
        Value::UInt8(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt16(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        _ => None,
    }
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Garmin Connect" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>Evening Tempo</name></metadata>
  <trk>
    <name>Track name</name>
    <trkseg>
      <trkpt lat="46.0000000" lon="7.0000000"><ele>500.0</ele><time>2024-05-12T07:30:00Z</time></trkpt>
      <trkpt lat="46.0010000" lon="7.0000000"><ele>502.5</ele><time>2024-05-12T07:30:30.500Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="46.0020000" lon="7.0000000"><ele>501.0</ele><time>2024-05-12T07:31:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn gpx_points_become_samples() {
        let track = parse_track(GPX.as_bytes(), "activity_42.gpx").expect("valid gpx");
        assert_eq!(track.format, TrackFormat::Gpx);
        assert_eq!(track.name, "Evening Tempo");
        assert!(track.from_garmin_device);
        assert_eq!(track.samples.len(), 3);

        let second = track.samples[1];
        assert!((second.latitude - 46.001).abs() < 1e-9);
        assert!((second.longitude - 7.0).abs() < 1e-9);
        assert_eq!(second.elevation, 502.5);
        assert_eq!(
            (second.timestamp - track.samples[0].timestamp).num_milliseconds(),
            30_500
        );
    }

    #[test]
    fn gpx_without_elevation_is_rejected() {
        let doc = GPX.replace("<ele>502.5</ele>", "");
        let err = parse_gpx(doc.as_bytes(), "run.gpx").unwrap_err();
        assert!(matches!(
            err,
            TrackError::MissingField {
                index: 1,
                field: "elevation"
            }
        ));
    }

    #[test]
    fn gpx_without_time_is_rejected() {
        let doc = GPX.replace("<time>2024-05-12T07:31:00Z</time>", "");
        let err = parse_gpx(doc.as_bytes(), "run.gpx").unwrap_err();
        assert!(matches!(
            err,
            TrackError::MissingField {
                index: 2,
                field: "timestamp"
            }
        ));
    }

    #[test]
    fn gpx_name_falls_back_to_track_then_file() {
        let doc = GPX.replace("<metadata><name>Evening Tempo</name></metadata>", "");
        let track = parse_gpx(doc.as_bytes(), "run.gpx").unwrap();
        assert_eq!(track.name, "Track name");

        let doc = doc.replace("<name>Track name</name>", "");
        let track = parse_gpx(doc.as_bytes(), "hill_repeats.gpx").unwrap();
        assert_eq!(track.name, "hill_repeats");
    }

    #[test]
    fn format_is_sniffed_when_name_has_no_extension() {
        let track = parse_track(GPX.as_bytes(), "upload").expect("sniffed as gpx");
        assert_eq!(track.format, TrackFormat::Gpx);
    }

    #[test]
    fn unknown_payload_is_unsupported() {
        let err = parse_track(b"lat,lon\n1,2\n", "points.csv").unwrap_err();
        assert!(matches!(err, TrackError::UnsupportedFormat(_)));
    }

    /// FIT CRC-16 over the Garmin nibble table.
    fn fit_crc(seed: u16, data: &[u8]) -> u16 {
        const TABLE: [u16; 16] = [
            0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00,
            0x7800, 0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
        ];
        data.iter().fold(seed, |crc, byte| {
            let low = TABLE[(crc & 0xF) as usize];
            let crc = ((crc >> 4) & 0x0FFF) ^ low ^ TABLE[(byte & 0xF) as usize];
            let high = TABLE[(crc & 0xF) as usize];
            ((crc >> 4) & 0x0FFF) ^ high ^ TABLE[((byte >> 4) & 0xF) as usize]
        })
    }

    /// Little-endian activity file assembled message by message.
    #[derive(Default)]
    struct FitActivity {
        data: Vec<u8>,
    }

    impl FitActivity {
        /// `fields` are `(number, size, base type)` triples.
        fn define(mut self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Self {
            self.data.extend_from_slice(&[0x40 | local, 0, 0]);
            self.data.extend_from_slice(&global.to_le_bytes());
            self.data.push(fields.len() as u8);
            for (number, size, base_type) in fields {
                self.data.extend_from_slice(&[*number, *size, *base_type]);
            }
            self
        }

        fn message(mut self, local: u8, values: &[&[u8]]) -> Self {
            self.data.push(local);
            for value in values {
                self.data.extend_from_slice(value);
            }
            self
        }

        fn into_bytes(self) -> Vec<u8> {
            let mut bytes = vec![14, 0x20];
            bytes.extend_from_slice(&2132u16.to_le_bytes());
            bytes.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
            bytes.extend_from_slice(b".FIT");
            let header_crc = fit_crc(0, &bytes);
            bytes.extend_from_slice(&header_crc.to_le_bytes());
            bytes.extend_from_slice(&self.data);
            let data_crc = fit_crc(0, &bytes);
            bytes.extend_from_slice(&data_crc.to_le_bytes());
            bytes
        }
    }

    const ENUM: u8 = 0x00;
    const UINT16: u8 = 0x84;
    const SINT32: u8 = 0x85;
    const UINT32: u8 = 0x86;
    const FILE_ID: u16 = 0;
    const RECORD: u16 = 20;
    /// 2024-05-07T07:06:40Z in seconds since 1989-12-31.
    const FIT_START: u32 = 1_084_000_000;
    const UNIX_OFFSET: i64 = 631_065_600;
    const LAT: i32 = 554_766_609;
    const LON: i32 = 83_513_253;

    fn file_id(manufacturer: u16) -> FitActivity {
        FitActivity::default()
            .define(0, FILE_ID, &[(0, 1, ENUM), (1, 2, UINT16), (4, 4, UINT32)])
            .message(
                0,
                &[&[4], &manufacturer.to_le_bytes(), &FIT_START.to_le_bytes()],
            )
    }

    fn fit_time(offset: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(UNIX_OFFSET + (FIT_START + offset) as i64, 0).unwrap()
    }

    #[test]
    fn fit_records_become_samples() {
        let bytes = file_id(1)
            // timestamp, position, altitude and enhanced altitude
            .define(
                1,
                RECORD,
                &[
                    (253, 4, UINT32),
                    (0, 4, SINT32),
                    (1, 4, SINT32),
                    (2, 2, UINT16),
                    (78, 4, UINT32),
                ],
            )
            // timestamp and altitude, no fix yet
            .define(2, RECORD, &[(253, 4, UINT32), (2, 2, UINT16)])
            // timestamp, position and plain altitude
            .define(
                3,
                RECORD,
                &[(253, 4, UINT32), (0, 4, SINT32), (1, 4, SINT32), (2, 2, UINT16)],
            )
            .message(2, &[&FIT_START.to_le_bytes(), &5025u16.to_le_bytes()])
            .message(
                1,
                &[
                    &(FIT_START + 1).to_le_bytes(),
                    &LAT.to_le_bytes(),
                    &LON.to_le_bytes(),
                    &5025u16.to_le_bytes(),
                    &5062u32.to_le_bytes(),
                ],
            )
            .message(
                3,
                &[
                    &(FIT_START + 6).to_le_bytes(),
                    &(LAT + 11_930).to_le_bytes(),
                    &LON.to_le_bytes(),
                    &5050u16.to_le_bytes(),
                ],
            )
            .into_bytes();

        let track = parse_track(&bytes, "Morning_Run.fit").expect("valid fit");
        assert_eq!(track.format, TrackFormat::Fit);
        assert_eq!(track.name, "Morning_Run");
        assert!(track.from_garmin_device);
        assert_eq!(track.samples.len(), 2);

        let first = track.samples[0];
        assert!((first.latitude - 46.5).abs() < 1e-7);
        assert!((first.longitude - 7.0).abs() < 1e-7);
        assert_eq!(first.latitude, LAT as f64 * SEMICIRCLES_TO_DEGREES);
        // Enhanced altitude wins over the 16-bit one: (5062 / 5) - 500.
        assert!((first.elevation - 512.4).abs() < 1e-9);
        assert_eq!(first.timestamp, fit_time(1));

        let second = track.samples[1];
        assert!((second.latitude - 46.501).abs() < 1e-6);
        assert!((second.elevation - 510.0).abs() < 1e-9);
        assert_eq!(second.timestamp, fit_time(6));
    }

    #[test]
    fn fit_from_other_manufacturers_has_no_device_flag() {
        let bytes = file_id(255)
            .define(
                1,
                RECORD,
                &[(253, 4, UINT32), (0, 4, SINT32), (1, 4, SINT32), (78, 4, UINT32)],
            )
            .message(
                1,
                &[
                    &FIT_START.to_le_bytes(),
                    &LAT.to_le_bytes(),
                    &LON.to_le_bytes(),
                    &5000u32.to_le_bytes(),
                ],
            )
            .into_bytes();

        let track = parse_fit(&bytes, "ride.fit").expect("valid fit");
        assert!(!track.from_garmin_device);
        assert_eq!(track.samples.len(), 1);
        assert!((track.samples[0].elevation - 500.0).abs() < 1e-9);
    }

    #[test]
    fn fit_record_without_timestamp_is_rejected() {
        let bytes = file_id(1)
            .define(1, RECORD, &[(0, 4, SINT32), (1, 4, SINT32), (78, 4, UINT32)])
            .message(
                1,
                &[&LAT.to_le_bytes(), &LON.to_le_bytes(), &5062u32.to_le_bytes()],
            )
            .into_bytes();

        let err = parse_fit(&bytes, "ride.fit").unwrap_err();
        assert!(matches!(
            err,
            TrackError::MissingField {
                index: 0,
                field: "timestamp"
            }
        ));
    }

    #[test]
    fn fit_record_without_altitude_is_rejected() {
        let bytes = file_id(1)
            .define(1, RECORD, &[(253, 4, UINT32), (0, 4, SINT32), (1, 4, SINT32)])
            .message(
                1,
                &[&FIT_START.to_le_bytes(), &LAT.to_le_bytes(), &LON.to_le_bytes()],
            )
            .into_bytes();

        let err = parse_fit(&bytes, "ride.fit").unwrap_err();
        assert!(matches!(
            err,
            TrackError::MissingField {
                index: 0,
                field: "elevation"
            }
        ));
    }

    #[test]
    fn broken_fit_surfaces_parse_error() {
        let err = parse_track(b"definitely not a fit file", "ride.fit").unwrap_err();
        assert!(matches!(err, TrackError::ParseError(_)));
    }
}
