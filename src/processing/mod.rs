pub mod geomath;
pub mod histogram;
pub mod interval;
pub mod metadata;
pub mod parse;
pub mod reduce;
pub mod report;
pub mod splits;
pub mod types;

use metadata::TrackMetadata;
use parse::parse_track;
use reduce::reduce_track;
use report::build_report;

pub use reduce::{TrackReduction, TrackTotals, reduce_samples};
pub use report::{BucketSummary, SplitSummary, TrackReport, TrackSummary};
pub use types::{ErrorCategory, ParsedTrack, ReductionOptions, Sample, TrackError, TrackFormat};

/// Decode a track file, reduce it in one pass, and build the report.
///
/// The function performs four stages:
/// 1. [`ReductionOptions::validate`] rejects unusable options before any work.
/// 2. [`parse::parse_track`] turns GPX or FIT bytes into ordered samples.
/// 3. [`reduce::reduce_track`] runs the interval, histogram and split
///    accumulators over the samples.
/// 4. [`report::build_report`] formats the totals, the speed distribution and
///    the splits alongside the track metadata.
///
/// Either the whole report is produced or an error describing the first
/// problem is returned.
pub fn analyze_track_bytes(
    bytes: &[u8],
    file_name: &str,
    options: &ReductionOptions,
) -> Result<TrackReport, TrackError> {
    options.validate()?;
    let track = parse_track(bytes, file_name)?;
    analyze_parsed_track(&track, file_name, options)
}

/// Same as [`analyze_track_bytes`] for a track that is already decoded.
pub fn analyze_parsed_track(
    track: &ParsedTrack,
    file_name: &str,
    options: &ReductionOptions,
) -> Result<TrackReport, TrackError> {
    let reduction = reduce_track(&track.samples, options)?;
    let metadata = TrackMetadata::new(file_name, track, reduction.start);
    Ok(build_report(metadata, *options, &reduction))
}
