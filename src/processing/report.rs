use serde::Serialize;

use crate::processing::geomath::{Pace, format_time, speed_to_pace};
use crate::processing::histogram::SpeedHistogram;
use crate::processing::metadata::TrackMetadata;
use crate::processing::reduce::TrackReduction;
use crate::processing::splits::Split;
use crate::processing::types::{KMH_TO_MPS, ReductionOptions};

/// Full analysis of one track, ready for rendering or serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub metadata: TrackMetadata,
    pub options: ReductionOptions,
    pub summary: TrackSummary,
    pub speed_distribution: Vec<BucketSummary>,
    pub splits: Vec<SplitSummary>,
}

/// Whole-track figures. Formatted strings sit next to the raw values they
/// came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub distance: String,
    pub distance_km: f64,
    pub running_distance: String,
    pub running_distance_km: f64,
    /// Share of the distance covered at running speed, in percent.
    pub running_share_percent: Option<f64>,
    pub running_time: String,
    pub running_time_s: f64,
    pub total_time: String,
    pub total_time_s: f64,
    pub rest_time: String,
    pub rest_time_s: f64,
    pub average_speed: String,
    pub average_speed_kmh: f64,
    pub average_pace: Option<Pace>,
    pub elevation_running_gain_m: i64,
    pub elevation_running_loss_m: i64,
    pub elevation_total_gain_m: i64,
    pub elevation_total_loss_m: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub range: String,
    pub distance: String,
    pub time: String,
    pub time_s: i64,
    pub elevation_gain_m: i64,
    pub elevation_loss_m: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    /// Distance from the start to the end of this split, km.
    pub total: String,
    pub total_km: f64,
    pub length: String,
    pub time: String,
    pub time_s: i64,
    pub cumulative_time: String,
    pub cumulative_time_s: i64,
    /// Absent for a trailing split that covers no distance.
    pub pace: Option<Pace>,
    pub speed: Option<String>,
    pub cumulative_speed: Option<String>,
    pub elevation_m: i64,
}

fn km(meters: f64) -> String {
    format!("{:.3}", meters / 1000.0)
}

pub fn build_report(
    metadata: TrackMetadata,
    options: ReductionOptions,
    reduction: &TrackReduction,
) -> TrackReport {
    TrackReport {
        metadata,
        options,
        summary: summarize(reduction),
        speed_distribution: summarize_buckets(&reduction.histogram),
        splits: summarize_splits(&reduction.splits),
    }
}

fn summarize(reduction: &TrackReduction) -> TrackSummary {
    let totals = &reduction.totals;
    let average_speed_kmh = (totals.distance_m / totals.time_s) / KMH_TO_MPS;
    let running_share_percent = (totals.distance_m > 0.0)
        .then(|| totals.running_distance_m / totals.distance_m * 100.0);

    TrackSummary {
        distance: km(totals.distance_m),
        distance_km: totals.distance_m / 1000.0,
        running_distance: km(totals.running_distance_m),
        running_distance_km: totals.running_distance_m / 1000.0,
        running_share_percent,
        running_time: format_time(totals.running_time_s as u64, true),
        running_time_s: totals.running_time_s,
        total_time: format_time(totals.time_s as u64, true),
        total_time_s: totals.time_s,
        rest_time: format_time(totals.rest_time_s as u64, true),
        rest_time_s: totals.rest_time_s,
        average_speed: format!("{average_speed_kmh:.3}"),
        average_speed_kmh,
        average_pace: speed_to_pace(average_speed_kmh),
        elevation_running_gain_m: totals.running_elevation_gain_m as i64,
        elevation_running_loss_m: totals.running_elevation_loss_m as i64,
        elevation_total_gain_m: totals.elevation_gain_m as i64,
        elevation_total_loss_m: totals.elevation_loss_m as i64,
    }
}

fn summarize_buckets(histogram: &SpeedHistogram) -> Vec<BucketSummary> {
    histogram
        .buckets()
        .iter()
        .enumerate()
        .map(|(index, bucket)| BucketSummary {
            range: SpeedHistogram::range_label(index),
            distance: km(bucket.distance_m),
            time: format_time(bucket.time_s as u64, true),
            time_s: bucket.time_s as i64,
            elevation_gain_m: bucket.elevation_gain_m as i64,
            elevation_loss_m: bucket.elevation_loss_m as i64,
        })
        .collect()
}

fn summarize_splits(splits: &[Split]) -> Vec<SplitSummary> {
    let mut total_km = 0.0;
    let mut cumulative_time_s = 0.0;

    splits
        .iter()
        .map(|split| {
            let length_km = split.length_m / 1000.0;
            total_km += length_km;
            cumulative_time_s += split.time_s;

            let has_length = length_km > 0.0;
            let pace_minutes = (split.time_s / 60.0) / length_km;
            let speed = (split.time_s > 0.0)
                .then(|| format!("{:.3}", length_km / (split.time_s / 3600.0)));
            let cumulative_speed = (cumulative_time_s > 0.0)
                .then(|| format!("{:.3}", total_km / (cumulative_time_s / 3600.0)));
            let cumulative_rounded = cumulative_time_s.round() as i64;

            SplitSummary {
                total: format!("{total_km:.3}"),
                total_km,
                length: format!("{length_km:.3}"),
                time: format_time(split.time_s as u64, false),
                time_s: split.time_s.round() as i64,
                cumulative_time: format_time(cumulative_rounded.max(0) as u64, true),
                cumulative_time_s: cumulative_rounded,
                pace: has_length.then(|| Pace::from_minutes(pace_minutes)),
                speed,
                cumulative_speed,
                elevation_m: split.elevation_m as i64,
            }
        })
        .collect()
}
