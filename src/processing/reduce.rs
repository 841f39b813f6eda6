use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::processing::geomath::distance;
use crate::processing::histogram::SpeedHistogram;
use crate::processing::interval::{IntervalAccumulator, Segment};
use crate::processing::splits::{Split, SplitAccumulator};
use crate::processing::types::{REST_SPEED_MPS, ReductionOptions, Sample, TrackError};

/// Running aggregates over every flushed interval segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackTotals {
    pub distance_m: f64,
    pub time_s: f64,
    pub running_distance_m: f64,
    pub running_time_s: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub running_elevation_gain_m: f64,
    pub running_elevation_loss_m: f64,
    pub rest_time_s: f64,
}

impl TrackTotals {
    fn absorb(&mut self, segment: &Segment, running: bool) {
        self.distance_m += segment.distance_m;
        self.time_s += segment.time_s;
        if segment.elevation_m > 0.0 {
            self.elevation_gain_m += segment.elevation_m;
        } else {
            self.elevation_loss_m -= segment.elevation_m;
        }

        if running {
            self.running_distance_m += segment.distance_m;
            self.running_time_s += segment.time_s;
            if segment.elevation_m > 0.0 {
                self.running_elevation_gain_m += segment.elevation_m;
            } else {
                self.running_elevation_loss_m -= segment.elevation_m;
            }
        }
    }
}

/// Everything a single pass over a track produces.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackReduction {
    pub start: DateTime<Utc>,
    pub sample_count: usize,
    pub totals: TrackTotals,
    pub histogram: SpeedHistogram,
    pub splits: Vec<Split>,
}

/// Change between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SampleDelta {
    distance_m: f64,
    time_s: f64,
    elevation_m: f64,
}

impl SampleDelta {
    fn between(prev: &Sample, next: &Sample, index: usize) -> Result<Self, TrackError> {
        let elapsed_ms = (next.timestamp - prev.timestamp).num_milliseconds();
        if elapsed_ms < 0 {
            return Err(TrackError::TimestampRegression { index });
        }
        Ok(Self {
            distance_m: distance(prev.latitude, prev.longitude, next.latitude, next.longitude),
            time_s: elapsed_ms as f64 / 1000.0,
            elevation_m: next.elevation - prev.elevation,
        })
    }
}

fn check_sample(sample: &Sample, index: usize) -> Result<(), TrackError> {
    for (field, value) in [
        ("latitude", sample.latitude),
        ("longitude", sample.longitude),
        ("elevation", sample.elevation),
    ] {
        if !value.is_finite() {
            return Err(TrackError::NonFiniteField { index, field });
        }
    }
    Ok(())
}

/// Feeds per-sample deltas to the interval and split accumulators and keeps
/// the track totals.
#[derive(Debug)]
pub struct TrackReducer {
    running_speed_mps: f64,
    intervals: IntervalAccumulator,
    splits: SplitAccumulator,
    histogram: SpeedHistogram,
    totals: TrackTotals,
    /// Sample the pending interval starts at.
    interval_start: usize,
}

impl TrackReducer {
    pub fn new(options: &ReductionOptions) -> Result<Self, TrackError> {
        options.validate()?;
        Ok(Self {
            running_speed_mps: options.running_speed_mps(),
            intervals: IntervalAccumulator::new(options.interval_m),
            splits: SplitAccumulator::new(options.split_m),
            histogram: SpeedHistogram::new(),
            totals: TrackTotals::default(),
            interval_start: 0,
        })
    }

    fn step(&mut self, delta: SampleDelta, index: usize, is_last: bool) -> Result<(), TrackError> {
        self.intervals.add(delta.distance_m, delta.time_s, delta.elevation_m);
        if self.intervals.in_flight_speed() < REST_SPEED_MPS {
            self.totals.rest_time_s += delta.time_s;
        }
        if self.intervals.should_flush(is_last) {
            self.flush_interval(index)?;
        }

        self.splits.add(delta.distance_m, delta.time_s, delta.elevation_m);
        Ok(())
    }

    fn flush_interval(&mut self, index: usize) -> Result<(), TrackError> {
        let segment = self.intervals.flush();
        let start = std::mem::replace(&mut self.interval_start, index);
        if segment.is_empty() {
            return Ok(());
        }
        if segment.time_s == 0.0 {
            return Err(TrackError::ZeroElapsedTime {
                start,
                index,
                distance: segment.distance_m,
            });
        }

        let speed = segment.average_speed();
        let bucket = self.histogram.record(&segment);
        let running = speed >= self.running_speed_mps;
        trace!(
            index,
            distance_m = segment.distance_m,
            speed_mps = speed,
            bucket,
            running,
            "interval flushed"
        );
        self.totals.absorb(&segment, running);
        Ok(())
    }

    fn finish(self, start: DateTime<Utc>, sample_count: usize) -> TrackReduction {
        let splits = self.splits.finish();
        debug!(
            samples = sample_count,
            distance_m = self.totals.distance_m,
            time_s = self.totals.time_s,
            running_distance_m = self.totals.running_distance_m,
            rest_time_s = self.totals.rest_time_s,
            splits = splits.len(),
            "track reduced"
        );
        TrackReduction {
            start,
            sample_count,
            totals: self.totals,
            histogram: self.histogram,
            splits,
        }
    }
}

/// Reduce an ordered, finite sample stream in a single pass.
///
/// The stream is consumed once; nothing is buffered beyond the previous sample.
pub fn reduce_samples<I>(
    samples: I,
    options: &ReductionOptions,
) -> Result<TrackReduction, TrackError>
where
    I: IntoIterator<Item = Sample>,
{
    let mut reducer = TrackReducer::new(options)?;
    let mut samples = samples.into_iter().peekable();

    let Some(first) = samples.next() else {
        return Err(TrackError::InsufficientSamples(0));
    };
    check_sample(&first, 0)?;

    let start = first.timestamp;
    let mut prev = first;
    let mut index = 0usize;

    while let Some(sample) = samples.next() {
        index += 1;
        check_sample(&sample, index)?;
        let delta = SampleDelta::between(&prev, &sample, index)?;
        let is_last = samples.peek().is_none();
        reducer.step(delta, index, is_last)?;
        prev = sample;
    }

    let sample_count = index + 1;
    if sample_count < 2 {
        return Err(TrackError::InsufficientSamples(sample_count));
    }
    if reducer.totals.time_s == 0.0 {
        return Err(TrackError::ZeroElapsedTime {
            start: 0,
            index,
            distance: reducer.totals.distance_m,
        });
    }

    Ok(reducer.finish(start, sample_count))
}

/// Convenience wrapper over [`reduce_samples`] for samples already in memory.
pub fn reduce_track(
    samples: &[Sample],
    options: &ReductionOptions,
) -> Result<TrackReduction, TrackError> {
    reduce_samples(samples.iter().copied(), options)
}
