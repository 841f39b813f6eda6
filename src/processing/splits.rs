use serde::Serialize;
use tracing::trace;

/// Remainders shorter than this (meters) do not produce a final partial split.
pub const SPLIT_REMAINDER_EPSILON_M: f64 = 1e-6;
/// Same for time left over (seconds), e.g. standing still after the last boundary.
pub const SPLIT_REMAINDER_EPSILON_S: f64 = 1e-6;

/// Time and elevation for one fixed-length piece of the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Split {
    /// Equal to the configured split length except for the trailing partial split.
    pub length_m: f64,
    pub time_s: f64,
    pub elevation_m: f64,
    pub partial: bool,
}

/// Resamples the delta stream into splits of exactly `split_m` meters.
///
/// Each boundary is interpolated: the split time is the split length divided by
/// the average speed of the current window, and elevation is prorated by the
/// fraction of the window's distance the split covers. Whatever lies beyond the
/// boundary stays in the window for the next split.
#[derive(Debug, Clone)]
pub struct SplitAccumulator {
    split_m: f64,
    distance_m: f64,
    time_s: f64,
    elevation_m: f64,
    splits: Vec<Split>,
}

impl SplitAccumulator {
    pub fn new(split_m: f64) -> Self {
        Self {
            split_m,
            distance_m: 0.0,
            time_s: 0.0,
            elevation_m: 0.0,
            splits: Vec::new(),
        }
    }

    pub fn add(&mut self, distance_m: f64, time_s: f64, elevation_m: f64) {
        self.distance_m += distance_m;
        self.time_s += time_s;
        self.elevation_m += elevation_m;

        while self.distance_m >= self.split_m {
            let fraction = self.split_m / self.distance_m;
            let speed = self.distance_m / self.time_s;
            let split_time = self.split_m / speed;
            let split_elevation = self.elevation_m * fraction;

            trace!(
                index = self.splits.len(),
                time_s = split_time,
                elevation_m = split_elevation,
                "split boundary crossed"
            );
            self.splits.push(Split {
                length_m: self.split_m,
                time_s: split_time,
                elevation_m: split_elevation,
                partial: false,
            });

            self.distance_m -= self.split_m;
            self.time_s -= split_time;
            self.elevation_m -= split_elevation;
        }
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Close the stream, emitting the remainder as a partial split if any
    /// distance or time is left.
    pub fn finish(mut self) -> Vec<Split> {
        if self.distance_m > SPLIT_REMAINDER_EPSILON_M
            || self.time_s > SPLIT_REMAINDER_EPSILON_S
        {
            self.splits.push(Split {
                length_m: self.distance_m,
                time_s: self.time_s,
                elevation_m: self.elevation_m,
                partial: true,
            });
        }
        self.splits
    }
}
