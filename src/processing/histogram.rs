use serde::Serialize;

use crate::processing::interval::Segment;
use crate::processing::types::KMH_TO_MPS;

/// Lower bounds (km/h) of the speed buckets.
pub const SPEED_LADDER_KMH: [f64; 8] = [0.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];

/// Totals of every interval segment whose speed fell into one range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedBucket {
    pub lower_bound_mps: f64,
    pub distance_m: f64,
    pub time_s: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
}

/// Speed distribution over [`SPEED_LADDER_KMH`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedHistogram {
    buckets: Vec<SpeedBucket>,
}

impl Default for SpeedHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedHistogram {
    pub fn new() -> Self {
        let buckets = SPEED_LADDER_KMH
            .iter()
            .map(|kmh| SpeedBucket {
                lower_bound_mps: kmh * KMH_TO_MPS,
                ..Default::default()
            })
            .collect();
        Self { buckets }
    }

    /// Index of the highest bucket whose lower bound is at or below `speed_mps`.
    pub fn classify(&self, speed_mps: f64) -> usize {
        self.buckets
            .iter()
            .rposition(|bucket| bucket.lower_bound_mps <= speed_mps)
            .unwrap_or(0)
    }

    pub fn accumulate(&mut self, index: usize, distance_m: f64, time_s: f64, elevation_m: f64) {
        let bucket = &mut self.buckets[index];
        bucket.distance_m += distance_m;
        bucket.time_s += time_s;
        if elevation_m > 0.0 {
            bucket.elevation_gain_m += elevation_m;
        } else {
            bucket.elevation_loss_m -= elevation_m;
        }
    }

    /// Classify a segment by its average speed and add it to that bucket.
    pub fn record(&mut self, segment: &Segment) -> usize {
        let index = self.classify(segment.average_speed());
        self.accumulate(
            index,
            segment.distance_m,
            segment.time_s,
            segment.elevation_m,
        );
        index
    }

    pub fn buckets(&self) -> &[SpeedBucket] {
        &self.buckets
    }

    /// `"6-7"` style label; the open-ended last bucket reads `"12+"`.
    pub fn range_label(index: usize) -> String {
        match SPEED_LADDER_KMH.get(index + 1) {
            Some(upper) => format!("{:.0}-{:.0}", SPEED_LADDER_KMH[index], upper),
            None => format!("{:.0}+", SPEED_LADDER_KMH[index]),
        }
    }
}
