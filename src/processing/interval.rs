use serde::Serialize;

/// Distance, time and net elevation covered by a stretch of the track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Segment {
    pub distance_m: f64,
    pub time_s: f64,
    /// Signed: positive means the stretch ends higher than it started.
    pub elevation_m: f64,
}

impl Segment {
    /// Average speed in m/s. Infinite or NaN when no time elapsed.
    pub fn average_speed(&self) -> f64 {
        self.distance_m / self.time_s
    }

    /// Nothing was covered and no time passed.
    pub fn is_empty(&self) -> bool {
        self.distance_m == 0.0 && self.time_s == 0.0
    }
}

/// Chunks the delta stream into segments of at least `length_m` meters.
///
/// A chunk is closed on the first sample that brings it to the threshold, so it
/// overshoots by up to one sample's distance. Boundaries are not interpolated.
#[derive(Debug, Clone)]
pub struct IntervalAccumulator {
    length_m: f64,
    pending: Segment,
}

impl IntervalAccumulator {
    pub fn new(length_m: f64) -> Self {
        Self {
            length_m,
            pending: Segment::default(),
        }
    }

    pub fn add(&mut self, distance_m: f64, time_s: f64, elevation_m: f64) {
        self.pending.distance_m += distance_m;
        self.pending.time_s += time_s;
        self.pending.elevation_m += elevation_m;
    }

    /// Speed of the not-yet-flushed chunk (m/s).
    pub fn in_flight_speed(&self) -> f64 {
        self.pending.average_speed()
    }

    pub fn should_flush(&self, end_of_stream: bool) -> bool {
        end_of_stream || self.pending.distance_m >= self.length_m
    }

    /// Hand out the accumulated chunk and start a new one.
    pub fn flush(&mut self) -> Segment {
        std::mem::take(&mut self.pending)
    }
}
