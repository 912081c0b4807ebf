// ── Running statistics ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use obdstream_api::Measurement;

/// Running aggregate for one command: latest value, extrema, sample count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    pub latest: Measurement,
    pub min: f64,
    pub max: f64,
    pub sample_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl SampleStats {
    /// Seed from the first sample: min = max = latest, count = 1.
    pub fn first(sample: Measurement) -> Self {
        Self {
            latest: sample,
            min: sample.value,
            max: sample.value,
            sample_count: 1,
            updated_at: Utc::now(),
        }
    }

    /// Fold in a new sample.
    pub fn record(&mut self, sample: Measurement) {
        self.latest = sample;
        self.min = self.min.min(sample.value);
        self.max = self.max.max(sample.value);
        self.sample_count = self.sample_count.saturating_add(1);
        self.updated_at = Utc::now();
    }

    /// Restart the aggregate from the latest value (unit-system change).
    pub fn reset(&mut self) {
        self.min = self.latest.value;
        self.max = self.latest.value;
        self.sample_count = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obdstream_api::Unit;

    fn rpm(value: f64) -> Measurement {
        Measurement::new(value, Unit::Rpm)
    }

    #[test]
    fn folding_tracks_extrema_latest_and_count() {
        let samples = [1800.0, 950.0, 3100.0, 2200.0];
        let mut stats = SampleStats::first(rpm(samples[0]));
        for v in &samples[1..] {
            stats.record(rpm(*v));
        }

        assert!((stats.min - 950.0).abs() < f64::EPSILON);
        assert!((stats.max - 3100.0).abs() < f64::EPSILON);
        assert!((stats.latest.value - 2200.0).abs() < f64::EPSILON);
        assert_eq!(stats.sample_count, 4);
    }

    #[test]
    fn reset_collapses_to_latest() {
        let mut stats = SampleStats::first(rpm(900.0));
        stats.record(rpm(4000.0));
        stats.record(rpm(1500.0));

        stats.reset();
        assert_eq!(stats.sample_count, 1);
        assert!((stats.min - 1500.0).abs() < f64::EPSILON);
        assert!((stats.max - 1500.0).abs() < f64::EPSILON);
        assert_eq!(stats.latest, rpm(1500.0));
    }

    #[test]
    fn counter_saturates_instead_of_wrapping() {
        let mut stats = SampleStats::first(rpm(1.0));
        stats.sample_count = u64::MAX;
        stats.record(rpm(2.0));
        assert_eq!(stats.sample_count, u64::MAX);
    }
}
