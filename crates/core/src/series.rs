//! Memory samples and the series collected for one tracked call.

use serde::{Deserialize, Serialize};

/// Bytes per megabyte used for footprint conversion.
pub const BYTES_PER_MB: f64 = 1_048_576.0;

/// One `(timestamp, footprint)` observation.
///
/// Serialized as a two-element array `[timestamp, footprint_mb]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Sample {
    /// Seconds since tracking started
    timestamp: f64,

    /// Resident memory in megabytes
    footprint_mb: f64,
}

impl Sample {
    /// Create a new sample
    #[must_use]
    pub const fn new(timestamp: f64, footprint_mb: f64) -> Self {
        Self {
            timestamp,
            footprint_mb,
        }
    }

    /// Create a sample from a raw resident byte count
    #[must_use]
    pub fn from_bytes(timestamp: f64, resident_bytes: u64) -> Self {
        Self::new(timestamp, resident_bytes as f64 / BYTES_PER_MB)
    }

    /// Seconds since tracking started
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Footprint in megabytes
    #[must_use]
    pub const fn footprint_mb(&self) -> f64 {
        self.footprint_mb
    }
}

impl From<(f64, f64)> for Sample {
    fn from((timestamp, footprint_mb): (f64, f64)) -> Self {
        Self::new(timestamp, footprint_mb)
    }
}

impl From<Sample> for (f64, f64) {
    fn from(sample: Sample) -> Self {
        (sample.timestamp, sample.footprint_mb)
    }
}

/// Ordered samples of one tracked call.
///
/// Serialized as an array of `[timestamp, footprint_mb]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Create an empty series
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in recording order
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterate over samples in recording order
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Timestamps in recording order
    #[must_use]
    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::timestamp).collect()
    }

    /// Footprints in recording order
    #[must_use]
    pub fn footprints(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::footprint_mb).collect()
    }

    /// Timestamp of the last sample
    #[must_use]
    pub fn last_timestamp(&self) -> Option<f64> {
        self.samples.last().map(Sample::timestamp)
    }

    /// Highest footprint observed
    #[must_use]
    pub fn peak(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(Sample::footprint_mb)
            .reduce(f64::max)
    }

    /// Lowest footprint observed
    #[must_use]
    pub fn minimum(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(Sample::footprint_mb)
            .reduce(f64::min)
    }

    /// Mean footprint
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(Sample::footprint_mb).sum();
        Some(total / self.samples.len() as f64)
    }

    /// Footprint change against the previous sample; the first delta is 0.
    #[must_use]
    pub fn deltas(&self) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(
                self.samples
                    .windows(2)
                    .filter_map(|pair| match pair {
                        [prev, next] => Some(next.footprint_mb - prev.footprint_mb),
                        _ => None,
                    }),
            )
            .take(self.samples.len())
            .collect()
    }

    /// Summary statistics, `None` for an empty series
    #[must_use]
    pub fn summary(&self) -> Option<SeriesSummary> {
        Some(SeriesSummary {
            peak: self.peak()?,
            average: self.average()?,
            minimum: self.minimum()?,
            duration: self.last_timestamp()?,
            sample_count: self.samples.len(),
        })
    }

    /// Append a sample
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Consume the series, yielding its samples
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

impl From<Vec<Sample>> for Series {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Summary statistics over a non-empty series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Highest footprint (MB)
    pub peak: f64,
    /// Mean footprint (MB)
    pub average: f64,
    /// Lowest footprint (MB)
    pub minimum: f64,
    /// Last timestamp (s)
    pub duration: f64,
    /// Number of samples
    pub sample_count: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn series(points: &[(f64, f64)]) -> Series {
        points.iter().copied().map(Sample::from).collect()
    }

    #[test]
    fn test_sample_from_bytes() {
        let sample = Sample::from_bytes(1.5, 2 * 1_048_576);
        assert!((sample.footprint_mb() - 2.0).abs() < f64::EPSILON);
        assert!((sample.timestamp() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_statistics() {
        let s = series(&[(0.0, 23.1), (1.0, 130.5), (2.0, 130.7)]);
        let summary = s.summary().unwrap();

        assert!((summary.peak - 130.7).abs() < 1e-9);
        assert!((summary.minimum - 23.1).abs() < 1e-9);
        assert!((summary.average - (23.1 + 130.5 + 130.7) / 3.0).abs() < 1e-9);
        assert!((summary.duration - 2.0).abs() < 1e-9);
        assert_eq!(summary.sample_count, 3);
    }

    #[test]
    fn test_empty_series_has_no_summary() {
        let s = Series::new();
        assert!(s.summary().is_none());
        assert!(s.deltas().is_empty());
        assert!(s.last_timestamp().is_none());
    }

    #[test]
    fn test_deltas_start_at_zero() {
        let s = series(&[(0.0, 10.0), (0.5, 12.5), (1.0, 11.0)]);
        let deltas = s.deltas();

        assert_eq!(deltas.len(), 3);
        assert!((deltas[0]).abs() < f64::EPSILON);
        assert!((deltas[1] - 2.5).abs() < 1e-9);
        assert!((deltas[2] + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_serializes_as_pairs() {
        let s = series(&[(0.0, 1.5), (0.25, 2.0)]);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "[[0.0,1.5],[0.25,2.0]]");

        let back: Series = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_rejects_non_pair_json() {
        let result: std::result::Result<Series, _> = serde_json::from_str("[[0.0, 1.0, 2.0]]");
        assert!(result.is_err());
    }
}
