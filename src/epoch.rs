//! Epoch aggregation
//!
//! This module converts a triaxial sample stream into activity counts: the
//! per-sample vector magnitude sqrt(x² + y² + z²), summed over fixed
//! 15-second buckets aligned to the first sample. A trailing partial bucket
//! is still emitted so that every sample lands in some epoch.

use crate::error::ConvertError;
use crate::triaxial::TriaxialSeries;
use crate::types::EpochSeries;

/// Standard epoch length for triaxial activity counts
pub const DEFAULT_EPOCH_SECONDS: f64 = 15.0;

/// Aggregator from raw triaxial samples to per-epoch counts
pub struct EpochAggregator;

impl EpochAggregator {
    /// Sum vector magnitudes into epochs of `epoch_seconds` at the given rate
    pub fn aggregate(
        series: &TriaxialSeries,
        sample_rate_hz: u32,
        epoch_seconds: f64,
    ) -> Result<EpochSeries, ConvertError> {
        if series.x.len() != series.y.len() || series.x.len() != series.z.len() {
            return Err(ConvertError::Decode(format!(
                "axis length mismatch: x={} y={} z={}",
                series.x.len(),
                series.y.len(),
                series.z.len()
            )));
        }

        let samples_per_epoch = (sample_rate_hz as f64 * epoch_seconds).round() as usize;
        if samples_per_epoch == 0 {
            return Err(ConvertError::Decode(format!(
                "epoch of {epoch_seconds}s holds no samples at {sample_rate_hz} Hz"
            )));
        }

        let magnitudes: Vec<f64> = series
            .x
            .iter()
            .zip(&series.y)
            .zip(&series.z)
            .map(|((&x, &y), &z)| (x * x + y * y + z * z).sqrt())
            .collect();

        let counts = magnitudes
            .chunks(samples_per_epoch)
            .map(|bucket| bucket.iter().sum())
            .collect();

        Ok(EpochSeries {
            counts,
            epoch_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> TriaxialSeries {
        TriaxialSeries { x, y, z }
    }

    #[test]
    fn test_zero_stream_one_epoch() {
        // Exactly one epoch of silence at 4 Hz: 60 samples
        let n = 60;
        let s = series(vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        let epochs = EpochAggregator::aggregate(&s, 4, DEFAULT_EPOCH_SECONDS).unwrap();

        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs.counts[0], 0.0);
    }

    #[test]
    fn test_partial_trailing_epoch_is_emitted() {
        // 1.5 epochs at 4 Hz: 90 samples -> 2 buckets of 60 and 30
        let n = 90;
        let s = series(vec![3.0; n], vec![4.0; n], vec![0.0; n]);
        let epochs = EpochAggregator::aggregate(&s, 4, DEFAULT_EPOCH_SECONDS).unwrap();

        assert_eq!(epochs.len(), 2);
        // |(3,4,0)| = 5 per sample
        assert!((epochs.counts[0] - 60.0 * 5.0).abs() < 1e-9);
        assert!((epochs.counts[1] - 30.0 * 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_vector_magnitude() {
        let s = series(vec![1.0], vec![2.0], vec![2.0]);
        let epochs = EpochAggregator::aggregate(&s, 1, DEFAULT_EPOCH_SECONDS).unwrap();
        assert!((epochs.counts[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_axis_length_mismatch() {
        let s = series(vec![0.0; 3], vec![0.0; 2], vec![0.0; 3]);
        let err = EpochAggregator::aggregate(&s, 4, DEFAULT_EPOCH_SECONDS).unwrap_err();
        assert!(err.to_string().contains("axis length mismatch"));
    }

    #[test]
    fn test_empty_series_yields_no_epochs() {
        let s = series(vec![], vec![], vec![]);
        let epochs = EpochAggregator::aggregate(&s, 64, DEFAULT_EPOCH_SECONDS).unwrap();
        assert!(epochs.is_empty());
    }
}
