//! Signal transforms
//!
//! This module normalizes sample amplitude to [-1, 1] and mixes multi-channel
//! streams down to mono. Normalization is applied before mixing: the integer
//! denominator comes from the declared sample width, and an averaging mix
//! would discard that width information.
//!
//! Both operations are pure and cannot fail on a well-formed stream.

use crate::types::{AudioStream, SampleMatrix};

/// Amplitude and channel transforms over decoded streams
pub struct SignalTransformer;

impl SignalTransformer {
    /// Normalize amplitude to the [-1, 1] float range.
    ///
    /// Integer samples are divided by the width's full-scale denominator, a
    /// fixed mapping independent of the recorded amplitude: a silent file and
    /// a loud file normalize identically at the sample level. Samples that
    /// are already float are assumed near unit scale and clamped.
    pub fn normalize(stream: AudioStream) -> AudioStream {
        let AudioStream {
            sample_rate_hz,
            width,
            samples,
        } = stream;

        let samples = match samples {
            SampleMatrix::Int(cols) => {
                let denom = width.full_scale();
                SampleMatrix::Float(
                    cols.into_iter()
                        .map(|col| col.into_iter().map(|v| (v as f64 / denom) as f32).collect())
                        .collect(),
                )
            }
            SampleMatrix::Float(cols) => SampleMatrix::Float(
                cols.into_iter()
                    .map(|col| col.into_iter().map(|v| v.clamp(-1.0, 1.0)).collect())
                    .collect(),
            ),
        };

        AudioStream {
            sample_rate_hz,
            width,
            samples,
        }
    }

    /// Mix all channels to one by per-frame arithmetic mean.
    ///
    /// A single-channel stream is returned unchanged. A multi-channel mix
    /// always yields float samples.
    pub fn mix_to_mono(stream: AudioStream) -> AudioStream {
        if stream.channel_count() <= 1 {
            return stream;
        }

        let frames = stream.frame_count();
        let channels = stream.channel_count() as f64;

        let mono: Vec<f32> = match &stream.samples {
            SampleMatrix::Int(cols) => (0..frames)
                .map(|i| {
                    let sum: f64 = cols.iter().map(|col| col[i] as f64).sum();
                    (sum / channels) as f32
                })
                .collect(),
            SampleMatrix::Float(cols) => (0..frames)
                .map(|i| {
                    let sum: f64 = cols.iter().map(|col| col[i] as f64).sum();
                    (sum / channels) as f32
                })
                .collect(),
        };

        AudioStream {
            samples: SampleMatrix::Float(vec![mono]),
            ..stream
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleWidth;

    fn int_stream(width: SampleWidth, cols: Vec<Vec<i32>>) -> AudioStream {
        AudioStream {
            sample_rate_hz: 1000,
            width,
            samples: SampleMatrix::Int(cols),
        }
    }

    fn float_col(stream: &AudioStream, idx: usize) -> &[f32] {
        match &stream.samples {
            SampleMatrix::Float(cols) => &cols[idx],
            SampleMatrix::Int(_) => panic!("expected float samples"),
        }
    }

    #[test]
    fn test_normalize_zero_is_exact_for_all_widths() {
        for width in [SampleWidth::Int8, SampleWidth::Int16, SampleWidth::Int32] {
            let normalized = SignalTransformer::normalize(int_stream(width, vec![vec![0; 64]]));
            assert!(float_col(&normalized, 0).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_normalize_full_scale_asymmetry() {
        let stream = int_stream(SampleWidth::Int16, vec![vec![i16::MIN as i32, i16::MAX as i32]]);
        let normalized = SignalTransformer::normalize(stream);
        let col = float_col(&normalized, 0);

        // The most negative code hits -1.0 exactly; the most positive lands
        // just under +1.0 (32767/32768).
        assert_eq!(col[0], -1.0);
        assert!(col[1] < 1.0 && col[1] > 0.9999);
    }

    #[test]
    fn test_normalize_never_exceeds_unit_magnitude() {
        let extremes = vec![vec![
            i32::from(i8::MIN),
            i32::from(i8::MAX),
            0,
            -1,
            1,
            100,
            -100,
        ]];
        let normalized = SignalTransformer::normalize(int_stream(SampleWidth::Int8, extremes));
        assert!(float_col(&normalized, 0).iter().all(|&v| v.abs() <= 1.0));
    }

    #[test]
    fn test_normalize_clamps_out_of_range_floats() {
        let stream = AudioStream {
            sample_rate_hz: 100,
            width: SampleWidth::Int32,
            samples: SampleMatrix::Float(vec![vec![1.5, -2.0, 0.25]]),
        };
        let normalized = SignalTransformer::normalize(stream);
        assert_eq!(float_col(&normalized, 0), &[1.0, -1.0, 0.25]);
    }

    #[test]
    fn test_mix_constant_channels_preserves_value() {
        let stream = int_stream(SampleWidth::Int16, vec![vec![7; 5], vec![7; 5], vec![7; 5]]);
        let mono = SignalTransformer::mix_to_mono(stream);

        assert_eq!(mono.channel_count(), 1);
        assert!(float_col(&mono, 0).iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_mix_averages_per_frame() {
        let stream = int_stream(SampleWidth::Int16, vec![vec![10, -10], vec![20, 10]]);
        let mono = SignalTransformer::mix_to_mono(stream);
        assert_eq!(float_col(&mono, 0), &[15.0, 0.0]);
    }

    #[test]
    fn test_mix_single_channel_is_identity() {
        let stream = int_stream(SampleWidth::Int16, vec![vec![1, 2, 3]]);
        let mixed = SignalTransformer::mix_to_mono(stream.clone());
        assert_eq!(mixed, stream);
    }

    #[test]
    fn test_normalize_then_mix_stays_in_range() {
        let stream = int_stream(
            SampleWidth::Int16,
            vec![vec![i16::MAX as i32; 4], vec![i16::MIN as i32; 4]],
        );
        let out = SignalTransformer::mix_to_mono(SignalTransformer::normalize(stream));
        assert!(float_col(&out, 0).iter().all(|&v| v.abs() <= 1.0));
    }
}
