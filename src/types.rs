//! Core types for the hexopipe pipeline
//!
//! This module defines the value types that flow through the conversion
//! stages: decoded sample matrices, normalized signals, and epoch series.

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// PCM sample width of a decoded recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleWidth {
    /// 8-bit unsigned PCM, re-biased to signed on decode
    Int8,
    /// 16-bit signed little-endian PCM
    Int16,
    /// 32-bit signed little-endian PCM (also carries 32-bit float data)
    Int32,
}

impl SampleWidth {
    /// Map a container-declared byte width onto a supported width
    pub fn from_bytes(bytes: u16) -> Result<Self, ConvertError> {
        match bytes {
            1 => Ok(SampleWidth::Int8),
            2 => Ok(SampleWidth::Int16),
            4 => Ok(SampleWidth::Int32),
            other => Err(ConvertError::UnsupportedFormat(other)),
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            SampleWidth::Int8 => 1,
            SampleWidth::Int16 => 2,
            SampleWidth::Int32 => 4,
        }
    }

    pub fn bits(&self) -> u16 {
        (self.bytes() * 8) as u16
    }

    /// Full-scale normalization denominator: max(|min|, max) of the signed
    /// range, which for two's complement is always 2^(bits-1). The most
    /// negative code maps to exactly -1.0, the most positive to just under
    /// +1.0.
    pub fn full_scale(&self) -> f64 {
        match self {
            SampleWidth::Int8 => 128.0,
            SampleWidth::Int16 => 32768.0,
            SampleWidth::Int32 => 2147483648.0,
        }
    }

    pub fn dtype_name(&self) -> &'static str {
        match self {
            SampleWidth::Int8 => "int8",
            SampleWidth::Int16 => "int16",
            SampleWidth::Int32 => "int32",
        }
    }
}

/// Per-channel sample columns, de-interleaved
#[derive(Debug, Clone, PartialEq)]
pub enum SampleMatrix {
    /// Integer PCM samples widened to i32
    Int(Vec<Vec<i32>>),
    /// Floating-point samples (decoded float data, or post-transform output)
    Float(Vec<Vec<f32>>),
}

impl SampleMatrix {
    pub fn channel_count(&self) -> usize {
        match self {
            SampleMatrix::Int(cols) => cols.len(),
            SampleMatrix::Float(cols) => cols.len(),
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            SampleMatrix::Int(cols) => cols.first().map_or(0, Vec::len),
            SampleMatrix::Float(cols) => cols.first().map_or(0, Vec::len),
        }
    }
}

/// A decoded recording: format metadata plus one sample column per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    /// Frames per second
    pub sample_rate_hz: u32,
    /// Declared sample width of the source container
    pub width: SampleWidth,
    /// De-interleaved sample data
    pub samples: SampleMatrix,
}

impl AudioStream {
    pub fn channel_count(&self) -> usize {
        self.samples.channel_count()
    }

    pub fn frame_count(&self) -> usize {
        self.samples.frame_count()
    }

    /// Recording duration derived from the frame count, not wall clock
    pub fn duration_s(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate_hz as f64
    }

    /// dtype label for the descriptor sidecar ("int16", "float32", ...)
    pub fn dtype_name(&self) -> &'static str {
        match self.samples {
            SampleMatrix::Int(_) => self.width.dtype_name(),
            SampleMatrix::Float(_) => "float32",
        }
    }
}

/// Triaxial magnitude sums, one per fixed-duration epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSeries {
    /// Summed vector magnitude per epoch, trailing partial epoch included
    pub counts: Vec<f64>,
    /// Epoch length in seconds
    pub epoch_seconds: f64,
}

impl EpochSeries {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
