//! Series serialization
//!
//! A converted recording is persisted as a sidecar pair: a tabular CSV whose
//! first column is elapsed seconds, and a `.meta.json` descriptor recording
//! provenance and the transforms that were actually applied. Failure to write
//! either artifact fails the whole job; partial output is not success.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::types::{AudioStream, SampleMatrix};

/// Provenance and transform flags for one conversion
#[derive(Debug, Clone)]
pub struct SeriesContext {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub normalized: bool,
    pub mixed_to_mono: bool,
}

/// Descriptor sidecar written next to the CSV artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub samplerate_hz: u32,
    pub samples: usize,
    pub channels: usize,
    pub duration_s: f64,
    pub dtype: String,
    pub normalized: bool,
    pub mixed_to_mono: bool,
}

/// Writer for the CSV + descriptor sidecar pair
pub struct SeriesWriter;

impl SeriesWriter {
    /// Write both artifacts in sequence and return the descriptor
    pub fn write(stream: &AudioStream, ctx: &SeriesContext) -> Result<SeriesMetadata, ConvertError> {
        write_csv(stream, &ctx.output_path)?;

        let meta = SeriesMetadata {
            input_file: absolute_path(&ctx.input_path)?,
            output_file: absolute_path(&ctx.output_path)?,
            samplerate_hz: stream.sample_rate_hz,
            samples: stream.frame_count(),
            channels: stream.channel_count(),
            // Derived from the sample count, never from wall clock
            duration_s: stream.duration_s(),
            dtype: stream.dtype_name().to_string(),
            normalized: ctx.normalized,
            mixed_to_mono: ctx.mixed_to_mono,
        };

        let meta_path = metadata_path(&ctx.output_path);
        let json = serde_json::to_string_pretty(&meta)?;
        std::fs::write(&meta_path, json).map_err(|e| {
            ConvertError::Serialization(format!("cannot write {}: {e}", meta_path.display()))
        })?;

        Ok(meta)
    }
}

/// Descriptor path for a given CSV path (`foo.csv` -> `foo.meta.json`)
pub fn metadata_path(output_path: &Path) -> PathBuf {
    output_path.with_extension("meta.json")
}

fn write_csv(stream: &AudioStream, path: &Path) -> Result<(), ConvertError> {
    let file = File::create(path).map_err(|e| {
        ConvertError::Serialization(format!("cannot create {}: {e}", path.display()))
    })?;
    let mut out = BufWriter::new(file);

    let to_io = |e: std::io::Error| {
        ConvertError::Serialization(format!("cannot write {}: {e}", path.display()))
    };

    let channels = stream.channel_count();
    let mut header = String::from("Time_s");
    for ch in 1..=channels {
        header.push_str(&format!(",Ch{ch}"));
    }
    writeln!(out, "{header}").map_err(to_io)?;

    let rate = stream.sample_rate_hz as f64;
    for frame in 0..stream.frame_count() {
        let mut row = format_sig7(frame as f64 / rate);
        match &stream.samples {
            SampleMatrix::Int(cols) => {
                for col in cols {
                    row.push(',');
                    row.push_str(&col[frame].to_string());
                }
            }
            SampleMatrix::Float(cols) => {
                for col in cols {
                    row.push(',');
                    row.push_str(&format_sig7(col[frame] as f64));
                }
            }
        }
        writeln!(out, "{row}").map_err(to_io)?;
    }

    out.flush().map_err(to_io)
}

fn absolute_path(path: &Path) -> Result<PathBuf, ConvertError> {
    std::path::absolute(path).map_err(|e| {
        ConvertError::Serialization(format!("cannot resolve {}: {e}", path.display()))
    })
}

/// Format with ~7 significant digits, in the spirit of C's `%.7g`: fixed
/// notation with trailing zeros trimmed, scientific for very small or very
/// large magnitudes.
pub(crate) fn format_sig7(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= 7 {
        let formatted = format!("{value:.6e}");
        trim_scientific(&formatted)
    } else {
        let decimals = (6 - exponent).max(0) as usize;
        let formatted = format!("{value:.decimals$}");
        trim_fixed(&formatted)
    }
}

fn trim_fixed(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn trim_scientific(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exponent)) => format!("{}e{exponent}", trim_fixed(mantissa)),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleWidth;
    use std::fs;

    fn ctx(dir: &Path, name: &str) -> SeriesContext {
        SeriesContext {
            input_path: dir.join("input.wav"),
            output_path: dir.join(name),
            normalized: true,
            mixed_to_mono: false,
        }
    }

    fn int_stream(rate: u32, cols: Vec<Vec<i32>>) -> AudioStream {
        AudioStream {
            sample_rate_hz: rate,
            width: SampleWidth::Int16,
            samples: SampleMatrix::Int(cols),
        }
    }

    #[test]
    fn test_csv_layout_two_channels() {
        let dir = tempfile::tempdir().unwrap();
        let stream = int_stream(4, vec![vec![1, 2], vec![-1, -2]]);
        let ctx = ctx(dir.path(), "out.csv");
        fs::write(&ctx.input_path, b"stub").unwrap();

        SeriesWriter::write(&stream, &ctx).unwrap();

        let csv = fs::read_to_string(&ctx.output_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Time_s,Ch1,Ch2");
        assert_eq!(lines[1], "0,1,-1");
        assert_eq!(lines[2], "0.25,2,-2");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_metadata_fields() {
        let dir = tempfile::tempdir().unwrap();
        let stream = int_stream(8000, vec![vec![0; 4000]]);
        let ctx = ctx(dir.path(), "out.csv");
        fs::write(&ctx.input_path, b"stub").unwrap();

        let meta = SeriesWriter::write(&stream, &ctx).unwrap();
        assert_eq!(meta.samplerate_hz, 8000);
        assert_eq!(meta.samples, 4000);
        assert_eq!(meta.channels, 1);
        assert_eq!(meta.duration_s, 0.5);
        assert_eq!(meta.dtype, "int16");
        assert!(meta.normalized);
        assert!(!meta.mixed_to_mono);
        assert!(meta.input_file.is_absolute());
        assert!(meta.output_file.is_absolute());

        // Sidecar round-trips through serde
        let raw = fs::read_to_string(dir.path().join("out.meta.json")).unwrap();
        let parsed: SeriesMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.samples, 4000);
        assert_eq!(parsed.duration_s, 0.5);
    }

    #[test]
    fn test_write_failure_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let stream = int_stream(4, vec![vec![1]]);
        let ctx = SeriesContext {
            input_path: dir.path().join("input.wav"),
            output_path: dir.path().join("no_such_dir").join("out.csv"),
            normalized: false,
            mixed_to_mono: false,
        };

        let err = SeriesWriter::write(&stream, &ctx).unwrap_err();
        assert!(matches!(err, ConvertError::Serialization(_)));
    }

    #[test]
    fn test_metadata_path_suffix() {
        assert_eq!(
            metadata_path(Path::new("/tmp/a/rec.csv")),
            Path::new("/tmp/a/rec.meta.json")
        );
    }

    #[test]
    fn test_format_sig7_fixed() {
        assert_eq!(format_sig7(0.0), "0");
        assert_eq!(format_sig7(1.0), "1");
        assert_eq!(format_sig7(0.25), "0.25");
        assert_eq!(format_sig7(0.000125), "0.000125");
        assert_eq!(format_sig7(12345.0), "12345");
        assert_eq!(format_sig7(-0.5), "-0.5");
        // 7 significant digits, not 7 decimals
        assert_eq!(format_sig7(1.0 / 3.0), "0.3333333");
    }

    #[test]
    fn test_format_sig7_scientific() {
        assert_eq!(format_sig7(0.00001), "1e-5");
        assert_eq!(format_sig7(3.0517578125e-5), "3.051758e-5");
        assert_eq!(format_sig7(20000000.0), "2e7");
    }
}
