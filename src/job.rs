//! Conversion jobs
//!
//! One job converts one input file: decode, transform per options, serialize.
//! Jobs run inside an isolation boundary: a worker thread with panic
//! containment and a wall-clock timeout. Any failure mode is converted into a
//! typed outcome; nothing escapes to abort sibling jobs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decoder::WavDecoder;
use crate::error::ConvertError;
use crate::serializer::{SeriesContext, SeriesMetadata, SeriesWriter};
use crate::transform::SignalTransformer;

/// Default per-job wall-clock bound
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Transform switches for one conversion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Normalize amplitude to [-1, 1]
    pub normalize: bool,
    /// Mix all channels to mono (applied after normalization)
    pub mono: bool,
}

/// One unit of work: a single input file and where its artifacts go
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: ConvertOptions,
}

/// Terminal state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Skipped,
    Failed,
    TimedOut,
}

impl JobStatus {
    /// Skipped jobs count as successful for reporting purposes
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Skipped)
    }
}

/// The single outcome recorded for a job
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub status: JobStatus,
    pub message: String,
}

impl ConversionOutcome {
    pub fn skipped() -> Self {
        Self {
            status: JobStatus::Skipped,
            message: "Skipped (already exists)".to_string(),
        }
    }

    pub fn dry_run() -> Self {
        Self {
            status: JobStatus::Success,
            message: "Would process".to_string(),
        }
    }
}

impl ConversionJob {
    pub fn new(input_path: PathBuf, output_path: PathBuf, options: ConvertOptions) -> Self {
        Self {
            input_path,
            output_path,
            options,
        }
    }

    /// Run the decode → transform → serialize sequence in the calling thread
    pub fn execute(&self) -> Result<SeriesMetadata, ConvertError> {
        debug!(input = %self.input_path.display(), "decoding");
        let mut stream = WavDecoder::decode_file(&self.input_path)?;

        if self.options.normalize {
            stream = SignalTransformer::normalize(stream);
        }
        if self.options.mono {
            stream = SignalTransformer::mix_to_mono(stream);
        }

        let ctx = SeriesContext {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            normalized: self.options.normalize,
            mixed_to_mono: self.options.mono,
        };
        SeriesWriter::write(&stream, &ctx)
    }

    /// Run `execute` on a worker thread under a wall-clock bound.
    ///
    /// On timeout the worker is abandoned, not killed; its partial output is
    /// left in place and must be treated as untrustworthy downstream.
    pub fn run_with_timeout(&self, timeout: Duration) -> ConversionOutcome {
        let (tx, rx) = mpsc::channel();
        let job = self.clone();

        thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| job.execute()));
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(Ok(_meta))) => ConversionOutcome {
                status: JobStatus::Success,
                message: "Success".to_string(),
            },
            Ok(Ok(Err(e))) => ConversionOutcome {
                status: JobStatus::Failed,
                message: format!("Error: {e}"),
            },
            Ok(Err(_panic)) => ConversionOutcome {
                status: JobStatus::Failed,
                message: "Error: conversion panicked".to_string(),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => ConversionOutcome {
                status: JobStatus::TimedOut,
                message: ConvertError::Timeout(timeout.as_secs()).to_string(),
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => ConversionOutcome {
                status: JobStatus::Failed,
                message: "Error: worker exited without a result".to_string(),
            },
        }
    }
}
