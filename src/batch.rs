//! Batch orchestration
//!
//! The orchestrator discovers work across a subject/file hierarchy, applies
//! resume and dry-run policy, executes jobs strictly sequentially, and
//! aggregates per-job outcomes into a persisted report.
//!
//! Discovery-time problems (missing root, no subjects, empty filter match)
//! abort the run before any job executes. Individual job failures never do;
//! they are visible only in the report.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::job::{ConversionJob, ConversionOutcome, ConvertOptions, JobStatus};

/// Name of the report artifact written into the output root
pub const REPORT_FILENAME: &str = "batch_conversion_results.json";

/// Subject container directories are named `<subjectId>hexoskin`
pub const SUBJECT_DIR_SUFFIX: &str = "hexoskin";

/// Immutable configuration for one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Subject identifiers to process; `None` processes all
    pub subjects: Option<BTreeSet<String>>,
    pub normalize: bool,
    pub mono: bool,
    pub dry_run: bool,
    pub resume: bool,
    pub job_timeout_secs: u64,
}

impl BatchOptions {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
            subjects: None,
            normalize: false,
            mono: false,
            dry_run: false,
            resume: false,
            job_timeout_secs: crate::job::DEFAULT_JOB_TIMEOUT_SECS,
        }
    }

    fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            normalize: self.normalize,
            mono: self.mono,
        }
    }
}

/// One subject's discovered inputs, in stable sorted order
#[derive(Debug, Clone)]
pub struct SubjectWork {
    pub subject_id: String,
    pub source_dir: PathBuf,
    pub inputs: Vec<PathBuf>,
}

/// Recorded outcome for one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub input_file: PathBuf,
    pub status: JobStatus,
    pub success: bool,
    pub message: String,
}

/// Success/failure counts
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// All outcomes for one subject
#[derive(Debug, Clone, Serialize)]
pub struct SubjectResult {
    pub subject_id: String,
    pub source_dir: PathBuf,
    pub input_files: Vec<PathBuf>,
    pub results: Vec<FileResult>,
    pub summary: Summary,
}

/// The persisted record of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub args: BatchOptions,
    pub processing_time_seconds: f64,
    pub results: Vec<SubjectResult>,
}

impl BatchReport {
    /// Batch-wide counts across all subjects
    pub fn totals(&self) -> Summary {
        let mut totals = Summary::default();
        for subject in &self.results {
            totals.total += subject.summary.total;
            totals.success += subject.summary.success;
            totals.failed += subject.summary.failed;
        }
        totals
    }

    pub fn save(&self, path: &Path) -> Result<(), ConvertError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            ConvertError::Serialization(format!("cannot write {}: {e}", path.display()))
        })
    }
}

/// Sequential executor over discovered subject work
pub struct BatchOrchestrator {
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Enumerate subject containers and their input files.
    ///
    /// Subjects and files come back lexicographically sorted so repeated
    /// runs produce identical report ordering.
    pub fn discover(&self) -> Result<Vec<SubjectWork>, ConvertError> {
        let input_dir = &self.options.input_dir;
        if !input_dir.is_dir() {
            return Err(ConvertError::MissingInput(format!(
                "input directory not found: {}",
                input_dir.display()
            )));
        }

        let mut subjects = Vec::new();
        for entry in fs::read_dir(input_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(SUBJECT_DIR_SUFFIX) {
                subjects.push((id.to_string(), path));
            }
        }
        subjects.sort_by(|a, b| a.1.cmp(&b.1));

        if subjects.is_empty() {
            return Err(ConvertError::MissingInput(format!(
                "no {SUBJECT_DIR_SUFFIX} directories found in {}",
                input_dir.display()
            )));
        }

        if let Some(filter) = &self.options.subjects {
            subjects.retain(|(id, _)| filter.contains(id));
            if subjects.is_empty() {
                let wanted: Vec<&str> = filter.iter().map(String::as_str).collect();
                return Err(ConvertError::MissingInput(format!(
                    "no subjects match filter: {}",
                    wanted.join(",")
                )));
            }
        }

        subjects
            .into_iter()
            .map(|(subject_id, source_dir)| {
                let inputs = list_input_files(&source_dir)?;
                Ok(SubjectWork {
                    subject_id,
                    source_dir,
                    inputs,
                })
            })
            .collect()
    }

    /// Discover and execute every job, then persist the report.
    ///
    /// Dry runs skip persistence along with every other filesystem write.
    pub fn run(&self) -> Result<BatchReport, ConvertError> {
        let work = self.discover()?;
        info!(subjects = work.len(), dry_run = self.options.dry_run, "starting batch run");

        let started = Instant::now();
        let mut results = Vec::with_capacity(work.len());
        for subject in &work {
            info!(
                subject = %subject.subject_id,
                files = subject.inputs.len(),
                "processing subject"
            );
            results.push(self.process_subject(subject));
        }

        let report = BatchReport {
            args: self.options.clone(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            results,
        };

        if !self.options.dry_run {
            fs::create_dir_all(&self.options.output_dir)?;
            report.save(&self.options.output_dir.join(REPORT_FILENAME))?;
        }

        let totals = report.totals();
        info!(
            total = totals.total,
            success = totals.success,
            failed = totals.failed,
            "batch complete"
        );
        Ok(report)
    }

    fn process_subject(&self, work: &SubjectWork) -> SubjectResult {
        let out_dir = self.subject_output_dir(&work.subject_id);

        // An unusable output directory fails this subject's jobs, not the run
        let dir_error: Option<String> = if self.options.dry_run {
            None
        } else {
            fs::create_dir_all(&out_dir)
                .err()
                .map(|e| format!("Error: cannot create {}: {e}", out_dir.display()))
        };

        let mut results = Vec::with_capacity(work.inputs.len());
        for input in &work.inputs {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output = out_dir.join(format!("{stem}.csv"));

            let outcome = if self.options.dry_run {
                ConversionOutcome::dry_run()
            } else if let Some(message) = &dir_error {
                ConversionOutcome {
                    status: JobStatus::Failed,
                    message: message.clone(),
                }
            } else if self.options.resume && output.exists() {
                ConversionOutcome::skipped()
            } else {
                let job = ConversionJob::new(input.clone(), output, self.options.convert_options());
                job.run_with_timeout(Duration::from_secs(self.options.job_timeout_secs))
            };

            debug!(
                input = %input.display(),
                status = ?outcome.status,
                "{}", outcome.message
            );
            results.push(FileResult {
                input_file: input.clone(),
                status: outcome.status,
                success: outcome.status.is_success(),
                message: outcome.message,
            });
        }

        let total = results.len();
        let success = results.iter().filter(|r| r.success).count();
        SubjectResult {
            subject_id: work.subject_id.clone(),
            source_dir: work.source_dir.clone(),
            input_files: work.inputs.clone(),
            results,
            summary: Summary {
                total,
                success,
                failed: total - success,
            },
        }
    }

    /// Subject ids are zero-padded to three characters on the output side
    fn subject_output_dir(&self, subject_id: &str) -> PathBuf {
        self.options
            .output_dir
            .join(format!("{subject_id:0>3}{SUBJECT_DIR_SUFFIX}"))
    }
}

fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_wav = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if path.is_file() && is_wav {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Build an input tree of `(subject_dir, file_names)` pairs
    fn setup_tree(root: &Path, subjects: &[(&str, &[&str])]) {
        for (dir, files) in subjects {
            let subject_dir = root.join(dir);
            fs::create_dir_all(&subject_dir).unwrap();
            for file in *files {
                write_wav(&subject_dir.join(file), 100);
            }
        }
    }

    fn options(input: &Path, output: &Path) -> BatchOptions {
        BatchOptions::new(input.to_path_buf(), output.to_path_buf())
    }

    #[test]
    fn test_discovery_sorted_and_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        setup_tree(
            &input,
            &[
                ("002hexoskin", &["b.wav", "a.wav"][..]),
                ("001hexoskin", &["x.wav"][..]),
            ],
        );
        fs::create_dir_all(input.join("notes")).unwrap(); // ignored

        let orchestrator = BatchOrchestrator::new(options(&input, &dir.path().join("out")));
        let work = orchestrator.discover().unwrap();

        assert_eq!(work.len(), 2);
        assert_eq!(work[0].subject_id, "001");
        assert_eq!(work[1].subject_id, "002");
        let names: Vec<_> = work[1]
            .inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = BatchOrchestrator::new(options(
            &dir.path().join("nowhere"),
            &dir.path().join("out"),
        ));
        let err = orchestrator.run().unwrap_err();
        assert!(matches!(err, ConvertError::MissingInput(_)));
    }

    #[test]
    fn test_no_subject_dirs_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        fs::create_dir_all(&input).unwrap();

        let orchestrator = BatchOrchestrator::new(options(&input, &dir.path().join("out")));
        let err = orchestrator.run().unwrap_err();
        assert!(err.to_string().contains("no hexoskin directories"));
    }

    #[test]
    fn test_empty_filter_match_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        setup_tree(&input, &[("001hexoskin", &["a.wav"][..])]);

        let mut opts = options(&input, &dir.path().join("out"));
        opts.subjects = Some(BTreeSet::from(["099".to_string()]));
        let err = BatchOrchestrator::new(opts).run().unwrap_err();
        assert!(err.to_string().contains("no subjects match"));
    }

    #[test]
    fn test_full_run_writes_artifacts_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        setup_tree(
            &input,
            &[
                ("001hexoskin", &["ecg.wav", "resp.wav"][..]),
                ("002hexoskin", &["ecg.wav"][..]),
            ],
        );

        let report = BatchOrchestrator::new(options(&input, &output)).run().unwrap();

        let totals = report.totals();
        assert_eq!(totals.total, 3);
        assert_eq!(totals.success, 3);
        assert_eq!(totals.failed, 0);

        assert!(output.join("001hexoskin").join("ecg.csv").exists());
        assert!(output.join("001hexoskin").join("ecg.meta.json").exists());
        assert!(output.join("002hexoskin").join("ecg.csv").exists());
        assert!(output.join(REPORT_FILENAME).exists());
    }

    #[test]
    fn test_partial_failure_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        setup_tree(
            &input,
            &[("001hexoskin", &["a.wav", "b.wav", "d.wav", "e.wav"][..])],
        );
        // One corrupt file among five
        fs::write(input.join("001hexoskin").join("c.wav"), b"not audio").unwrap();

        let report = BatchOrchestrator::new(options(&input, &output)).run().unwrap();

        let subject = &report.results[0];
        assert_eq!(subject.summary.total, 5);
        assert_eq!(subject.summary.success, 4);
        assert_eq!(subject.summary.failed, 1);

        let failed: Vec<_> = subject
            .results
            .iter()
            .filter(|r| r.status == JobStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].input_file.ends_with("c.wav"));
        assert!(failed[0].message.starts_with("Error:"));
    }

    #[test]
    fn test_resume_skips_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        setup_tree(&input, &[("001hexoskin", &["a.wav", "b.wav"][..])]);

        let mut opts = options(&input, &output);
        opts.resume = true;

        let first = BatchOrchestrator::new(opts.clone()).run().unwrap();
        assert!(first.results[0]
            .results
            .iter()
            .all(|r| r.status == JobStatus::Success));

        let second = BatchOrchestrator::new(opts).run().unwrap();
        assert!(second.results[0]
            .results
            .iter()
            .all(|r| r.status == JobStatus::Skipped));
        assert_eq!(second.totals().success, 2);
        assert!(output.join("001hexoskin").join("a.csv").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        setup_tree(&input, &[("001hexoskin", &["a.wav", "b.wav"][..])]);

        let mut opts = options(&input, &output);
        opts.dry_run = true;
        let report = BatchOrchestrator::new(opts).run().unwrap();

        assert_eq!(report.totals().total, 2);
        assert!(report.results[0]
            .results
            .iter()
            .all(|r| r.message == "Would process"));
        assert!(!output.exists());
    }

    #[test]
    fn test_subject_with_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        fs::create_dir_all(input.join("007hexoskin")).unwrap();

        let report = BatchOrchestrator::new(options(&input, &output)).run().unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.totals().total, 0);
    }

    #[test]
    fn test_report_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("out");
        setup_tree(&input, &[("001hexoskin", &["a.wav"][..])]);

        let mut opts = options(&input, &output);
        opts.normalize = true;
        BatchOrchestrator::new(opts).run().unwrap();

        let raw = fs::read_to_string(output.join(REPORT_FILENAME)).unwrap();
        let report: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(report["args"]["normalize"], true);
        assert!(report["processing_time_seconds"].is_f64());
        assert_eq!(report["results"][0]["subject_id"], "001");
        assert_eq!(report["results"][0]["summary"]["total"], 1);
        assert_eq!(report["results"][0]["results"][0]["success"], true);
        assert_eq!(report["results"][0]["results"][0]["message"], "Success");
    }

    #[test]
    fn test_subject_output_dir_padding() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = BatchOrchestrator::new(options(
            &dir.path().join("raw"),
            &dir.path().join("out"),
        ));
        assert!(orchestrator
            .subject_output_dir("7")
            .ends_with("007hexoskin"));
        assert!(orchestrator
            .subject_output_dir("012")
            .ends_with("012hexoskin"));
    }
}
