//! Hexopipe CLI
//!
//! Commands:
//! - convert: Decode one recording into a CSV + descriptor sidecar pair
//! - batch: Convert every recording under a subject hierarchy
//! - energy: Estimate caloric expenditure from a triaxial accelerometer CSV

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hexopipe::batch::{BatchOptions, BatchOrchestrator, BatchReport, REPORT_FILENAME};
use hexopipe::energy::{EnergyEstimator, Gender, SubjectProfile};
use hexopipe::epoch::{EpochAggregator, DEFAULT_EPOCH_SECONDS};
use hexopipe::job::DEFAULT_JOB_TIMEOUT_SECS;
use hexopipe::serializer::{metadata_path, SeriesContext, SeriesWriter};
use hexopipe::triaxial::read_triaxial_csv;
use hexopipe::{ConvertError, SignalTransformer, WavDecoder, PIPELINE_VERSION};

/// Hexopipe - convert smart-shirt biosignal recordings into analyzable series
#[derive(Parser)]
#[command(name = "hexopipe")]
#[command(version = PIPELINE_VERSION)]
#[command(about = "Decode, normalize, and batch-convert biosignal recordings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single recording to CSV with a descriptor sidecar
    Convert {
        /// Input WAVE file
        input: PathBuf,

        /// Output CSV path (defaults to the input with a .csv extension)
        output: Option<PathBuf>,

        /// Normalize amplitude to the [-1, 1] range
        #[arg(long)]
        normalize: bool,

        /// Mix all channels to mono
        #[arg(long)]
        mono: bool,
    },

    /// Convert every recording under an input hierarchy of subject directories
    Batch {
        /// Directory containing <subjectId>hexoskin folders
        #[arg(long, default_value = "data/raw_smartshirt_data")]
        input_dir: PathBuf,

        /// Directory receiving converted output
        #[arg(long, default_value = "data/processed_smartshirt_data")]
        output_dir: PathBuf,

        /// Comma-separated subject ids to process (default: all)
        #[arg(long)]
        subjects: Option<String>,

        /// Normalize amplitude to the [-1, 1] range
        #[arg(long)]
        normalize: bool,

        /// Mix all channels to mono
        #[arg(long)]
        mono: bool,

        /// Report what would be processed without converting
        #[arg(long)]
        dry_run: bool,

        /// Skip files whose output already exists
        #[arg(long)]
        resume: bool,

        /// Wall-clock bound per file conversion
        #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT_SECS)]
        timeout_secs: u64,

        /// Show per-file processing detail
        #[arg(long)]
        verbose: bool,
    },

    /// Estimate caloric expenditure from a triaxial accelerometer CSV
    Energy {
        /// Input CSV with named axis columns
        input: PathBuf,

        /// X-axis column name
        #[arg(long)]
        x_col: String,

        /// Y-axis column name
        #[arg(long)]
        y_col: String,

        /// Z-axis column name
        #[arg(long)]
        z_col: String,

        /// Metadata rows to skip before the header
        #[arg(long, default_value_t = 0)]
        skip_rows: usize,

        /// Accelerometer sample rate
        #[arg(long, default_value_t = 64)]
        sample_rate_hz: u32,

        /// Subject age in years
        #[arg(long, value_parser = positive_f64)]
        age: f64,

        /// Subject height in cm
        #[arg(long, value_parser = positive_f64)]
        height_cm: f64,

        /// Subject weight in kg
        #[arg(long, value_parser = positive_f64)]
        weight_kg: f64,

        /// Subject gender (selects the regression coefficients)
        #[arg(long, value_enum)]
        gender: GenderArg,

        /// Emit the estimate as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GenderArg {
    Male,
    Female,
}

impl From<GenderArg> for Gender {
    fn from(arg: GenderArg) -> Self {
        match arg {
            GenderArg::Male => Gender::Male,
            GenderArg::Female => Gender::Female,
        }
    }
}

fn positive_f64(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err("must be a positive number".to_string())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, ConvertError> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            normalize,
            mono,
        } => cmd_convert(input, output, normalize, mono),

        Commands::Batch {
            input_dir,
            output_dir,
            subjects,
            normalize,
            mono,
            dry_run,
            resume,
            timeout_secs,
            verbose,
        } => {
            init_logging(verbose);
            let options = BatchOptions {
                input_dir,
                output_dir,
                subjects: parse_subject_filter(subjects.as_deref()),
                normalize,
                mono,
                dry_run,
                resume,
                job_timeout_secs: timeout_secs,
            };
            cmd_batch(options)
        }

        Commands::Energy {
            input,
            x_col,
            y_col,
            z_col,
            skip_rows,
            sample_rate_hz,
            age,
            height_cm,
            weight_kg,
            gender,
            json,
        } => {
            let profile = SubjectProfile {
                age_years: age,
                height_cm,
                weight_kg,
                gender: gender.into(),
            };
            cmd_energy(input, &x_col, &y_col, &z_col, skip_rows, sample_rate_hz, profile, json)
        }
    }
}

fn cmd_convert(
    input: PathBuf,
    output: Option<PathBuf>,
    normalize: bool,
    mono: bool,
) -> Result<ExitCode, ConvertError> {
    if !input.is_file() {
        return Err(ConvertError::MissingInput(format!(
            "file not found: {}",
            input.display()
        )));
    }

    println!("Reading: {}", input.display());
    let mut stream = WavDecoder::decode_file(&input)?;

    println!("Sample rate: {} Hz", stream.sample_rate_hz);
    println!("Samples: {}", stream.frame_count());
    println!("Channels: {}", stream.channel_count());
    println!("Duration: {:.2} seconds", stream.duration_s());
    println!("Data type: {}", stream.dtype_name());

    if normalize {
        println!("Normalizing amplitude...");
        stream = SignalTransformer::normalize(stream);
    }
    if mono {
        println!("Mixing to mono...");
        stream = SignalTransformer::mix_to_mono(stream);
    }

    let output = output.unwrap_or_else(|| input.with_extension("csv"));
    println!("Writing {} samples to {}...", stream.frame_count(), output.display());

    let ctx = SeriesContext {
        input_path: input,
        output_path: output.clone(),
        normalized: normalize,
        mixed_to_mono: mono,
    };
    SeriesWriter::write(&stream, &ctx)?;

    println!("Saved: {}", output.display());
    println!("Metadata: {}", metadata_path(&output).display());
    println!("Conversion completed successfully!");
    Ok(ExitCode::SUCCESS)
}

fn cmd_batch(options: BatchOptions) -> Result<ExitCode, ConvertError> {
    println!("Input directory: {}", options.input_dir.display());
    println!("Output directory: {}", options.output_dir.display());
    if options.dry_run {
        println!("DRY RUN MODE - no files will be converted");
    }

    let dry_run = options.dry_run;
    let report_path = options.output_dir.join(REPORT_FILENAME);

    // Discovery failures propagate and exit non-zero; job failures do not
    let report = BatchOrchestrator::new(options).run()?;

    print_summary(&report);
    println!(
        "Total processing time: {:.1} seconds",
        report.processing_time_seconds
    );
    if !dry_run {
        println!("Detailed results saved to: {}", report_path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &BatchReport) {
    let totals = report.totals();
    let rule = "=".repeat(60);

    println!();
    println!("{rule}");
    println!("BATCH PROCESSING SUMMARY");
    println!("{rule}");
    println!("Subjects processed: {}", report.results.len());
    println!("Total input files: {}", totals.total);
    println!("Successfully converted: {}", totals.success);
    println!("Failed conversions: {}", totals.failed);
    if totals.total > 0 {
        let rate = totals.success as f64 / totals.total as f64 * 100.0;
        println!("Success rate: {rate:.1}%");
    } else {
        println!("Success rate: N/A");
    }

    let failed: Vec<_> = report
        .results
        .iter()
        .flat_map(|subject| {
            subject
                .results
                .iter()
                .filter(|r| !r.success)
                .map(move |r| (subject.subject_id.as_str(), r))
        })
        .collect();

    if !failed.is_empty() {
        println!();
        println!("Failed files ({}):", failed.len());
        for (subject_id, result) in failed {
            let name = result
                .input_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {subject_id}: {name} - {}", result.message);
        }
    }

    println!("{rule}");
    println!("Completed: {}", Utc::now().to_rfc3339());
}

#[allow(clippy::too_many_arguments)]
fn cmd_energy(
    input: PathBuf,
    x_col: &str,
    y_col: &str,
    z_col: &str,
    skip_rows: usize,
    sample_rate_hz: u32,
    profile: SubjectProfile,
    json: bool,
) -> Result<ExitCode, ConvertError> {
    let file = File::open(&input).map_err(|_| {
        ConvertError::MissingInput(format!("file not found: {}", input.display()))
    })?;
    let series = read_triaxial_csv(BufReader::new(file), x_col, y_col, z_col, skip_rows)?;

    if series.is_empty() {
        return Err(ConvertError::Decode("no samples in input".to_string()));
    }

    let epochs = EpochAggregator::aggregate(&series, sample_rate_hz, DEFAULT_EPOCH_SECONDS)?;
    let hours = series.duration_hours(sample_rate_hz);
    let estimate = EnergyEstimator::estimate(&epochs, &profile, hours);

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        println!("Samples: {} ({} Hz, {:.2} hours)", series.len(), sample_rate_hz, hours);
        println!("Epochs: {} ({} s each)", estimate.epochs, DEFAULT_EPOCH_SECONDS);
        println!(
            "BMR: {:.1} kcal/day ({:.1} kcal over the recording)",
            estimate.bmr_kcal_per_day, estimate.bmr_kcal
        );
        println!("Activity expenditure: {:.1} kcal", estimate.activity_kcal);
        println!(
            "Total estimated caloric expenditure: {:.2} kcal",
            estimate.total_kcal
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_subject_filter(raw: Option<&str>) -> Option<BTreeSet<String>> {
    let raw = raw?;
    let ids: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "hexopipe=debug" } else { "hexopipe=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
