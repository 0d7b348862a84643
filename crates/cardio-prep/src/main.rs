//! CLI entry point for the heart-disease preparation pipeline.

use anyhow::{Context, Result, anyhow};
use cardio_prep::importance::ranking_to_frame;
use cardio_prep::io::{read_csv, write_csv};
use cardio_prep::ocr::{parse_transcript_dir, readings_to_frame};
use cardio_prep::{
    FittedTransform, NumericImputation, Pipeline, PipelineConfig, PipelineResult, PrepError,
    load_raw_records,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// CLI-compatible numeric imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericImputation {
    /// Column median, then KNN for any gaps left
    MedianThenKnn,
    /// K-Nearest Neighbors for every gap
    Knn,
}

impl From<CliNumericImputation> for NumericImputation {
    fn from(cli: CliNumericImputation) -> Self {
        match cli {
            CliNumericImputation::MedianThenKnn => NumericImputation::MedianThenKnn,
            CliNumericImputation::Knn => NumericImputation::Knn,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Heart-disease data preparation pipeline",
    long_about = "Cleans, engineers and partitions a heart-disease CSV into model-ready tables.\n\n\
                  EXAMPLES:\n  \
                  # Full pipeline with the default paths\n  \
                  cardio-prep run\n\n  \
                  # Custom input and seed, without the external batch\n  \
                  cardio-prep run --input heart.csv --seed 7 --no-external\n\n  \
                  # Turn OCR transcripts into an external batch\n  \
                  cardio-prep ocr --input-dir data/ocr_samples"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Raw CSV to cleaned, engineered and split tables plus reports
    Run(RunArgs),
    /// Raw CSV to cleaned CSV and cleaning report
    Clean(CleanArgs),
    /// Cleaned CSV to feature table, importance ranking and fitted transform
    Engineer(EngineerArgs),
    /// Replay a saved transform on a cleaned CSV
    Encode(EncodeArgs),
    /// Text transcripts to an external feature batch
    Ocr(OcrArgs),
}

/// Settings shared by every stage that reads the raw file.
#[derive(Args, Debug)]
struct StageOverrides {
    /// Raw CSV to read
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Outcome column
    #[arg(short, long)]
    target: Option<String>,

    /// Accept any header as long as the outcome column is present
    #[arg(long)]
    no_schema_check: bool,

    /// Strategy for imputing missing numeric values
    #[arg(long, value_enum)]
    numeric_imputation: Option<CliNumericImputation>,

    /// Number of neighbors for KNN imputation
    #[arg(long)]
    knn_neighbors: Option<usize>,

    /// Outlier fence width as a multiple of the IQR
    #[arg(long)]
    iqr_multiplier: Option<f64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    stage: StageOverrides,

    /// Directory for processed tables
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for the milestone report
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Directory for importances, transform and summary statistics
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// External feature batch to fuse
    #[arg(long, conflicts_with = "no_external")]
    external: Option<PathBuf>,

    /// Skip external fusion even if a batch exists
    #[arg(long)]
    no_external: bool,

    /// Seed for the forest and the split
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees in the importance forest
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Print the milestone report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CleanArgs {
    #[command(flatten)]
    stage: StageOverrides,

    /// Cleaned CSV to write
    #[arg(short, long, default_value = "data/processed/heart_cleaned.csv")]
    output: PathBuf,

    /// Cleaning report to write
    #[arg(long, default_value = "data/processed/cleaning_report.txt")]
    report: PathBuf,
}

#[derive(Args, Debug)]
struct EngineerArgs {
    /// Cleaned CSV to read
    #[arg(short, long, default_value = "data/processed/heart_cleaned.csv")]
    input: PathBuf,

    /// Feature CSV to write
    #[arg(short, long, default_value = "data/processed/heart_features.csv")]
    output: PathBuf,

    /// Importance ranking CSV to write
    #[arg(long, default_value = "outputs/feature_importances.csv")]
    importances: PathBuf,

    /// Fitted transform JSON to write
    #[arg(long, default_value = "outputs/feature_transform.json")]
    transform: PathBuf,

    /// Number of trees in the importance forest
    #[arg(long)]
    n_estimators: Option<usize>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Fitted transform JSON
    #[arg(long, default_value = "outputs/feature_transform.json")]
    transform: PathBuf,

    /// Cleaned CSV to encode
    #[arg(short, long)]
    input: PathBuf,

    /// Encoded CSV to write
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Directory of `.txt` transcripts
    #[arg(long, default_value = "data/ocr_samples")]
    input_dir: PathBuf,

    /// External batch CSV to write
    #[arg(short, long, default_value = "data/processed/ocr_results.csv")]
    output: PathBuf,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = cli.quiet || matches!(&cli.command, Command::Run(args) if args.json);
    init_logging(&cli.log_level, quiet);

    let config = load_config(cli.config.as_ref())?;

    let outcome = match cli.command {
        Command::Run(args) => run(config, args),
        Command::Clean(args) => clean(config, args),
        Command::Engineer(args) => engineer(config, args),
        Command::Encode(args) => encode(args),
        Command::Ocr(args) => ocr(args),
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
        if let Some(hint) = e.downcast_ref::<PrepError>().and_then(failure_hint) {
            warn!("{}", hint);
        }
    }
    outcome
}

/// Advice for failures that a different input or configuration would fix.
fn failure_hint(err: &PrepError) -> Option<String> {
    if !err.is_recoverable() {
        return None;
    }
    let stage = err.stage().unwrap_or("loading");
    Some(format!(
        "[{}] during {}: check the input header and --config values, then rerun",
        err.error_code(),
        stage
    ))
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(PipelineConfig::from_json_file(path)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn apply_stage_overrides(config: &mut PipelineConfig, overrides: &StageOverrides) {
    if let Some(input) = &overrides.input {
        config.input_path = input.clone();
    }
    if let Some(target) = &overrides.target {
        config.target_column = target.clone();
    }
    if overrides.no_schema_check {
        config.expected_schema = None;
    }
    if let Some(strategy) = overrides.numeric_imputation {
        config.numeric_imputation = strategy.into();
    }
    if let Some(k) = overrides.knn_neighbors {
        config.knn_neighbors = k;
    }
    if let Some(multiplier) = overrides.iqr_multiplier {
        config.iqr_multiplier = multiplier;
    }
}

fn build_pipeline(config: PipelineConfig, quiet: bool) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);
    if !quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    Ok(builder.build()?)
}

fn run(mut config: PipelineConfig, args: RunArgs) -> Result<()> {
    apply_stage_overrides(&mut config, &args.stage);
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = args.report_dir {
        config.report_dir = dir;
    }
    if let Some(dir) = args.artifact_dir {
        config.artifact_dir = dir;
    }
    if args.no_external {
        config.external_batch_path = None;
    } else if let Some(path) = args.external {
        if !path.exists() {
            return Err(anyhow!("External batch not found: {}", path.display()));
        }
        config.external_batch_path = Some(path);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(n) = args.n_estimators {
        config.n_estimators = n;
    }

    if !config.input_path.exists() {
        return Err(anyhow!("Input file not found: {}", config.input_path.display()));
    }

    info!("{}", "=".repeat(80));
    info!("Starting heart-disease preparation pipeline...");
    info!("{}", "=".repeat(80));

    let result = build_pipeline(config, args.json)?.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.milestone)?);
    } else {
        print_human_readable_summary(&result);
    }
    Ok(())
}

fn clean(mut config: PipelineConfig, args: CleanArgs) -> Result<()> {
    apply_stage_overrides(&mut config, &args.stage);
    let pipeline = build_pipeline(config, false)?;

    let raw = load_raw_records(&pipeline.config().input_path, pipeline.config())?;
    let cleaning = pipeline.clean(&raw)?;

    write_csv(&cleaning.cleaned, &args.output)?;
    cleaning.report.write(&args.report)?;
    print!("{}", cleaning.report.to_text());
    Ok(())
}

fn engineer(mut config: PipelineConfig, args: EngineerArgs) -> Result<()> {
    if let Some(n) = args.n_estimators {
        config.n_estimators = n;
    }
    let pipeline = build_pipeline(config, false)?;

    let cleaned = read_csv(&args.input)
        .with_context(|| format!("Reading cleaned table {}", args.input.display()))?;
    let engineering = pipeline.engineer(&cleaned)?;

    write_csv(&engineering.engineered, &args.output)?;
    write_csv(&ranking_to_frame(&engineering.ranking)?, &args.importances)?;
    engineering.transform.to_json_file(&args.transform)?;

    println!(
        "Total features after engineering: {}",
        engineering.transform.feature_names().len()
    );
    for feature in engineering.ranking.iter().take(10) {
        println!("  {:<24} {:.4}", feature.feature, feature.importance);
    }
    Ok(())
}

fn encode(args: EncodeArgs) -> Result<()> {
    let transform = FittedTransform::from_json_file(&args.transform)?;
    let cleaned = read_csv(&args.input)
        .with_context(|| format!("Reading cleaned table {}", args.input.display()))?;

    let encoded = transform.replay(&cleaned)?;
    write_csv(&encoded, &args.output)?;

    println!(
        "Encoded {} rows into {} columns: {}",
        encoded.height(),
        encoded.width(),
        args.output.display()
    );
    Ok(())
}

fn ocr(args: OcrArgs) -> Result<()> {
    if !args.input_dir.is_dir() {
        warn!("Transcript directory {} not found", args.input_dir.display());
        return Ok(());
    }

    let readings = parse_transcript_dir(&args.input_dir)?;
    if readings.is_empty() {
        warn!("No transcripts found in {}", args.input_dir.display());
        return Ok(());
    }

    let values: Vec<_> = readings.iter().map(|(_, reading)| *reading).collect();
    let batch = readings_to_frame(&values)?;
    write_csv(&batch, &args.output)?;
    println!("External batch written to {}", args.output.display());
    println!("{}", batch.head(Some(5)));
    Ok(())
}

/// Print a human-readable summary of a full run.
fn print_human_readable_summary(result: &PipelineResult) {
    let report = &result.cleaning.report;

    println!();
    println!("{}", "=".repeat(80));
    println!("PREPARATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", result.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed as outliers)",
        report.rows_before,
        report.rows_after,
        result.rows_removed()
    );
    println!(
        "  Imputation: {} ({} cells)",
        report.imputation.method, report.imputation.cells_filled
    );
    println!("  Features: {}", result.milestone.feature_count);
    println!("  External features: {}", result.fusion);
    println!();

    println!("Splits:");
    for split in &result.milestone.splits {
        let balance: Vec<String> = split
            .class_balance
            .iter()
            .map(|(class, share)| format!("{}={:.3}", class, share))
            .collect();
        println!(
            "  {:<6} {:>5} rows x {:>3} columns  [{}]",
            split.name,
            split.rows,
            split.columns,
            balance.join(", ")
        );
    }
    println!();

    if !result.engineering.ranking.is_empty() {
        println!("Top Features:");
        for feature in result.engineering.ranking.iter().take(5) {
            println!("  - {} ({:.4})", feature.feature, feature.importance);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
}
