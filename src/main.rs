use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use mindset_ate::errors::AteError;
use mindset_ate::simulate::SyntheticStudy;
use mindset_ate::{ColumnSpec, ConfigIO, Study, StudyConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

/// Average treatment effect of the growth-mindset intervention.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate the ATE from a delimited file of student records.
    Analyze(AnalyzeArgs),
    /// Write a synthetic dataset with a known effect.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input file with a header row.
    input: PathBuf,

    /// JSON study configuration. Command line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bootstrap replicates per method.
    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for the bootstrap (all cores by default).
    #[arg(long)]
    threads: Option<usize>,

    /// Analytic intervals for the unadjusted and regression estimates.
    #[arg(long, default_value_t = false)]
    analytic: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// True average treatment effect.
    #[arg(long, default_value_t = 0.0)]
    effect: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Strength of the covariate terms in treatment assignment.
    #[arg(long, default_value_t = 1.0)]
    confounding: f64,

    #[arg(long)]
    output: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
}

fn analyze(args: AnalyzeArgs) -> Result<(), AteError> {
    let mut config = match &args.config {
        Some(path) => StudyConfig::load_config(path)?,
        None => StudyConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config.bootstrap_iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.threads.is_some() {
        config.num_threads = args.threads;
    }
    config.analytic_intervals |= args.analytic;

    let study = Study::new(config)?;
    let data = study.load(&args.input)?;
    let report = study.run(&data)?;
    match args.format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Markdown => println!("{}", report.to_markdown()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<(), AteError> {
    let study = SyntheticStudy {
        confounding: args.confounding,
        ..SyntheticStudy::new(args.rows, args.effect, args.seed)
    };
    let data = study.generate()?;
    let file = File::create(&args.output)?;
    data.write_csv(BufWriter::new(file), &ColumnSpec::mindset())?;
    info!(
        "Wrote {} records ({} treated) to {}.",
        data.len(),
        data.n_treated(),
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Analyze(args) => analyze(args),
        Commands::Simulate(args) => simulate(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
