use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use samplebench::config::BenchConfig;
use samplebench::display;
use samplebench::errors::BenchError;
use samplebench::interrupt;
use samplebench::pipeline;
use samplebench::registry;
use samplebench::report;
use samplebench::runner::ProcessRunner;
use samplebench::runtime::{ExecRuntime, NodeRuntime, RuntimeKind, SampleRuntime};
use samplebench::types::OutputFormat;

#[derive(Parser)]
#[command(
    name = "samplebench",
    version,
    about = "Run sample programs in isolated processes and report timing and heap counters"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory containing the samples
    #[arg(long)]
    samples: Option<PathBuf>,

    /// CSV report destination
    #[arg(long)]
    out: Option<PathBuf>,

    /// Per-sample timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// How samples are executed
    #[arg(long)]
    runtime: Option<RuntimeKind>,

    /// Node.js binary for the node runtime
    #[arg(long)]
    node: Option<PathBuf>,

    /// Interpreter for the exec runtime (default: run the sample file itself)
    #[arg(long)]
    program: Option<String>,

    /// Extra argument passed before the sample path (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Config file (default: samplebench.toml discovered upwards from the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "default")]
    format: OutputFormat,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a commented default samplebench.toml
    Init,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("samplebench=debug")
        } else {
            EnvFilter::new("samplebench=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File config with command-line overrides applied.
fn merge(mut config: BenchConfig, cli: &Cli) -> BenchConfig {
    if let Some(dir) = &cli.samples {
        config.samples.directory = dir.clone();
    }
    if let Some(out) = &cli.out {
        config.output.path = out.clone();
    }
    if let Some(ms) = cli.timeout {
        config.runner.timeout = format!("{}ms", ms);
    }
    if let Some(kind) = cli.runtime {
        config.runner.runtime = kind;
    }
    if let Some(node) = &cli.node {
        config.runner.node_binary = node.clone();
    }
    if let Some(program) = &cli.program {
        config.runner.program = Some(program.clone());
    }
    if !cli.args.is_empty() {
        config.runner.args = cli.args.clone();
    }
    config
}

fn build_runtime(config: &BenchConfig) -> Result<Box<dyn SampleRuntime>, BenchError> {
    Ok(match config.runner.runtime {
        RuntimeKind::Node => Box::new(NodeRuntime::new(config.runner.node_binary.clone())?),
        RuntimeKind::Exec => Box::new(ExecRuntime {
            program: config.runner.program.clone(),
            args: config.runner.args.clone(),
        }),
    })
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init) = cli.command {
        print!("{}", BenchConfig::default_toml());
        return Ok(());
    }

    init_logging(cli.verbose);
    interrupt::install_handlers();

    let config = merge(BenchConfig::resolve(cli.config.as_deref())?, &cli);
    let timeout: Duration = config.timeout()?;

    let samples = if config.samples.include.is_empty() {
        registry::list_samples(&config.samples.directory, &config.samples.extensions)?
    } else {
        registry::select_samples(&config.samples.directory, &config.samples.include)?
    };

    let destination = config.output.path.clone();
    report::check_destination(&destination)?;

    let runner = ProcessRunner::new(build_runtime(&config)?, timeout)
        .with_max_output_bytes(config.runner.max_output_bytes);

    tracing::info!(
        samples = samples.len(),
        runtime = runner.runtime_name(),
        timeout_ms = timeout.as_millis() as u64,
        "starting benchmark run"
    );

    let bench_report = pipeline::run_pipeline(&samples, &runner)?;
    report::write_report(&bench_report, &destination)?;

    let output = if cli.json {
        let mut json = display::format_json(&bench_report);
        json.push('\n');
        json
    } else {
        match cli.format {
            OutputFormat::Short => display::format_short(&bench_report),
            OutputFormat::Default => display::format_default(&bench_report, &destination),
        }
    };

    print!("{}", output);

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
        let code = err
            .downcast_ref::<BenchError>()
            .map(BenchError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}
