use benchavg::averager::{self, FieldRule};
use benchavg::report::{self, Format};
use benchavg::{collect, config};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Average numeric fields taken from fixed line numbers of benchmark logs,
/// and print one series of means per experiment for plotting.
#[derive(Parser, Debug)]
#[command(name = "benchavg", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "benchavg.toml")]
    config: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = Format::Python)]
    format: Format,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Average a single log instead of running the config
    #[arg(long, requires = "lines")]
    file: Option<PathBuf>,

    /// Comma-separated 1-based line numbers for --file
    #[arg(long, value_delimiter = ',', requires = "file")]
    lines: Vec<usize>,

    /// Label/value separator for --file
    #[arg(long, default_value = ":")]
    delimiter: String,

    /// Keep trailing '%' on values for --file (they then fail to parse)
    #[arg(long)]
    no_strip_percent: bool,

    /// Abort on the first log that cannot be averaged
    #[arg(long)]
    strict: bool,

    /// Validate config and list the logs that would be read, don't read them
    #[arg(long)]
    dry_run: bool,

    /// Write a starter config to --config and exit
    #[arg(long, conflicts_with_all = ["file", "dry_run"])]
    init: bool,

    /// Extra logging (per-file means, skipped lines)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.init {
        config::init(&cli.config)?;
        println!("Wrote starter config to {}", cli.config.display());
        return Ok(());
    }

    let mut out = open_output(cli)?;

    if let Some(path) = &cli.file {
        let rule = FieldRule {
            delimiter: cli.delimiter.clone(),
            strip_percent: !cli.no_strip_percent,
        };
        let lines = cli.lines.iter().copied().collect();
        let mean = averager::average_with(path, &lines, &rule)?;
        writeln!(out, "{mean:?}")?;
        out.flush()?;
        return Ok(());
    }

    let config = config::load(&cli.config)?;
    tracing::info!(
        config = %cli.config.display(),
        series = config.series.len(),
        "config loaded"
    );

    if cli.dry_run {
        for planned in collect::plan(&config)? {
            writeln!(out, "{}", planned.name)?;
            for (n, path) in &planned.files {
                let marker = if path.exists() { "" } else { "  (missing)" };
                writeln!(out, "  n={n:<4} {}{marker}", path.display())?;
            }
        }
        out.flush()?;
        return Ok(());
    }

    let series = collect::collect(&config, cli.strict || config.strict)?;
    let mut reporter = report::reporter(cli.format, out);
    report::write_all(reporter.as_mut(), &series)?;
    Ok(())
}

fn open_output(cli: &Cli) -> std::io::Result<Box<dyn Write>> {
    match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}
