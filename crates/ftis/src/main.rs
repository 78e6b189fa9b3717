use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::{error, info};

use ftis::analysers::builtin;
use ftis::config::{load_config, Mode};
use ftis::corpus::{expand_tilde, Analysis, Corpus, Source, AUDIO_EXTENSIONS};
use ftis::error::ConfigError;
use ftis::process::Process;
use ftis::stage::Stage;

/// Runs an analysis chain over a folder of audio files.
#[derive(Parser, Debug)]
#[command(name = "ftis")]
#[command(version)]
#[command(group(ArgGroup::new("source").required(true).args(["corpus", "analysis"])))]
struct Args {
    /// Pipeline description (YAML)
    #[arg(short, long, env = "FTIS_CONFIG")]
    config: PathBuf,

    /// Folder receiving stage outputs, caches, metadata and the log
    #[arg(short, long, env = "FTIS_OUTPUT")]
    output: PathBuf,

    /// Folder of audio files to analyse
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Previously computed analysis (JSON) to start from
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// File extensions a corpus accepts
    #[arg(long = "extension", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Overrides the configured mode
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Overrides the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    match value {
        "chain" => Ok(Mode::Chain),
        "parallel" => Ok(Mode::Parallel),
        other => Err(format!("expected 'chain' or 'parallel', got '{}'", other)),
    }
}

fn load_source(args: &Args) -> Result<Source, ConfigError> {
    match (&args.corpus, &args.analysis) {
        (Some(path), _) if args.extensions.is_empty() => {
            Corpus::with_extensions(path, AUDIO_EXTENSIONS).map(Source::from)
        }
        (Some(path), _) => {
            let extensions: Vec<&str> = args.extensions.iter().map(String::as_str).collect();
            Corpus::with_extensions(path, &extensions).map(Source::from)
        }
        (None, Some(path)) => Analysis::load(path).map(Source::from),
        (None, None) => Err(ConfigError::NoCorpusSource),
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let source = load_source(&args)?;

    let stages = config
        .chain
        .iter()
        .map(|name| Stage::from_boxed(builtin(name)?).with_overrides(&config.overrides_for(name)))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let output = expand_tilde(&args.output);
    if let Some(log_path) = ftis::logging::init(Some(output.as_path()))? {
        info!("Logging to {}", log_path.display());
    }

    let mode = args.mode.unwrap_or(config.mode);
    let workers = args.workers.unwrap_or(config.workers);

    let mut process = Process::new(source, &output, mode).with_workers(workers);
    process.add(stages);
    process.run()?;

    info!("Outputs written to {}", output.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
