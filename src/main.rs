use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand, error::ErrorKind};
use scriptshell::{
    artifact::{format::ArtifactClass, unit_name_from_path},
    config::HostConfig,
    engine::{
        SecurityDomain,
        mini::{EngineOptions, MiniEngine},
    },
    error::{ExitStatus, HostError},
    pipeline::ExecutionPipeline,
    report::{render_engine_error, render_error},
    source::strip_shebang,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Runs scripts through a content-validated compiled-unit cache",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Evaluate SCRIPT before any file (repeatable)
    #[arg(short = 'e', value_name = "SCRIPT")]
    eval: Vec<String>,

    /// Run FILE; `-` reads standard input (repeatable)
    #[arg(short = 'f', value_name = "FILE")]
    files: Vec<String>,

    /// Run units straight from the parse tree
    #[arg(short, long)]
    interpreted: bool,

    /// Optimization level; negative values mean --interpreted
    #[arg(long = "opt", value_name = "N", allow_negative_numbers = true)]
    opt: Option<i32>,

    /// Source text encoding
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Reject assignments to undeclared variables
    #[arg(long)]
    strict: bool,

    /// Turn compiler warnings into errors
    #[arg(long)]
    fatal_warnings: bool,

    /// Report compiler warnings
    #[arg(short = 'w')]
    warnings: bool,

    /// Language level, e.g. 180 or 200
    #[arg(long, value_name = "N")]
    language_version: Option<u32>,

    /// Run everything in the `sandbox` security domain
    #[arg(long)]
    sandbox: bool,

    /// Maximum number of cached compiled units
    #[arg(long, value_name = "N")]
    cache_capacity: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log cache and pipeline activity to stderr
    #[arg(long)]
    verbose: bool,

    /// Script to run after -f files; `-` reads standard input
    script: Option<String>,

    /// Exposed to scripts as `arguments`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a script into an artifact file
    Compile {
        source: PathBuf,

        /// Output path; defaults to SOURCE with the artifact extension
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Emit a library artifact (function declarations only)
        #[arg(long)]
        library: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
                _ => ExitStatus::Usage,
            };
            // Nothing useful to do if stderr is gone.
            let _ = e.print();
            process::exit(code.code());
        }
    };
    init_logging(cli.verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            process::exit(e.exit_status().code());
        }
    };

    let status = match &cli.command {
        Some(Command::Compile {
            source,
            out,
            library,
        }) => compile(&config, source, out.as_deref(), *library),
        None => run(&cli, config),
    };
    process::exit(status.code());
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn build_config(cli: &Cli) -> Result<HostConfig, HostError> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if cli.interpreted || cli.opt.is_some_and(|level| level < 0) {
        config.interpreted = true;
    }
    if let Some(encoding) = &cli.encoding {
        config.encoding = encoding.clone();
    }
    config.strict |= cli.strict;
    config.fatal_warnings |= cli.fatal_warnings;
    config.warnings |= cli.warnings;
    if let Some(version) = cli.language_version {
        config.language_version = version;
    }
    if cli.sandbox {
        config.security_domain = Some(SecurityDomain::SANDBOX.to_string());
    }
    if let Some(capacity) = cli.cache_capacity {
        config.cache_capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, config: HostConfig) -> ExitStatus {
    let engine = MiniEngine::new(EngineOptions::from(&config));
    let domain = config.security_domain();
    let mut pipeline = match ExecutionPipeline::new(engine, config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            return e.exit_status();
        }
    };
    pipeline.define_arguments(&cli.args);

    for script in &cli.eval {
        pipeline.run_inline(script, domain.as_ref());
    }

    let mut requests: Vec<Option<String>> = cli.files.iter().cloned().map(Some).collect();
    if let Some(script) = &cli.script {
        requests.push(Some(script.clone()));
    }
    if requests.is_empty() && cli.eval.is_empty() {
        requests.push(None);
    }
    pipeline.run_batch(&requests, domain.as_ref());

    log::debug!("{}", pipeline.cache_stats());
    pipeline.exit_status()
}

fn compile(config: &HostConfig, source: &Path, out: Option<&Path>, library: bool) -> ExitStatus {
    let text = match fs::read_to_string(source) {
        Ok(text) => text,
        Err(e) => {
            let err = HostError::content_unavailable(source.display().to_string(), e);
            eprintln!("{}", render_error(&err));
            return err.exit_status();
        }
    };

    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| source.with_extension(&config.artifact_extension));
    let out_text = out.to_string_lossy();
    let name = unit_name_from_path(&out_text);
    let class = if library {
        ArtifactClass::Library
    } else {
        ArtifactClass::Script
    };

    let engine = MiniEngine::new(EngineOptions::from(config));
    let bytes = match engine.compile_artifact(strip_shebang(&text).body, name, class) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", render_engine_error(&e));
            return ExitStatus::RuntimeError;
        }
    };
    if let Err(e) = fs::write(&out, &bytes) {
        eprintln!("couldn't write {}: {}", out.display(), e);
        return ExitStatus::RuntimeError;
    }
    log::info!(
        "wrote {} artifact `{}` to {} ({} bytes)",
        class.as_str(),
        name,
        out.display(),
        bytes.len()
    );
    ExitStatus::Success
}
