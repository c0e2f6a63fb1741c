// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use revoice::app_config::{self, Config, TranslationProvider};
use revoice::app_controller::Controller;
use revoice::pipeline::RunRequest;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dub a video into another language (default command)
    #[command(alias = "dub")]
    Run(RunArgs),

    /// Generate shell completions for revoice
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct RunArgs {
    /// URL or local path of the video to dub
    #[arg(short, long, value_name = "REF")]
    source: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    language: Option<String>,

    /// Base name of the output file
    #[arg(short, long)]
    name: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,
}

/// revoice - dub videos into another language
///
/// Downloads a video, transcribes its speech, translates every utterance and
/// speaks it again at the time it was originally said.
#[derive(Parser, Debug)]
#[command(name = "revoice")]
#[command(version)]
#[command(about = "Automatic video dubbing")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "revoice dubs a video into another language, keeping every utterance in its original time slot.

EXAMPLES:
    revoice -s https://example.com/watch?v=abc -l fr     # Dub into French
    revoice -s talk.mp4 -l de -n talk -o dubbed/         # Local file, named output
    revoice -s talk.mp4 -l es -p anthropic               # Translate with Anthropic
    revoice --log-level debug -s talk.mp4 -l it          # Verbose logging
    revoice completions bash > revoice.bash              # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically.

REQUIRED TOOLS:
    yt-dlp, ffmpeg, whisper and a command-line TTS (espeak-ng by default)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI colour for a level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌", "\x1B[1;31m"),
            Level::Warn => ("🚧", "\x1B[1;33m"),
            Level::Info => ("  ", "\x1B[1;32m"),
            Level::Debug => ("🔍", "\x1B[1;36m"),
            Level::Trace => ("📋", "\x1B[1;35m"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let (emoji, colour) = Self::decoration(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", colour, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Trace is the ceiling; the effective level is set once the config is known
    if CustomLogger::init(LevelFilter::Trace).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    let cli = CommandLineOptions::parse();

    let args = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "revoice", &mut std::io::stdout());
            return;
        }
        Some(Commands::Run(args)) => args,
        None => cli.run,
    };

    match run_dub(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Apply CLI overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
        // provider-specific defaults apply unless a model is given too
        config.translation.endpoint.clear();
        config.translation.model.clear();
    }
    if let Some(model) = &args.model {
        config.translation.model = model.clone();
    }
    if let Some(language) = &args.language {
        config.target_language = language.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone().into();
    }
}

/// Returns `Ok(false)` when the run aborted
async fn run_dub(args: RunArgs) -> Result<bool> {
    if let Some(level) = &args.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let source = args
        .source
        .clone()
        .ok_or_else(|| anyhow!("--source is required when no subcommand is specified"))?;

    let mut config = Controller::load_config(&args.config_path)?;
    apply_overrides(&mut config, &args);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let request = RunRequest {
        source_ref: source,
        target_language: config.target_language.clone(),
        run_name: args.name.clone(),
        output_dir: config.output_dir.clone(),
    };
    let controller = Controller::with_config(config)?;
    for program in controller.missing_tools().await {
        warn!("'{}' could not be launched; stages using it will fail", program);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping the run");
            interrupt.cancel();
        }
    });

    match controller.run(request, cancel).await {
        Ok(summary) => {
            info!("Done: {}", summary.output_path.display());
            Ok(true)
        }
        Err(failure) => {
            error!("Aborted: {}", failure);
            Ok(false)
        }
    }
}
