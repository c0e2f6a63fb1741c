use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::app_config::{Config, TranslationProvider};
use crate::file_utils::FileManager;
use crate::process::program_available;
use crate::pipeline::{Backends, PipelineOrchestrator, PipelineState, RunFailure, RunRequest, RunSummary};
use crate::providers::anthropic::AnthropicTranslator;
use crate::providers::ffmpeg::FfmpegTool;
use crate::providers::ollama::OllamaTranslator;
use crate::providers::tts::CommandSynthesizer;
use crate::providers::whisper::WhisperCliTranscriber;
use crate::providers::ytdlp::YtDlpFetcher;
use crate::providers::Translator;
use crate::translation::TranslationPrompt;

// @module: Application controller wiring the CLI to the pipeline

/// Main application controller for dubbing runs
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Backends handed to every run
    backends: Backends,
    // @field: Draw progress bars on the terminal
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller driving the real command-line tools
    pub fn with_config(config: Config) -> Result<Self> {
        let backends = Self::build_backends(&config)?;
        Ok(Self {
            config,
            backends,
            show_progress: true,
        })
    }

    /// Create a controller with explicit backends, without progress bars
    pub fn with_backends(config: Config, backends: Backends) -> Self {
        Self {
            config,
            backends,
            show_progress: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn build_backends(config: &Config) -> Result<Backends> {
        let ffmpeg = Arc::new(FfmpegTool::new(config.extraction.program.clone()));
        let muxer = if config.muxing.program == config.extraction.program {
            ffmpeg.clone()
        } else {
            Arc::new(FfmpegTool::new(config.muxing.program.clone()))
        };

        Ok(Backends {
            fetcher: Arc::new(YtDlpFetcher::new(config.acquisition.program.clone())),
            extractor: ffmpeg,
            transcriber: Arc::new(WhisperCliTranscriber::new(
                config.transcription.program.clone(),
                config.transcription.model.clone(),
                config.transcription.extra_args.clone(),
            )),
            translator: Self::build_translator(config)?,
            synthesizer: Arc::new(CommandSynthesizer::new(
                config.synthesis.program.clone(),
                config.synthesis.args.clone(),
            )),
            muxer,
        })
    }

    fn build_translator(config: &Config) -> Result<Arc<dyn Translator>> {
        let settings = &config.translation;
        let prompt = TranslationPrompt::new(settings.system_prompt.clone());

        let translator: Arc<dyn Translator> = match settings.provider {
            TranslationProvider::Ollama => Arc::new(
                OllamaTranslator::new(settings.get_endpoint(), settings.get_model(), prompt, settings.timeout())
                    .with_retry(settings.retry_count, settings.retry_backoff_ms)
                    .with_rate_limit(settings.rate_limit)
                    .with_temperature(settings.temperature),
            ),
            TranslationProvider::Anthropic => {
                let api_key = settings.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("Translation API key is required for Anthropic provider"));
                }
                Arc::new(
                    AnthropicTranslator::new(
                        api_key,
                        settings.get_endpoint(),
                        settings.get_model(),
                        prompt,
                        settings.timeout(),
                    )
                    .with_temperature(settings.temperature),
                )
            }
        };
        Ok(translator)
    }

    /// Dub `request.source_ref` into `request.target_language`
    pub async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<RunSummary, RunFailure> {
        let mut orchestrator = PipelineOrchestrator::new(self.config.clone(), self.backends.clone())
            .map_err(|e| RunFailure {
                stage: PipelineState::Init,
                error: crate::errors::RunError::Io(e.to_string()),
            })?;

        let progress = self.show_progress.then(StageProgress::new);
        if let Some(progress) = &progress {
            let progress = progress.clone();
            orchestrator = orchestrator.with_progress(Arc::new(move |state: PipelineState, done: usize, total: usize| {
                progress.update(state, done, total);
            }));
        }

        info!(
            "Dubbing {} into {} using {}",
            request.source_ref,
            crate::language_utils::get_language_name(&request.target_language)
                .unwrap_or_else(|_| request.target_language.clone()),
            self.config.translation.provider.display_name()
        );

        let result = orchestrator.run(request, &cancel).await;
        if let Some(progress) = &progress {
            progress.finish();
        }

        match &result {
            Ok(summary) => Self::log_summary(summary),
            Err(failure) if failure.is_interrupted() => warn!("Run cancelled during {}", failure.stage),
            Err(_) => {}
        }
        result
    }

    fn log_summary(summary: &RunSummary) {
        info!(
            "{}/{} segments synthesized ({} translated, {} kept original text)",
            summary.synthesized_count, summary.segments_total, summary.translated_count, summary.fallback_count
        );
        for (stage, strategy) in &summary.strategies {
            info!("{} used strategy '{}'", stage, strategy);
        }
        info!(
            "Success: {} ({}) in {}",
            summary.output_path.display(),
            FileManager::format_size(summary.output_size),
            Self::format_duration(summary.elapsed)
        );
    }

    /// Names of configured external programs that cannot be launched
    pub async fn missing_tools(&self) -> Vec<String> {
        let tools = [
            (self.config.acquisition.program.as_str(), "--version"),
            (self.config.extraction.program.as_str(), "-version"),
            (self.config.muxing.program.as_str(), "-version"),
            (self.config.transcription.program.as_str(), "--help"),
            (self.config.synthesis.program.as_str(), "--version"),
        ];

        let mut missing: Vec<String> = Vec::new();
        for (program, flag) in tools {
            if missing.iter().any(|m| m == program) {
                continue;
            }
            if !program_available(program, flag).await {
                missing.push(program.to_string());
            }
        }
        missing
    }

    /// Load the config file at `path`, creating it with defaults when missing
    pub fn load_config(path: &str) -> Result<Config> {
        Config::load_or_create(path).with_context(|| format!("Failed to load configuration from {}", path))
    }

    // Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Terminal progress: a spinner for tool stages, a bar for per-segment stages
#[derive(Clone)]
struct StageProgress {
    multi: MultiProgress,
    current: Arc<Mutex<Option<(PipelineState, ProgressBar)>>>,
}

impl StageProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }

    fn update(&self, state: PipelineState, done: usize, total: usize) {
        let mut current = self.current.lock();

        let same_stage = matches!(&*current, Some((s, _)) if *s == state);
        if !same_stage {
            if let Some((_, bar)) = current.take() {
                bar.finish_and_clear();
            }
            if state.is_terminal() {
                return;
            }
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::spinner_style());
            bar.set_message(state.label().to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            *current = Some((state, bar));
        }

        if let Some((_, bar)) = current.as_ref() {
            if total > 0 {
                if bar.length() != Some(total as u64) {
                    bar.set_style(Self::bar_style());
                    bar.set_length(total as u64);
                }
                bar.set_position(done as u64);
            }
        }
    }

    fn finish(&self) {
        if let Some((_, bar)) = self.current.lock().take() {
            bar.finish_and_clear();
        }
    }
}
