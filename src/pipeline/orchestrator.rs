/*!
 * Run orchestration.
 *
 * A run walks the states `Init → Acquiring → Extracting → Transcribing →
 * Translating → Resynthesizing → Muxing → Done`. Each stage starts only after
 * the previous one produced a validated artifact. The first failure, or an
 * external cancellation, moves the run to `Aborted`; every temporary artifact
 * is removed exactly once whatever the outcome.
 */

use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_config::Config;
use crate::audio::wav::wav_duration_ms;
use crate::errors::{ResynthesisFailure, RunError};
use crate::file_utils::{ArtifactHandle, ArtifactValidator, FileManager};
use crate::language_utils::{language_codes_match, normalize_to_part1_or_part2t};
use crate::providers::{AudioExtractor, FetchedMedia, MediaFetcher, Muxer, SpeechSynthesizer, Transcriber, Translator};
use crate::stage::{StageExecutor, StageKind, StageStrategy, StrategyList};
use crate::translation::{TranslationCache, TranslationPass};

use super::state::{PipelineState, RunState};
use super::synthesis::SynthesisPass;
use super::timeline::{TimelineSynthesizer, TrackHandle};
use super::types::Transcript;

/// Work-area name the muxer writes to before the output is moved into place
const STAGED_OUTPUT_NAME: &str = "dubbed_output.mp4";

/// Extracted audio longer than this is reported as long
const LONG_AUDIO_SECS: u64 = 600;

/// What to dub and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// URL or local path of the source media
    pub source_ref: String,
    pub target_language: String,
    /// Base name of the output; a timestamp is used when absent
    pub run_name: Option<String>,
    pub output_dir: PathBuf,
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub output_size: u64,
    pub run_id: Uuid,
    /// Utterances that reached resynthesis
    pub segments_total: usize,
    pub translated_count: usize,
    pub fallback_count: usize,
    /// Clips actually placed on the track
    pub synthesized_count: usize,
    pub track_duration_ms: u64,
    /// Winning strategy name per external-tool stage
    pub strategies: Vec<(StageKind, String)>,
    pub elapsed: Duration,
}

/// A run that ended in `Aborted`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct RunFailure {
    /// State the run was in when it failed
    pub stage: PipelineState,
    pub error: RunError,
}

impl RunFailure {
    pub fn is_interrupted(&self) -> bool {
        self.error.is_interrupted()
    }
}

/// Concrete backends used by a run
#[derive(Debug, Clone)]
pub struct Backends {
    pub fetcher: Arc<dyn MediaFetcher>,
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub muxer: Arc<dyn Muxer>,
}

/// Progress callback: `(state, completed, total)`; `total` is 0 for stages
/// without item-level progress
pub type ProgressCallback = Arc<dyn Fn(PipelineState, usize, usize) + Send + Sync>;

/// Sequences the stages of a run
pub struct PipelineOrchestrator {
    config: Config,
    backends: Backends,
    acquisition: StrategyList,
    extraction: StrategyList,
    muxing: StrategyList,
    progress: Option<ProgressCallback>,
}

/// Artifacts threaded between stages
struct StageOutputs {
    strategies: Vec<(StageKind, String)>,
}

impl PipelineOrchestrator {
    /// Build an orchestrator; fails when a stage has no strategies
    pub fn new(config: Config, backends: Backends) -> Result<Self> {
        let acquisition = config.acquisition.strategy_list(StageKind::Acquisition)?;
        let extraction = config.extraction.strategy_list(StageKind::Extraction)?;
        let muxing = config.muxing.strategy_list(StageKind::Muxing)?;
        Ok(Self {
            config,
            backends,
            acquisition,
            extraction,
            muxing,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn report(&self, state: PipelineState, done: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(state, done, total);
        }
    }

    /// Move to the next state, failing if the run was cancelled meanwhile
    fn enter(&self, run: &mut RunState, cancel: &CancellationToken) -> Result<PipelineState, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Interrupted);
        }
        let state = run.advance();
        debug!("Run {} entering {}", run.run_id(), state);
        self.report(state, 0, 0);
        Ok(state)
    }

    /// Execute a full run.
    ///
    /// On failure the returned `RunFailure` names the state that failed; no
    /// output file is left behind in that case.
    pub async fn run(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunSummary, RunFailure> {
        let started = Instant::now();
        let mut run = RunState::create(
            &self.config.temp_dir,
            &request.output_dir,
            request.run_name.clone(),
            &request.target_language,
        )
        .map_err(|e| RunFailure {
            stage: PipelineState::Init,
            error: e.into(),
        })?;
        info!("Run {} started for {}", run.run_id(), request.source_ref);

        let result = self.drive(&request, &mut run, cancel).await;
        let failed_in = run.state();

        match result {
            Ok(mut summary) => {
                run.advance();
                let removed = run.cleanup();
                debug!("Removed {} temporary file(s)", removed);
                summary.elapsed = started.elapsed();
                self.report(PipelineState::Done, 0, 0);
                Ok(summary)
            }
            Err(error) => {
                run.abort();
                let removed = run.cleanup();
                if error.is_interrupted() {
                    warn!("Run {} interrupted during {} ({} temporary file(s) removed)", run.run_id(), failed_in, removed);
                } else {
                    error!("Run {} aborted during {}: {}", run.run_id(), failed_in, error);
                }
                self.report(PipelineState::Aborted, 0, 0);
                Err(RunFailure {
                    stage: failed_in,
                    error,
                })
            }
        }
    }

    async fn drive(
        &self,
        request: &RunRequest,
        run: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let mut outputs = StageOutputs { strategies: Vec::new() };

        self.enter(run, cancel)?;
        let media = self.acquire(&request.source_ref, run, cancel, &mut outputs).await?;

        self.enter(run, cancel)?;
        let audio = self.extract(&media.path, run, cancel, &mut outputs).await?;

        self.enter(run, cancel)?;
        let transcript = self.transcribe(&audio.path, cancel).await?;

        self.enter(run, cancel)?;
        let source_language = transcript
            .detected_language
            .clone()
            .or_else(|| self.config.source_language.clone());
        if let Some(source) = &source_language {
            if language_codes_match(source, &request.target_language) {
                warn!("Source language '{}' already matches the target; translations will mostly fall back", source);
            }
        }

        let translation_pass = TranslationPass::new(
            self.backends.translator.clone(),
            TranslationCache::new(self.config.translation.cache_enabled),
            self.config.translation.concurrent_requests,
        );
        let translated = translation_pass
            .run(
                &transcript.segments,
                source_language.as_deref(),
                &request.target_language,
                cancel,
                |done, total| self.report(PipelineState::Translating, done, total),
            )
            .await?;
        if translated.utterances.is_empty() {
            return Err(RunError::EmptyTranslation);
        }

        self.enter(run, cancel)?;
        let track = self.resynthesize(&translated.utterances, &request.target_language, run, cancel).await?;

        self.enter(run, cancel)?;
        let output = self.mux(&media.path, &track.path, run, cancel, &mut outputs).await?;

        info!(
            "{}/{} segments synthesized, {} translated, {} kept original text",
            track.success_count, track.total_count, translated.stats.translated, translated.stats.fallbacks
        );

        Ok(RunSummary {
            output_path: output.path,
            output_size: output.size_bytes,
            run_id: run.run_id(),
            segments_total: track.total_count,
            translated_count: translated.stats.translated,
            fallback_count: translated.stats.fallbacks,
            synthesized_count: track.success_count,
            track_duration_ms: track.duration_ms,
            strategies: outputs.strategies,
            elapsed: Duration::ZERO,
        })
    }

    async fn acquire(
        &self,
        source_ref: &str,
        run: &mut RunState,
        cancel: &CancellationToken,
        outputs: &mut StageOutputs,
    ) -> Result<FetchedMedia, RunError> {
        let executor = StageExecutor::new(self.config.acquisition.retry_delay());
        let validator = ArtifactValidator::new(self.config.acquisition.min_artifact_bytes);
        let fetcher = self.backends.fetcher.as_ref();
        let work_dir = run.work_dir().to_path_buf();
        let work_dir = work_dir.as_path();

        let success = executor
            .execute(
                &self.acquisition,
                |strategy: &StageStrategy| {
                    let strategy = strategy.clone();
                    async move { fetcher.fetch(source_ref, &strategy, work_dir).await }
                },
                |media: FetchedMedia| validator.validate(&media.path).map(|_| media),
                cancel,
            )
            .await?;

        let media = success.artifact;
        run.track(&media.path);
        info!("Source ready: {} (via '{}')", media.path.display(), success.strategy_name);
        outputs.strategies.push((StageKind::Acquisition, success.strategy_name));
        Ok(media)
    }

    async fn extract(
        &self,
        video: &Path,
        run: &mut RunState,
        cancel: &CancellationToken,
        outputs: &mut StageOutputs,
    ) -> Result<ArtifactHandle, RunError> {
        let executor = StageExecutor::new(self.config.extraction.retry_delay());
        let validator = ArtifactValidator::new(self.config.extraction.min_artifact_bytes);
        let extractor = self.backends.extractor.as_ref();
        let output = run.work_file("source_audio.wav");
        run.track(&output);
        let output_path = output.as_path();

        let success = executor
            .execute(
                &self.extraction,
                |strategy: &StageStrategy| {
                    let strategy = strategy.clone();
                    async move { extractor.extract(video, &strategy, output_path).await }
                },
                |path: PathBuf| validator.validate(path),
                cancel,
            )
            .await?;

        info!(
            "Audio extracted: {} (via '{}')",
            FileManager::format_size(success.artifact.size_bytes),
            success.strategy_name
        );
        outputs.strategies.push((StageKind::Extraction, success.strategy_name));
        Ok(success.artifact)
    }

    async fn transcribe(&self, audio: &Path, cancel: &CancellationToken) -> Result<Transcript, RunError> {
        let timeout = self.config.transcription.timeout();
        let hint = self.config.source_language.as_deref();

        match wav_duration_ms(audio) {
            Ok(ms) if ms / 1000 > LONG_AUDIO_SECS => {
                warn!("Long audio detected ({:.1} min); transcription may take a while", ms as f64 / 60_000.0)
            }
            Ok(ms) => info!("Audio duration: {:.1}s", ms as f64 / 1000.0),
            Err(e) => debug!("Could not read audio duration of {}: {}", audio.display(), e),
        }

        let transcript = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Interrupted),
            result = tokio::time::timeout(timeout, self.backends.transcriber.transcribe(audio, hint)) => match result {
                Err(_) => {
                    return Err(RunError::Timeout {
                        stage: PipelineState::Transcribing.to_string(),
                        after: timeout,
                    })
                }
                Ok(result) => result?,
            },
        };

        let spoken = transcript.segments.iter().filter(|s| !s.text.trim().is_empty()).count();
        if spoken == 0 {
            return Err(RunError::EmptyTranscription);
        }
        info!(
            "Transcribed {} segment(s), detected language: {}",
            spoken,
            transcript.detected_language.as_deref().unwrap_or("unknown")
        );
        Ok(transcript)
    }

    async fn resynthesize(
        &self,
        utterances: &[super::types::Utterance],
        target_language: &str,
        run: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<TrackHandle, RunError> {
        let voice_language =
            normalize_to_part1_or_part2t(target_language).unwrap_or_else(|_| target_language.to_string());
        let clip_paths: Vec<PathBuf> = (0..utterances.len())
            .map(|i| run.work_file(&SynthesisPass::clip_file_name(i)))
            .collect();
        for path in &clip_paths {
            run.track(path);
        }

        let synthesis = SynthesisPass::new(
            self.backends.synthesizer.clone(),
            self.config.resynthesis.sample_rate,
            self.config.synthesis.concurrent_jobs,
        )
        .with_timeout(Duration::from_secs(self.config.synthesis.timeout_secs));
        let clips = synthesis
            .run(
                utterances,
                &voice_language,
                |i| clip_paths[i].clone(),
                cancel,
                |done, total| self.report(PipelineState::Resynthesizing, done, total),
            )
            .await?;

        let track_path = run.work_file("dubbed_audio.wav");
        run.track(&track_path);

        // assembly is CPU-bound
        let synthesizer = TimelineSynthesizer::new(self.config.resynthesis.clone());
        let owned_utterances = utterances.to_vec();
        let assembly_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            synthesizer.assemble(&owned_utterances, clips.clips, &track_path, &assembly_cancel)
        })
        .await
        .map_err(|e| ResynthesisFailure::Export(format!("assembly task failed: {}", e)))??;

        info!(
            "Assembled {}ms track from {}/{} clip(s)",
            handle.duration_ms, handle.success_count, handle.total_count
        );
        Ok(handle)
    }

    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        run: &mut RunState,
        cancel: &CancellationToken,
        outputs: &mut StageOutputs,
    ) -> Result<ArtifactHandle, RunError> {
        FileManager::ensure_dir(run.output_dir()).map_err(|e| RunError::Io(e.to_string()))?;
        let output = run.output_path();
        // muxed inside the work area; the output path is only touched once valid
        let staged = run.work_file(STAGED_OUTPUT_NAME);
        run.track(&staged);

        let executor = StageExecutor::new(self.config.muxing.retry_delay());
        let validator = ArtifactValidator::new(self.config.muxing.min_artifact_bytes);
        let muxer = self.backends.muxer.as_ref();
        let staged_path = staged.as_path();

        let success = executor
            .execute(
                &self.muxing,
                |strategy: &StageStrategy| {
                    let strategy = strategy.clone();
                    async move { muxer.mux(video, audio, &strategy, staged_path).await }
                },
                |path: PathBuf| validator.validate(path),
                cancel,
            )
            .await?;

        if output.exists() {
            warn!("Overwriting existing output {}", output.display());
        }
        FileManager::move_file(&staged, &output).map_err(|e| RunError::Io(e.to_string()))?;
        run.release(&staged);
        let artifact = ArtifactHandle {
            path: output,
            size_bytes: success.artifact.size_bytes,
        };

        info!(
            "Output written: {} ({}, via '{}')",
            artifact.path.display(),
            FileManager::format_size(artifact.size_bytes),
            success.strategy_name
        );
        outputs.strategies.push((StageKind::Muxing, success.strategy_name));
        Ok(artifact)
    }
}
