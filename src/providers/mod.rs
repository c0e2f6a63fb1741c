/*!
 * Backends the pipeline drives.
 *
 * Every external collaborator sits behind an async trait so the orchestrator
 * can be run against the real tools or against the mocks in `mock`:
 * - `MediaFetcher`: yt-dlp, or a local file copied into the run area
 * - `AudioExtractor` and `Muxer`: ffmpeg
 * - `Transcriber`: the whisper CLI
 * - `Translator`: Ollama or Anthropic
 * - `SpeechSynthesizer`: any command-line TTS writing a WAV file
 */

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::audio::AudioBuffer;
use crate::errors::ProviderError;
use crate::pipeline::types::Transcript;
use crate::stage::StageStrategy;

/// Media fetched into the run area
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    /// Local path of the downloaded or copied file
    pub path: PathBuf,
    /// Free-form details reported by the backend
    pub metadata: BTreeMap<String, String>,
}

/// Acquires the source media
#[async_trait]
pub trait MediaFetcher: Send + Sync + Debug {
    /// Fetch `source_ref` into `work_dir` using one strategy
    async fn fetch(
        &self,
        source_ref: &str,
        strategy: &StageStrategy,
        work_dir: &Path,
    ) -> Result<FetchedMedia, ProviderError>;
}

/// Pulls a PCM track out of a media file
#[async_trait]
pub trait AudioExtractor: Send + Sync + Debug {
    async fn extract(
        &self,
        video: &Path,
        strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError>;
}

/// Speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    /// Transcribe `audio`, optionally hinting the spoken language
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, ProviderError>;
}

/// Machine translation of a single segment
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    async fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, ProviderError>;

    /// Short backend name for logs and cache keys
    fn name(&self) -> &str;
}

/// Text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Speak `text` in `language`, writing the clip to `output` and returning
    /// its samples
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: &Path,
    ) -> Result<AudioBuffer, ProviderError>;
}

/// Combines the source video with a new audio track
#[async_trait]
pub trait Muxer: Send + Sync + Debug {
    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError>;
}

/// Path as a command-line argument
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub mod anthropic;
pub mod ffmpeg;
pub mod mock;
pub mod ollama;
pub mod tts;
pub mod whisper;
pub mod ytdlp;
