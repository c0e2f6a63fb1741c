/*!
 * Scripted backends for tests.
 *
 * Each mock follows a `MockBehavior`:
 * - `Working`: produces a plausible artifact
 * - `Failing`: always returns an error
 * - `Intermittent`: fails on every Nth call
 * - `Empty`: succeeds but produces nothing usable
 * - `Slow`: waits before behaving like `Working`
 */

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::wav::write_wav;
use crate::audio::AudioBuffer;
use crate::errors::ProviderError;
use crate::pipeline::types::{Transcript, TranscriptSegment};
use crate::stage::StageStrategy;

use super::{AudioExtractor, FetchedMedia, MediaFetcher, Muxer, SpeechSynthesizer, Transcriber, Translator};

/// Behavior mode shared by every mock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails on every Nth call (1-based)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds with an empty or undersized result
    Empty,
    /// Sleeps, then succeeds
    Slow { delay_ms: u64 },
}

/// Call counter plus behavior, shared by the mocks below
#[derive(Debug, Clone)]
struct Script {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

/// What a call should do after `Script::begin`
enum Outcome {
    Succeed,
    Fail(ProviderError),
    Empty,
}

impl Script {
    fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn begin(&self, what: &str) -> Outcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            MockBehavior::Working => Outcome::Succeed,
            MockBehavior::Intermittent { fail_every } if fail_every > 0 && call % fail_every == 0 => {
                Outcome::Fail(ProviderError::RequestFailed(format!("mock {} failure on call {}", what, call)))
            }
            MockBehavior::Intermittent { .. } => Outcome::Succeed,
            MockBehavior::Failing => Outcome::Fail(ProviderError::ConnectionError(format!("mock {} is down", what))),
            MockBehavior::Empty => Outcome::Empty,
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Outcome::Succeed
            }
        }
    }
}

fn write_bytes(path: &Path, len: usize) -> Result<(), ProviderError> {
    std::fs::write(path, vec![0x5a_u8; len]).map_err(|e| ProviderError::RequestFailed(e.to_string()))
}

/// Fetcher writing a fake media file into the work directory
#[derive(Debug, Clone)]
pub struct MockFetcher {
    script: Script,
    size: usize,
}

impl MockFetcher {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
            size: 4096,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(
        &self,
        source_ref: &str,
        strategy: &StageStrategy,
        work_dir: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        let path = work_dir.join("source.mp4");
        let size = match self.script.begin("fetcher").await {
            Outcome::Fail(e) => return Err(e),
            Outcome::Empty => 10,
            Outcome::Succeed => self.size,
        };
        write_bytes(&path, size)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), source_ref.to_string());
        metadata.insert("strategy".to_string(), strategy.name.clone());
        Ok(FetchedMedia { path, metadata })
    }
}

/// Extractor writing one second of silent 16 kHz WAV
#[derive(Debug, Clone)]
pub struct MockExtractor {
    script: Script,
}

impl MockExtractor {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl AudioExtractor for MockExtractor {
    async fn extract(
        &self,
        _video: &Path,
        _strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError> {
        match self.script.begin("extractor").await {
            Outcome::Fail(e) => return Err(e),
            Outcome::Empty => write_bytes(output, 0)?,
            Outcome::Succeed => write_wav(output, &AudioBuffer::silent(1000, 16000))
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?,
        }
        Ok(output.to_path_buf())
    }
}

/// Transcriber returning a fixed transcript
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    script: Script,
    transcript: Transcript,
}

impl MockTranscriber {
    pub fn new(behavior: MockBehavior, transcript: Transcript) -> Self {
        Self {
            script: Script::new(behavior),
            transcript,
        }
    }

    /// Working transcriber returning `(text, start, end)` segments
    pub fn with_segments(segments: &[(&str, f64, f64)]) -> Self {
        Self::new(
            MockBehavior::Working,
            Transcript {
                segments: segments
                    .iter()
                    .map(|(text, start, end)| TranscriptSegment {
                        text: text.to_string(),
                        start: *start,
                        end: *end,
                    })
                    .collect(),
                detected_language: Some("en".to_string()),
            },
        )
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        _audio: &Path,
        _language_hint: Option<&str>,
    ) -> Result<Transcript, ProviderError> {
        match self.script.begin("transcriber").await {
            Outcome::Fail(e) => Err(e),
            Outcome::Empty => Ok(Transcript::default()),
            Outcome::Succeed => Ok(self.transcript.clone()),
        }
    }
}

/// Translator prefixing text with the target language, e.g. `[fr] hello`
#[derive(Debug, Clone)]
pub struct MockTranslator {
    script: Script,
    echo: bool,
}

impl MockTranslator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
            echo: false,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Translator answering with the source text unchanged
    pub fn echo() -> Self {
        Self {
            script: Script::new(MockBehavior::Working),
            echo: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        match self.script.begin("translator").await {
            Outcome::Fail(e) => Err(e),
            Outcome::Empty => Ok(String::new()),
            Outcome::Succeed if self.echo => Ok(text.to_string()),
            Outcome::Succeed => Ok(format!("[{}] {}", target_language, text)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Synthesizer producing a tone whose length grows with the text
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    script: Script,
    sample_rate: u32,
    ms_per_char: u64,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
            sample_rate: 16000,
            ms_per_char: 60,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn with_ms_per_char(mut self, ms_per_char: u64) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _language: &str,
        output: &Path,
    ) -> Result<AudioBuffer, ProviderError> {
        let buffer = match self.script.begin("synthesizer").await {
            Outcome::Fail(e) => return Err(e),
            Outcome::Empty => AudioBuffer::from_samples(Vec::new(), self.sample_rate),
            Outcome::Succeed => {
                let ms = text.chars().count() as u64 * self.ms_per_char;
                let len = crate::audio::buffer::ms_to_samples(ms, self.sample_rate);
                let samples = (0..len)
                    .map(|i| 0.3 * (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / self.sample_rate as f32).sin())
                    .collect();
                AudioBuffer::from_samples(samples, self.sample_rate)
            }
        };
        write_wav(output, &buffer).map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(buffer)
    }
}

/// Muxer writing a fake container to the output path
#[derive(Debug, Clone)]
pub struct MockMuxer {
    script: Script,
}

impl MockMuxer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Muxer for MockMuxer {
    async fn mux(
        &self,
        _video: &Path,
        _audio: &Path,
        _strategy: &StageStrategy,
        output: &Path,
    ) -> Result<PathBuf, ProviderError> {
        match self.script.begin("muxer").await {
            Outcome::Fail(e) => {
                // leave a partial file behind like a crashed ffmpeg would
                write_bytes(output, 100)?;
                Err(e)
            }
            Outcome::Empty => {
                write_bytes(output, 10)?;
                Ok(output.to_path_buf())
            }
            Outcome::Succeed => {
                write_bytes(output, 8192)?;
                Ok(output.to_path_buf())
            }
        }
    }
}
