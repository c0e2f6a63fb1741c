use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::RunError;
use crate::file_utils::ArtifactValidator;
use crate::providers::SpeechSynthesizer;

use super::types::{SynthesizedClip, Utterance};

/// Clips produced for a run, keyed by utterance index
#[derive(Debug, Clone, Default)]
pub struct SynthesizedClips {
    pub clips: BTreeMap<usize, SynthesizedClip>,
    /// Utterances whose synthesis failed or produced no audio
    pub absent: usize,
    /// Utterances with nothing to speak
    pub skipped: usize,
}

/// Speaks every utterance's translated text
#[derive(Debug, Clone)]
pub struct SynthesisPass {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sample_rate: u32,
    concurrent_jobs: usize,
    timeout: Duration,
}

impl SynthesisPass {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sample_rate: u32, concurrent_jobs: usize) -> Self {
        Self {
            synthesizer,
            sample_rate,
            concurrent_jobs: concurrent_jobs.max(1),
            timeout: Duration::from_secs(60),
        }
    }

    /// Limit for a single clip
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// File name of the clip for utterance `index`
    pub fn clip_file_name(index: usize) -> String {
        format!("speech_{:04}.wav", index)
    }

    async fn synthesize_one(&self, index: usize, text: &str, language: &str, path: PathBuf) -> Option<SynthesizedClip> {
        let audio = match tokio::time::timeout(self.timeout, self.synthesizer.synthesize(text, language, &path)).await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                warn!("Segment {}: speech synthesis failed: {}", index, e);
                return None;
            }
            Err(_) => {
                warn!("Segment {}: speech synthesis timed out after {:?}", index, self.timeout);
                return None;
            }
        };

        if let Err(e) = ArtifactValidator::non_empty().validate(&path) {
            warn!("Segment {}: {}", index, e);
            return None;
        }
        if audio.is_empty() {
            warn!("Segment {}: synthesizer produced zero-length audio", index);
            return None;
        }

        let audio = audio.resampled(self.sample_rate);
        debug!("Segment {}: {}ms of speech", index, audio.duration_ms());
        Some(SynthesizedClip::new(index, audio))
    }

    /// Synthesize the utterances, writing each clip to `clip_path(index)`.
    ///
    /// A failed utterance yields no clip; only cancellation fails the pass.
    pub async fn run<P, F>(
        &self,
        utterances: &[Utterance],
        language: &str,
        clip_path: P,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<SynthesizedClips, RunError>
    where
        P: Fn(usize) -> PathBuf,
        F: Fn(usize, usize),
    {
        let jobs: Vec<(usize, &str, PathBuf)> = utterances
            .iter()
            .enumerate()
            .filter(|(_, u)| !u.translated_text().trim().is_empty())
            .map(|(i, u)| (i, u.translated_text().trim(), clip_path(i)))
            .collect();
        let total = jobs.len();
        let mut result = SynthesizedClips {
            skipped: utterances.len() - total,
            ..SynthesizedClips::default()
        };

        let mut clips = stream::iter(jobs)
            .map(|(index, text, path)| async move { (index, self.synthesize_one(index, text, language, path).await) })
            .buffered(self.concurrent_jobs);

        let mut done = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Speech synthesis interrupted after {}/{} segment(s)", done, total);
                    return Err(RunError::Interrupted);
                }
                next = clips.next() => next,
            };
            let Some((index, clip)) = next else {
                break;
            };

            match clip {
                Some(clip) => {
                    result.clips.insert(index, clip);
                }
                None => result.absent += 1,
            }
            done += 1;
            progress(done, total);
        }

        info!("Synthesized {}/{} segment(s)", result.clips.len(), total);
        if result.absent > 0 {
            warn!("{} segment(s) will be left silent", result.absent);
        }
        Ok(result)
    }
}
