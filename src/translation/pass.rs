use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::RunError;
use crate::pipeline::types::{FallbackReason, TimeSlot, TranscriptSegment, TranslationOutcome, Utterance};
use crate::providers::Translator;

use super::cache::TranslationCache;

/// Counters of one translation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Utterances produced
    pub total: usize,
    /// Utterances with a real translation
    pub translated: usize,
    /// Utterances that kept their source text
    pub fallbacks: usize,
    /// Segments dropped for empty text or unusable timing
    pub skipped: usize,
    /// Translations served from the cache
    pub cache_hits: usize,
}

/// Result of a translation pass
#[derive(Debug, Clone)]
pub struct TranslatedSegments {
    pub utterances: Vec<Utterance>,
    pub stats: TranslationStats,
}

/// Translates transcript segments one request per segment, with bounded
/// concurrency and output in transcript order
#[derive(Debug, Clone)]
pub struct TranslationPass {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    concurrent_requests: usize,
}

/// A segment ready for translation
struct PendingSegment {
    slot: TimeSlot,
    text: String,
}

impl TranslationPass {
    pub fn new(translator: Arc<dyn Translator>, cache: TranslationCache, concurrent_requests: usize) -> Self {
        Self {
            translator,
            cache,
            concurrent_requests: concurrent_requests.max(1),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Drop segments that carry nothing to speak or whose timing is invalid
    fn prepare(segments: &[TranscriptSegment]) -> (Vec<PendingSegment>, usize) {
        let mut skipped = 0;
        let pending = segments
            .iter()
            .enumerate()
            .filter_map(|(i, segment)| {
                let text = segment.text.trim();
                if text.is_empty() {
                    skipped += 1;
                    return None;
                }
                match TimeSlot::new(segment.start, segment.end) {
                    Ok(slot) => Some(PendingSegment {
                        slot,
                        text: text.to_string(),
                    }),
                    Err(e) => {
                        warn!("Dropping segment {}: {}", i, e);
                        skipped += 1;
                        None
                    }
                }
            })
            .collect();
        (pending, skipped)
    }

    async fn translate_one(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
        cancel: &CancellationToken,
    ) -> (TranslationOutcome, bool) {
        let cache_source = source_language.unwrap_or("auto");
        if let Some(cached) = self.cache.get(text, cache_source, target_language) {
            return (TranslationOutcome::Translated(cached), true);
        }

        if cancel.is_cancelled() {
            return (fallback(text, FallbackReason::Cancelled), false);
        }

        let outcome = match self.translator.translate(text, source_language, target_language).await {
            Err(e) => {
                warn!("Translation failed, keeping source text: {}", e);
                fallback(text, FallbackReason::Backend(e.to_string()))
            }
            Ok(translated) => {
                let translated = translated.trim();
                if translated.is_empty() {
                    fallback(text, FallbackReason::EmptyResponse)
                } else if translated == text {
                    fallback(text, FallbackReason::Unchanged)
                } else {
                    self.cache.store(text, cache_source, target_language, translated);
                    TranslationOutcome::Translated(translated.to_string())
                }
            }
        };
        (outcome, false)
    }

    /// Translate every usable segment of a transcript.
    ///
    /// Per-segment failures become tagged fallbacks. Only cancellation fails
    /// the pass; partial results are discarded in that case.
    pub async fn run<F>(
        &self,
        segments: &[TranscriptSegment],
        source_language: Option<&str>,
        target_language: &str,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<TranslatedSegments, RunError>
    where
        F: Fn(usize, usize),
    {
        let (pending, skipped) = Self::prepare(segments);
        let total = pending.len();
        debug!("Translating {} segment(s), {} skipped, {} at a time", total, skipped, self.concurrent_requests);

        let mut results = stream::iter(pending.iter())
            .map(|segment| async move {
                let (outcome, from_cache) = self
                    .translate_one(&segment.text, source_language, target_language, cancel)
                    .await;
                (segment, outcome, from_cache)
            })
            .buffered(self.concurrent_requests);

        let mut stats = TranslationStats {
            skipped,
            ..TranslationStats::default()
        };
        let mut utterances = Vec::with_capacity(total);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Translation interrupted after {}/{} segment(s)", utterances.len(), total);
                    return Err(RunError::Interrupted);
                }
                next = results.next() => next,
            };
            let Some((segment, outcome, from_cache)) = next else {
                break;
            };

            if from_cache {
                stats.cache_hits += 1;
            }
            if outcome.is_translated() {
                stats.translated += 1;
            } else {
                stats.fallbacks += 1;
            }
            utterances.push(Utterance::new(segment.slot, segment.text.clone(), outcome));
            progress(utterances.len(), total);
        }

        stats.total = utterances.len();
        info!(
            "Translated {}/{} segment(s) via {} ({} fallback, {} cached)",
            stats.translated,
            stats.total,
            self.translator.name(),
            stats.fallbacks,
            stats.cache_hits
        );

        Ok(TranslatedSegments { utterances, stats })
    }
}

fn fallback(text: &str, reason: FallbackReason) -> TranslationOutcome {
    TranslationOutcome::Fallback {
        text: text.to_string(),
        reason,
    }
}
