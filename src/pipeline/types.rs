use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::AudioBuffer;

// @module: Data shared between the pipeline stages

/// Half-open `[start, end)` interval of the output timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    start: f64,
    end: f64,
}

/// Reasons a slot could not be built
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SlotError {
    #[error("slot bounds must be finite numbers")]
    NotFinite,
    #[error("slot start {0} is negative")]
    NegativeStart(f64),
    #[error("slot end {end} must be after start {start}")]
    EndNotAfterStart { start: f64, end: f64 },
}

impl TimeSlot {
    pub fn new(start: f64, end: f64) -> Result<Self, SlotError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SlotError::NotFinite);
        }
        if start < 0.0 {
            return Err(SlotError::NegativeStart(start));
        }
        if end <= start {
            return Err(SlotError::EndNotAfterStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Start offset rounded to the nearest millisecond
    pub fn start_ms(&self) -> u64 {
        seconds_to_ms(self.start)
    }

    /// End offset rounded to the nearest millisecond
    pub fn end_ms(&self) -> u64 {
        seconds_to_ms(self.end)
    }

    /// Slot length rounded to the nearest millisecond.
    ///
    /// Very short slots may round to zero.
    pub fn duration_ms(&self) -> u64 {
        seconds_to_ms(self.end - self.start)
    }
}

/// Seconds to whole milliseconds, rounding half away from zero and clamping
/// negatives to zero
pub fn seconds_to_ms(seconds: f64) -> u64 {
    let ms = (seconds * 1000.0).round();
    if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 }
}

/// Why the source text was kept instead of a translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The backend answered with the source text unchanged
    Unchanged,
    /// The backend answered with nothing
    EmptyResponse,
    /// The backend failed
    Backend(String),
    /// The run was cancelled before this segment was translated
    Cancelled,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "translation identical to source"),
            Self::EmptyResponse => write!(f, "empty translation"),
            Self::Backend(message) => write!(f, "backend error: {}", message),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-utterance translation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    /// The source text is used verbatim
    Fallback { text: String, reason: FallbackReason },
}

impl TranslationOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Translated(text) => text,
            Self::Fallback { text, .. } => text,
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, Self::Translated(_))
    }
}

/// One spoken unit placed on the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub slot: TimeSlot,
    pub source_text: String,
    pub translation: TranslationOutcome,
}

impl Utterance {
    pub fn new(slot: TimeSlot, source_text: impl Into<String>, translation: TranslationOutcome) -> Self {
        Self {
            slot,
            source_text: source_text.into(),
            translation,
        }
    }

    /// Shorthand for an utterance whose translation succeeded
    pub fn translated(slot: TimeSlot, source_text: impl Into<String>, translated: impl Into<String>) -> Self {
        Self::new(slot, source_text, TranslationOutcome::Translated(translated.into()))
    }

    /// Text to be spoken: the translation, or the source on fallback
    pub fn translated_text(&self) -> &str {
        self.translation.text()
    }
}

/// Synthesized speech for one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub owner_utterance_index: usize,
    pub audio: AudioBuffer,
    pub duration_ms: u64,
}

impl SynthesizedClip {
    pub fn new(owner_utterance_index: usize, audio: AudioBuffer) -> Self {
        let duration_ms = audio.duration_ms();
        Self {
            owner_utterance_index,
            audio,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

/// Timed text produced by the speech-to-text backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Seconds
    pub start: f64,
    /// Seconds
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub detected_language: Option<String>,
}
