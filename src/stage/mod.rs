/*!
 * Ranked-fallback execution of external tools.
 *
 * A stage (acquisition, extraction, muxing) owns an ordered `StrategyList`.
 * The `StageExecutor` tries each strategy in turn, under its own timeout,
 * and accepts the first one whose artifact passes validation.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

pub use self::executor::{StageExecutor, StageSuccess};
pub use self::strategy::{StageStrategy, StrategyList};

pub mod executor;
pub mod strategy;

/// Pipeline stages that run through the strategy executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Fetching the source media
    Acquisition,
    /// Pulling a PCM track out of the media
    Extraction,
    /// Combining the original video with the new audio
    Muxing,
}

impl StageKind {
    /// Acquisition talks to rate-limited remote services; the local stages
    /// retry immediately.
    pub fn waits_between_attempts(&self) -> bool {
        matches!(self, Self::Acquisition)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Acquisition => "download",
            Self::Extraction => "audio extraction",
            Self::Muxing => "muxing",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
