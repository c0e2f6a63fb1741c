/*!
 * Error types for the revoice application.
 *
 * This module contains custom error types for the different parts of a run,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::stage::StageKind;

/// Errors that can occur when talking to an external backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing a backend response fails
    #[error("Failed to parse backend response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// An external program could not be started
    #[error("Failed to launch {program}: {message}")]
    LaunchFailed {
        /// Program name
        program: String,
        /// OS error text
        message: String,
    },

    /// An external program exited with a failure status
    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        /// Program name
        program: String,
        /// Exit status description
        status: String,
        /// Filtered stderr output
        stderr: String,
    },

    /// The backend answered but produced nothing usable
    #[error("Backend returned an empty result: {0}")]
    EmptyResult(String),

    /// The backend did not answer in time
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),
}

/// An artifact exists in a form the next stage cannot trust
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// Nothing was written at the expected location
    #[error("artifact not found: {0}")]
    Missing(PathBuf),

    /// Something exists but is not a regular file
    #[error("artifact is not a regular file: {0}")]
    NotAFile(PathBuf),

    /// File is present but below the size threshold
    #[error("artifact {path} is too small ({size} bytes, need more than {min})")]
    TooSmall {
        /// Artifact path
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Threshold in bytes
        min: u64,
    },
}

/// Why a single strategy attempt was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// The attempt exceeded its strategy-specific timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The external tool could not be run or reported an error
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// The tool ran but its artifact did not pass validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// The run was cancelled while this attempt was in flight
    #[error("interrupted")]
    Interrupted,
}

impl From<ProviderError> for AttemptFailure {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(after) => Self::Timeout(after),
            other => Self::Invocation(other.to_string()),
        }
    }
}

/// Every strategy of a stage was exhausted without a validated artifact
#[derive(Error, Debug, Clone, PartialEq)]
pub struct StageFailure {
    /// Stage that ran out of strategies
    pub stage: StageKind,
    /// Failure reasons, one per attempted strategy, in strategy order
    pub attempts: Vec<(String, AttemptFailure)>,
}

impl StageFailure {
    /// Whether the stage stopped because the run was cancelled
    pub fn is_interrupted(&self) -> bool {
        matches!(self.attempts.last(), Some((_, AttemptFailure::Interrupted)))
    }

    /// Count of attempts that ended in a timeout
    pub fn timeout_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|(_, failure)| matches!(failure, AttemptFailure::Timeout(_)))
            .count()
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed after {} attempt(s)", self.stage, self.attempts.len())?;
        for (i, (name, reason)) in self.attempts.iter().enumerate() {
            write!(f, "; #{} {}: {}", i + 1, name, reason)?;
        }
        Ok(())
    }
}

/// Failures of the timeline assembly
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResynthesisFailure {
    /// There were no utterances to place
    #[error("no segments to resynthesize")]
    NoSegments,

    /// Every clip was absent, empty, or skipped
    #[error("no speech clips were produced")]
    NoClipsProduced,

    /// The run was cancelled during assembly
    #[error("resynthesis interrupted")]
    Interrupted,

    /// The assembled track could not be written
    #[error("failed to export assembled track: {0}")]
    Export(String),
}

/// Run-level failure reasons
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    /// An external tool exhausted all its strategies
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// An artifact produced outside the strategy executor was rejected
    #[error("{0}")]
    Validation(#[from] ValidationFailure),

    /// The timeline could not be assembled
    #[error("{0}")]
    Resynthesis(#[from] ResynthesisFailure),

    /// A single-shot stage did not finish in time
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// Stage label
        stage: String,
        /// Configured limit
        after: Duration,
    },

    /// The run was cancelled from outside
    #[error("interrupted")]
    Interrupted,

    /// Transcription produced no usable segments
    #[error("no speech segments found in audio")]
    EmptyTranscription,

    /// Translation produced no utterances
    #[error("no segments were translated")]
    EmptyTranslation,

    /// A backend failed in a stage without a fallback
    #[error("backend error: {0}")]
    Backend(#[from] ProviderError),

    /// Filesystem bookkeeping failed
    #[error("file error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RunError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl RunError {
    /// Whether this failure was caused by cancellation
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupted | Self::Resynthesis(ResynthesisFailure::Interrupted) => true,
            Self::Stage(failure) => failure.is_interrupted(),
            _ => false,
        }
    }
}
