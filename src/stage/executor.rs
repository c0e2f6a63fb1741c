use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{AttemptFailure, ProviderError, StageFailure, ValidationFailure};

use super::strategy::{StageStrategy, StrategyList};

/// Outcome of a stage that found a working strategy
#[derive(Debug, Clone)]
pub struct StageSuccess<A> {
    /// Validated artifact
    pub artifact: A,
    /// Zero-based index of the winning strategy
    pub strategy_index: usize,
    /// Name of the winning strategy
    pub strategy_name: String,
    /// Reasons the earlier strategies were rejected
    pub failed_attempts: Vec<(String, AttemptFailure)>,
}

/// Runs a ranked list of strategies until one yields a validated artifact
#[derive(Debug, Clone)]
pub struct StageExecutor {
    /// Pause between consecutive attempts for stages that want one
    retry_delay: Duration,
}

impl Default for StageExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl StageExecutor {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// Try every strategy of `strategies` in order.
    ///
    /// `invoke` runs the external tool for one strategy and `validate` turns
    /// its output into a trusted artifact. Each attempt runs under the
    /// strategy's timeout; a timed-out attempt is dropped, which kills any
    /// child process spawned with `kill_on_drop`. Failed attempts may leave
    /// partial files behind; removing them is the caller's job.
    ///
    /// Never panics past this boundary: exhaustion and cancellation are both
    /// reported as a `StageFailure` listing one reason per attempt.
    pub async fn execute<T, A, I, Fut, V>(
        &self,
        strategies: &StrategyList,
        mut invoke: I,
        mut validate: V,
        cancel: &CancellationToken,
    ) -> Result<StageSuccess<A>, StageFailure>
    where
        I: FnMut(&StageStrategy) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        V: FnMut(T) -> Result<A, ValidationFailure>,
    {
        let stage = strategies.stage();
        let total = strategies.len();
        let mut attempts: Vec<(String, AttemptFailure)> = Vec::with_capacity(total);

        for (index, strategy) in strategies.iter().enumerate() {
            if index > 0 && stage.waits_between_attempts() && !self.retry_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        attempts.push((strategy.name.clone(), AttemptFailure::Interrupted));
                        return Err(StageFailure { stage, attempts });
                    }
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }

            if cancel.is_cancelled() {
                attempts.push((strategy.name.clone(), AttemptFailure::Interrupted));
                return Err(StageFailure { stage, attempts });
            }

            info!("Trying {} method {}/{} ({})...", stage, index + 1, total, strategy.name);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AttemptFailure::Interrupted),
                result = tokio::time::timeout(strategy.timeout, invoke(strategy)) => match result {
                    Err(_) => Err(AttemptFailure::Timeout(strategy.timeout)),
                    Ok(Err(e)) => Err(AttemptFailure::from(e)),
                    Ok(Ok(output)) => validate(output).map_err(AttemptFailure::from),
                },
            };

            match outcome {
                Ok(artifact) => {
                    debug!("{} succeeded with strategy '{}'", stage, strategy.name);
                    return Ok(StageSuccess {
                        artifact,
                        strategy_index: index,
                        strategy_name: strategy.name.clone(),
                        failed_attempts: attempts,
                    });
                }
                Err(AttemptFailure::Interrupted) => {
                    warn!("{} interrupted during method {}/{}", stage, index + 1, total);
                    attempts.push((strategy.name.clone(), AttemptFailure::Interrupted));
                    return Err(StageFailure { stage, attempts });
                }
                Err(failure) => {
                    warn!(
                        "{} method {}/{} failed: {}",
                        stage,
                        index + 1,
                        total,
                        truncate_reason(&failure.to_string(), 160)
                    );
                    attempts.push((strategy.name.clone(), failure));
                }
            }
        }

        Err(StageFailure { stage, attempts })
    }
}

fn truncate_reason(reason: &str, max_chars: usize) -> String {
    if reason.chars().count() > max_chars {
        format!("{}...", reason.chars().take(max_chars).collect::<String>())
    } else {
        reason.to_string()
    }
}
