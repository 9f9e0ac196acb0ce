use crate::model::CallContext;
use crate::store::error::{GraphError, GraphResult};
use crate::store::query::Statement;
use log::{error, warn};
use std::future::Future;
use std::time::Duration;

/// Decides whether a failed statement may be re-run as a whole
pub type TransientClassifier = fn(&GraphError) -> bool;

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded retry of single mutating statements.
///
/// Attempts are numbered from 1. A failure is retried while the classifier
/// reports it transient and the attempt ceiling has not been reached; the
/// final error is returned wrapped with the failing statement.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    classifier: TransientClassifier,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            classifier: GraphError::is_transient,
        }
    }

    /// A policy that runs every statement exactly once
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_classifier(mut self, classifier: TransientClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn should_retry(&self, err: &GraphError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.classifier)(err)
    }

    /// Exponential backoff before attempt `attempt + 1`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    /// `op` receives the current attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &CallContext,
        statement: &Statement,
        mut op: F,
    ) -> GraphResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GraphResult<T>>,
    {
        let mut attempt = 1;
        loop {
            if ctx.is_expired() {
                return Err(GraphError::DeadlineExceeded.with_statement(&statement.text));
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "[{}] {} failed on attempt {}/{}, retrying in {:?}: {}",
                        ctx.request_id,
                        statement.op.name(),
                        attempt,
                        self.max_attempts,
                        delay,
                        err
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "[{}] {} failed on attempt {}/{}: {} (statement: {})",
                        ctx.request_id,
                        statement.op.name(),
                        attempt,
                        self.max_attempts,
                        err,
                        statement.text
                    );
                    return Err(err.with_statement(&statement.text));
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(20))
    }
}
