//! Sequential model failover
//!
//! Candidates are tried strictly in priority order, one at a time. Each
//! attempt runs under its own deadline; expiry drops the in-flight future,
//! which aborts that network call and nothing else.
//!
//! Terminal rules:
//! - 2xx: stop and return the response
//! - 401/403: stop immediately, the credential is shared by every candidate
//! - 429 on the final candidate: stop with a retry-after hint
//! - anything else: record the failure and move to the next candidate

use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::metrics::{AttemptLabel, Metrics};
use crate::middleware::RequestId;
use crate::models::{ModelCandidates, ModelId};
use crate::upstream::{
    BackendError, FragmentStream, GenerationRequest, GenerativeBackend, RawModelResponse,
};

/// Retry hint used when the upstream 429 carries no `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Upstream bodies are cut to this many characters in log lines
const LOGGED_BODY_CHARS: usize = 500;

/// How a failed attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Non-2xx answer
    Rejected { status: u16, body: String },
    /// Deadline expired before an answer (or first fragment)
    TimedOut { after: Duration },
    /// Network failure before any status
    Transport(String),
    /// 2xx answer that could not be decoded
    Undecodable(String),
    /// Stream ended before yielding any text
    EmptyStream,
}

impl AttemptOutcome {
    fn from_backend(error: BackendError) -> (Self, Option<u64>) {
        match error {
            BackendError::Status {
                status,
                body,
                retry_after,
            } => (AttemptOutcome::Rejected { status, body }, retry_after),
            BackendError::Transport(msg) => (AttemptOutcome::Transport(msg), None),
            BackendError::Decode(msg) => (AttemptOutcome::Undecodable(msg), None),
        }
    }

    fn label(&self) -> AttemptLabel {
        match self {
            AttemptOutcome::Rejected { .. } => AttemptLabel::Rejected,
            AttemptOutcome::TimedOut { .. } => AttemptLabel::TimedOut,
            AttemptOutcome::Transport(_) => AttemptLabel::Transport,
            AttemptOutcome::Undecodable(_) => AttemptLabel::Undecodable,
            AttemptOutcome::EmptyStream => AttemptLabel::EmptyStream,
        }
    }

    /// HTTP status, for rejected attempts
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Rejected { status, .. } => write!(f, "HTTP {}", status),
            AttemptOutcome::TimedOut { after } => {
                write!(f, "timed out after {}s", after.as_secs_f64())
            }
            AttemptOutcome::Transport(msg) => write!(f, "transport error: {}", msg),
            AttemptOutcome::Undecodable(msg) => write!(f, "undecodable response: {}", msg),
            AttemptOutcome::EmptyStream => write!(f, "stream ended without text"),
        }
    }
}

/// One failed attempt, kept for logs
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub model: ModelId,
    /// 1-based position in the candidate list
    pub attempt: usize,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// Why the failover chain produced no response
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("no model candidates configured")]
    NoCandidates,

    #[error("upstream rejected the API credential with HTTP {status} (model {model})")]
    AuthError { model: ModelId, status: u16 },

    #[error("upstream rate limited the final candidate {model}")]
    RateLimited {
        model: ModelId,
        retry_after: u64,
        failures: Vec<AttemptFailure>,
    },

    #[error("all {} model candidates failed", .failures.len())]
    AllModelsFailed { failures: Vec<AttemptFailure> },
}

impl InvocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvocationError::NoCandidates | InvocationError::AllModelsFailed { .. } => {
                ErrorKind::AllModelsFailed
            }
            InvocationError::AuthError { .. } => ErrorKind::AuthError,
            InvocationError::RateLimited { .. } => ErrorKind::RateLimited,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            InvocationError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Failures recorded before the chain stopped
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            InvocationError::RateLimited { failures, .. }
            | InvocationError::AllModelsFailed { failures } => failures,
            InvocationError::NoCandidates | InvocationError::AuthError { .. } => &[],
        }
    }
}

/// Successful non-streaming invocation
#[derive(Debug)]
pub struct Invocation {
    pub response: RawModelResponse,
    pub model: ModelId,
    pub attempt: usize,
    /// Failures of the candidates tried before `model`
    pub failures: Vec<AttemptFailure>,
}

/// A streaming candidate that delivered its first fragment
pub struct CommittedStream {
    pub model: ModelId,
    pub attempt: usize,
    pub failures: Vec<AttemptFailure>,
    first_fragment: String,
    rest: FragmentStream,
    idle_timeout: Duration,
    metrics: Arc<Metrics>,
    request_id: RequestId,
}

impl fmt::Debug for CommittedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommittedStream")
            .field("model", &self.model)
            .field("attempt", &self.attempt)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl CommittedStream {
    pub fn first_fragment(&self) -> &str {
        &self.first_fragment
    }

    /// All text fragments, the first one included
    ///
    /// A mid-stream error ends the stream; it is logged and counted, and
    /// fragments already yielded stay delivered. Each wait for the next
    /// fragment gets the attempt deadline again, and a stall past it ends the
    /// stream the same way, dropping the upstream connection.
    pub fn into_text_stream(self) -> BoxStream<'static, String> {
        let CommittedStream {
            model,
            first_fragment,
            rest,
            idle_timeout,
            metrics,
            request_id,
            ..
        } = self;

        let tail = stream::unfold(Some(rest), move |state| {
            let model = model.clone();
            let metrics = metrics.clone();
            async move {
                let mut rest = state?;
                match tokio::time::timeout(idle_timeout, rest.next()).await {
                    Ok(Some(Ok(fragment))) => Some((fragment, Some(rest))),
                    Ok(Some(Err(e))) => {
                        metrics.stream_interruption(&model);
                        tracing::error!(
                            request_id = %request_id,
                            model = %model,
                            error = %e,
                            "Stream interrupted after commit, ending response early"
                        );
                        None
                    }
                    Ok(None) => {
                        tracing::debug!(request_id = %request_id, model = %model, "Stream finished");
                        None
                    }
                    Err(_) => {
                        metrics.stream_interruption(&model);
                        tracing::error!(
                            request_id = %request_id,
                            model = %model,
                            idle_seconds = idle_timeout.as_secs(),
                            "Stream stalled after commit, ending response early"
                        );
                        None
                    }
                }
            }
        });

        stream::iter(std::iter::once(first_fragment))
            .chain(tail)
            .boxed()
    }
}

struct AttemptContext<'a> {
    model: &'a ModelId,
    attempt: usize,
    is_last: bool,
    started: Instant,
    request_id: RequestId,
}

/// Failover strategy over a [`GenerativeBackend`]
#[derive(Clone)]
pub struct FailoverInvoker {
    backend: Arc<dyn GenerativeBackend>,
    metrics: Arc<Metrics>,
}

impl FailoverInvoker {
    pub fn new(backend: Arc<dyn GenerativeBackend>, metrics: Arc<Metrics>) -> Self {
        Self { backend, metrics }
    }

    /// Run `request` against `candidates` in order until one answers
    pub async fn invoke(
        &self,
        request: &GenerationRequest,
        candidates: &ModelCandidates,
        timeout: Duration,
        request_id: RequestId,
    ) -> Result<Invocation, InvocationError> {
        if candidates.is_empty() {
            return Err(InvocationError::NoCandidates);
        }

        let total = candidates.len();
        let mut failures = Vec::new();

        for (index, model) in candidates.iter().enumerate() {
            let ctx = AttemptContext {
                model,
                attempt: index + 1,
                is_last: index + 1 == total,
                started: Instant::now(),
                request_id,
            };

            tracing::info!(
                request_id = %request_id,
                model = %model,
                attempt = ctx.attempt,
                total,
                timeout_seconds = timeout.as_secs(),
                "Trying model"
            );

            let (outcome, retry_after) =
                match tokio::time::timeout(timeout, self.backend.generate(model, request)).await {
                    Ok(Ok(response)) => {
                        self.record_success(&ctx);
                        return Ok(Invocation {
                            response,
                            model: model.clone(),
                            attempt: ctx.attempt,
                            failures,
                        });
                    }
                    Ok(Err(e)) => AttemptOutcome::from_backend(e),
                    Err(_) => (AttemptOutcome::TimedOut { after: timeout }, None),
                };

            if let Some(stop) = self.settle_failure(&ctx, outcome, retry_after, &mut failures) {
                return Err(stop);
            }
        }

        self.log_exhausted(&failures, request_id);
        Err(InvocationError::AllModelsFailed { failures })
    }

    /// Open a stream on the first candidate that delivers a text fragment
    ///
    /// The attempt deadline covers the call and the wait for the first
    /// fragment, then bounds every later wait between fragments. Once a
    /// candidate commits no other candidate is tried.
    pub async fn open_stream(
        &self,
        request: &GenerationRequest,
        candidates: &ModelCandidates,
        timeout: Duration,
        request_id: RequestId,
    ) -> Result<CommittedStream, InvocationError> {
        if candidates.is_empty() {
            return Err(InvocationError::NoCandidates);
        }

        let total = candidates.len();
        let mut failures = Vec::new();

        for (index, model) in candidates.iter().enumerate() {
            let ctx = AttemptContext {
                model,
                attempt: index + 1,
                is_last: index + 1 == total,
                started: Instant::now(),
                request_id,
            };

            tracing::info!(
                request_id = %request_id,
                model = %model,
                attempt = ctx.attempt,
                total,
                "Trying streaming model"
            );

            let first = async {
                let mut fragments = self.backend.stream(model, request).await?;
                while let Some(item) = fragments.next().await {
                    let fragment = item?;
                    if !fragment.is_empty() {
                        return Ok(Some((fragment, fragments)));
                    }
                }
                Ok::<_, BackendError>(None)
            };

            let (outcome, retry_after) = match tokio::time::timeout(timeout, first).await {
                Ok(Ok(Some((first_fragment, rest)))) => {
                    self.record_success(&ctx);
                    return Ok(CommittedStream {
                        model: model.clone(),
                        attempt: ctx.attempt,
                        failures,
                        first_fragment,
                        rest,
                        idle_timeout: timeout,
                        metrics: self.metrics.clone(),
                        request_id,
                    });
                }
                Ok(Ok(None)) => (AttemptOutcome::EmptyStream, None),
                Ok(Err(e)) => AttemptOutcome::from_backend(e),
                Err(_) => (AttemptOutcome::TimedOut { after: timeout }, None),
            };

            if let Some(stop) = self.settle_failure(&ctx, outcome, retry_after, &mut failures) {
                return Err(stop);
            }
        }

        self.log_exhausted(&failures, request_id);
        Err(InvocationError::AllModelsFailed { failures })
    }

    fn record_success(&self, ctx: &AttemptContext<'_>) {
        let elapsed = ctx.started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        self.metrics.record_or_log(
            "record_attempt",
            self.metrics.record_attempt(ctx.model, AttemptLabel::Success),
        );
        self.metrics.record_or_log(
            "record_upstream_latency",
            self.metrics.record_upstream_latency(ctx.model, elapsed_ms),
        );

        tracing::info!(
            request_id = %ctx.request_id,
            model = %ctx.model,
            attempt = ctx.attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Model answered"
        );
    }

    /// Record a failed attempt; `Some` means the chain must stop
    fn settle_failure(
        &self,
        ctx: &AttemptContext<'_>,
        outcome: AttemptOutcome,
        retry_after: Option<u64>,
        failures: &mut Vec<AttemptFailure>,
    ) -> Option<InvocationError> {
        let elapsed = ctx.started.elapsed();
        self.metrics.record_or_log(
            "record_attempt",
            self.metrics.record_attempt(ctx.model, outcome.label()),
        );

        if let AttemptOutcome::Rejected { status, body } = &outcome {
            if matches!(status, 401 | 403) {
                tracing::error!(
                    request_id = %ctx.request_id,
                    model = %ctx.model,
                    status,
                    body = %truncate_body(body),
                    "Upstream rejected the API credential, not trying further candidates"
                );
                return Some(InvocationError::AuthError {
                    model: ctx.model.clone(),
                    status: *status,
                });
            }
        }

        let body = match &outcome {
            AttemptOutcome::Rejected { body, .. } => truncate_body(body),
            _ => String::new(),
        };
        tracing::warn!(
            request_id = %ctx.request_id,
            model = %ctx.model,
            attempt = ctx.attempt,
            outcome = %outcome,
            body = %body,
            elapsed_ms = elapsed.as_millis() as u64,
            "Model attempt failed"
        );

        let rate_limited = outcome.status() == Some(429);
        failures.push(AttemptFailure {
            model: ctx.model.clone(),
            attempt: ctx.attempt,
            outcome,
            elapsed,
        });

        if rate_limited && ctx.is_last {
            return Some(InvocationError::RateLimited {
                model: ctx.model.clone(),
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                failures: std::mem::take(failures),
            });
        }
        None
    }

    fn log_exhausted(&self, failures: &[AttemptFailure], request_id: RequestId) {
        let summary: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.model, f.outcome))
            .collect();
        tracing::error!(
            request_id = %request_id,
            attempts = failures.len(),
            failures = ?summary,
            "All model candidates failed"
        );
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= LOGGED_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(LOGGED_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_status_maps_to_rejected_with_retry_hint() {
        let (outcome, retry) = AttemptOutcome::from_backend(BackendError::Status {
            status: 429,
            body: "quota".to_string(),
            retry_after: Some(12),
        });
        assert_eq!(outcome.status(), Some(429));
        assert_eq!(retry, Some(12));
        assert_eq!(outcome.to_string(), "HTTP 429");
    }

    #[test]
    fn test_invocation_error_kinds() {
        assert_eq!(InvocationError::NoCandidates.kind(), ErrorKind::AllModelsFailed);
        assert_eq!(
            InvocationError::AuthError {
                model: ModelId::from("m"),
                status: 403
            }
            .kind(),
            ErrorKind::AuthError
        );
        let limited = InvocationError::RateLimited {
            model: ModelId::from("m"),
            retry_after: 30,
            failures: Vec::new(),
        };
        assert_eq!(limited.kind(), ErrorKind::RateLimited);
        assert_eq!(limited.retry_after(), Some(30));
    }

    #[test]
    fn test_long_bodies_are_truncated_for_logs() {
        let body = "x".repeat(LOGGED_BODY_CHARS + 10);
        let cut = truncate_body(&body);
        assert_eq!(cut.chars().count(), LOGGED_BODY_CHARS + 3);
        assert_eq!(truncate_body("short"), "short");
    }
}
