//! Retrying provider-side operations
//!
//! The SDK already retries individual API calls. The helpers here retry whole
//! operations on errors that only clear with time, e.g. eventual consistency
//! after creating a dependency.

pub mod retryer;
pub mod state;

pub use retryer::{add_is_error_retryables, ErrorRetryClassifier, IsErrorRetryables, Ternary};
pub use state::StateChangeConf;

use crate::errs::{err_code_equals, is_not_found, Error, Result};
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use tokio::time::{self, Instant};

pub(crate) const INITIAL_DELAY: Duration = Duration::from_millis(100);
pub(crate) const MAX_DELAY: Duration = Duration::from_secs(10);

/// How long [`retry_on_aws_code`] keeps trying
pub const RETRY_ON_AWS_CODE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Delays starting at 100ms and doubling up to 10s, without jitter and
/// without an attempt limit. Callers stop on their own deadline.
pub(crate) fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBuilder::default()
        .with_min_delay(INITIAL_DELAY)
        .with_max_delay(MAX_DELAY)
        .with_factor(2.0)
        .without_max_times()
        .build()
}

/// Sleeps for `duration`, or returns `Cancelled` as soon as the context is.
pub(crate) async fn sleep(ctx: &Context, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = time::sleep(duration) => Ok(()),
        _ = ctx.cancelled() => Err(Error::Cancelled),
    }
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or `timeout` elapses. A timed out retry gets one final attempt whose
/// result is returned as is.
pub async fn retry_when<T, F, Fut, P>(
    ctx: &Context,
    timeout: Duration,
    mut op: F,
    is_retryable: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut delays = backoff();
    let mut attempt = 1u32;

    loop {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => err,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(attempt, error = %err, "retry timed out, making final attempt");
            return op().await;
        }

        let delay = delays.next().unwrap_or(MAX_DELAY);
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retryable error, retrying"
        );
        sleep(ctx, delay.min(remaining)).await?;
        attempt += 1;
    }
}

/// Retries while the error carries the AWS error code `code`.
pub async fn retry_when_is_a<T, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    code: &str,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(ctx, timeout, op, |err| err_code_equals(err, code)).await
}

/// [`retry_when_is_a`] with a two minute timeout.
pub async fn retry_on_aws_code<T, F, Fut>(ctx: &Context, code: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when_is_a(ctx, RETRY_ON_AWS_CODE_TIMEOUT, code, op).await
}

pub fn timed_out(err: &Error) -> bool {
    matches!(err, Error::Timeout(_))
}

pub fn not_found(err: &Error) -> bool {
    is_not_found(err)
}
