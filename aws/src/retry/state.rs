//! Waiting for asynchronous operations to settle
//!
//! `StateChangeConf` polls a refresh function until the object it returns
//! reaches a target state. Create/delete waiters for long-running AWS
//! operations are built on it.

use super::{backoff, sleep, MAX_DELAY};
use crate::errs::{Error, NotFoundError, Result, TimeoutError, UnexpectedStateError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use tokio::time::{self, Instant};

pub const DEFAULT_NOT_FOUND_CHECKS: usize = 20;

type RefreshFn<'a, T> = Box<dyn Fn() -> BoxFuture<'a, Result<Option<(T, String)>>> + Send + Sync + 'a>;
type FailureReasonFn<'a, T> = Box<dyn Fn(&T) -> Option<Error> + Send + Sync + 'a>;

pub struct StateChangeConf<'a, T> {
    pending: Vec<String>,
    target: Vec<String>,
    refresh: RefreshFn<'a, T>,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
    poll_interval: Option<Duration>,
    not_found_checks: usize,
    continuous_target_occurence: usize,
    failure_reason: Option<FailureReasonFn<'a, T>>,
}

impl<'a, T: Send + 'a> StateChangeConf<'a, T> {
    /// `refresh` returns the object and its state, or `None` when the object
    /// does not exist.
    pub fn new<F, Fut>(pending: &[&str], target: &[&str], timeout: Duration, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<Option<(T, String)>>> + Send + 'a,
    {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            refresh: Box::new(move || refresh().boxed()),
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
            failure_reason: None,
        }
    }

    /// Wait before the first refresh.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Smallest wait between refreshes.
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Fixed wait between refreshes instead of exponential backoff.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn not_found_checks(mut self, checks: usize) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Number of consecutive refreshes that must report a target state.
    pub fn continuous_target_occurence(mut self, occurences: usize) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Extracts the error the service reports for an object, attached to
    /// unexpected state and timeout errors.
    pub fn failure_reason<F>(mut self, reason: F) -> Self
    where
        F: Fn(&T) -> Option<Error> + Send + Sync + 'a,
    {
        self.failure_reason = Some(Box::new(reason));
        self
    }

    /// Polls until a target state is reached. Returns `None` when the target
    /// is empty and the object is gone.
    pub async fn wait_for_state(&self, ctx: &Context) -> Result<Option<T>> {
        let deadline = Instant::now() + self.timeout;
        if !self.delay.is_zero() {
            sleep(ctx, self.delay).await?;
        }

        let mut delays = backoff();
        let mut wait = Duration::ZERO;
        let mut not_found = 0usize;
        let mut target_occurence = 0usize;
        let mut last_state = String::new();
        let mut last_error: Option<Error> = None;

        loop {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let refreshed = tokio::select! {
                refreshed = time::timeout_at(deadline, (self.refresh)()) => refreshed,
                _ = ctx.cancelled() => return Err(Error::Cancelled),
            };
            let Ok(refreshed) = refreshed else {
                return Err(self.timeout_error(last_state, last_error));
            };

            match refreshed? {
                None => {
                    target_occurence = 0;
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(NotFoundError {
                            message: format!("couldn't find resource ({} retries)", not_found),
                            last_error: last_error.map(Box::new),
                        }
                        .into());
                    }
                }
                Some((object, state)) => {
                    not_found = 0;
                    last_error = self.failure_reason.as_ref().and_then(|f| f(&object));

                    if self.target.contains(&state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.contains(&state) {
                        target_occurence = 0;
                    } else {
                        return Err(UnexpectedStateError {
                            state,
                            expected: self.target.clone(),
                            last_error: last_error.map(Box::new),
                        }
                        .into());
                    }
                    tracing::trace!(state = %state, "waiting for state to change");
                    last_state = state;
                }
            }

            if target_occurence == 0 || wait.is_zero() {
                wait = delays.next().unwrap_or(MAX_DELAY);
            }
            let wait = match self.poll_interval {
                Some(interval) => interval,
                None => wait.max(self.min_timeout),
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error(last_state, last_error));
            }
            sleep(ctx, wait.min(remaining)).await?;
        }
    }

    fn timeout_error(&self, last_state: String, last_error: Option<Error>) -> Error {
        tracing::warn!(timeout = ?self.timeout, last_state = %last_state, "wait for state timed out");
        TimeoutError {
            last_state,
            expected: self.target.clone(),
            timeout: self.timeout,
            last_error: last_error.map(Box::new),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errs::is_not_found;
    use std::sync::Mutex;

    /// Refresh results handed out in order; the last one repeats.
    fn script(states: &[Option<&str>]) -> Mutex<Vec<Option<String>>> {
        Mutex::new(states.iter().rev().map(|s| s.map(String::from)).collect())
    }

    fn next(states: &Mutex<Vec<Option<String>>>) -> Option<(String, String)> {
        let mut states = states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop().unwrap()
        } else {
            states[0].clone()
        };
        state.map(|s| (format!("object-{}", s), s))
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target() {
        let states = &script(&[Some("IN_PROGRESS"), Some("IN_PROGRESS"), Some("SUCCEEDED")]);
        let conf = StateChangeConf::new(
            &["IN_PROGRESS"],
            &["SUCCEEDED"],
            Duration::from_secs(60),
            move || async move { Ok(next(states)) },
        );

        let object = conf.wait_for_state(&Context::new()).await.unwrap();
        assert_eq!(object.as_deref(), Some("object-SUCCEEDED"));
    }

    #[tokio::test(start_paused = true)]
    async fn gone_is_success_without_target() {
        let states = &script(&[Some("DELETING"), None]);
        let conf = StateChangeConf::new(&["DELETING"], &[], Duration::from_secs(60), move || async move {
            Ok(next(states))
        });

        assert!(conf.wait_for_state(&Context::new()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_carries_failure_reason() {
        let states = &script(&[Some("IN_PROGRESS"), Some("FAILED")]);
        let conf = StateChangeConf::new(
            &["IN_PROGRESS"],
            &["SUCCEEDED"],
            Duration::from_secs(60),
            move || async move { Ok(next(states)) },
        )
        .failure_reason(|object: &String| {
            object
                .ends_with("FAILED")
                .then(|| Error::Message("manifest is invalid".into()))
        });

        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedState(_)));
        assert_eq!(
            err.to_string(),
            "unexpected state 'FAILED', wanted target 'SUCCEEDED'. last error: manifest is invalid"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_state() {
        let states = &script(&[Some("CREATING")]);
        let conf = StateChangeConf::new(
            &["CREATING"],
            &["ACTIVE"],
            Duration::from_secs(30),
            move || async move { Ok(next(states)) },
        );

        match conf.wait_for_state(&Context::new()).await.unwrap_err() {
            Error::Timeout(e) => {
                assert_eq!(e.last_state, "CREATING");
                assert_eq!(e.expected, vec!["ACTIVE".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_bounded() {
        let calls = &Mutex::new(0usize);
        let conf = StateChangeConf::<String>::new(
            &["CREATING"],
            &["ACTIVE"],
            Duration::from_secs(3600),
            move || async move {
                *calls.lock().unwrap() += 1;
                Ok(None)
            },
        );

        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert!(is_not_found(&err));
        assert_eq!(*calls.lock().unwrap(), DEFAULT_NOT_FOUND_CHECKS + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_target_occurence_resets_on_pending() {
        let calls = &Mutex::new(0usize);
        let states = &script(&[
            Some("ACTIVE"),
            Some("UPDATING"),
            Some("ACTIVE"),
            Some("ACTIVE"),
        ]);
        let conf = StateChangeConf::new(
            &["UPDATING"],
            &["ACTIVE"],
            Duration::from_secs(60),
            move || async move {
                *calls.lock().unwrap() += 1;
                Ok(next(states))
            },
        )
        .continuous_target_occurence(2);

        conf.wait_for_state(&Context::new()).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_is_returned() {
        let conf = StateChangeConf::<String>::new(
            &["CREATING"],
            &["ACTIVE"],
            Duration::from_secs(60),
            || async { Err(Error::Message("boom".into())) },
        );
        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_times_out() {
        let conf = StateChangeConf::<String>::new(
            &["CREATING"],
            &["ACTIVE"],
            Duration::from_secs(5),
            || std::future::pending(),
        );

        let started = Instant::now();
        match conf.wait_for_state(&Context::new()).await.unwrap_err() {
            Error::Timeout(e) => {
                assert_eq!(e.last_state, "");
                assert_eq!(e.timeout, Duration::from_secs(5));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_hung_refresh() {
        let ctx = Context::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let conf = StateChangeConf::<String>::new(
            &["CREATING"],
            &["ACTIVE"],
            Duration::from_secs(3600),
            || std::future::pending(),
        );
        assert!(matches!(conf.wait_for_state(&ctx).await.unwrap_err(), Error::Cancelled));
    }
}
