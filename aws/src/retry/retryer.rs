//! Per-service retry overrides
//!
//! Some services return errors the standard retry policy gets wrong, e.g. a
//! throttling-looking code that actually reports a hard quota. A service
//! package supplies an ordered list of checks; the first check with an
//! opinion decides, otherwise the SDK's own classifiers do.

use crate::errs::ApiError;
use aws_smithy_runtime_api::client::interceptors::context::InterceptorContext;
use aws_smithy_runtime_api::client::retries::classifiers::{
    ClassifyRetry, RetryAction, RetryClassifierPriority,
};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types::retry::ErrorKind;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    /// No opinion; defer to the next check.
    Unknown,
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }
}

pub type IsErrorRetryable = Arc<dyn Fn(&ApiError) -> Ternary + Send + Sync>;

#[derive(Clone, Default)]
pub struct IsErrorRetryables(Vec<IsErrorRetryable>);

impl IsErrorRetryables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, check: F) -> Self
    where
        F: Fn(&ApiError) -> Ternary + Send + Sync + 'static,
    {
        self.0.push(Arc::new(check));
        self
    }

    /// First answer other than `Unknown`.
    pub fn evaluate(&self, err: &ApiError) -> Ternary {
        self.0
            .iter()
            .map(|check| check(err))
            .find(|answer| *answer != Ternary::Unknown)
            .unwrap_or(Ternary::Unknown)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for IsErrorRetryables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsErrorRetryables")
            .field("checks", &self.0.len())
            .finish()
    }
}

/// Appends `checks` after the checks already in `base`.
pub fn add_is_error_retryables<I>(base: IsErrorRetryables, checks: I) -> IsErrorRetryables
where
    I: IntoIterator<Item = IsErrorRetryable>,
{
    let mut all = base;
    all.0.extend(checks);
    all
}

/// Bridges [`IsErrorRetryables`] into the SDK retry policy for operations
/// failing with `E`. Errors of other types are left to the other classifiers.
pub struct ErrorRetryClassifier<E> {
    checks: IsErrorRetryables,
    _error: PhantomData<fn() -> E>,
}

impl<E> ErrorRetryClassifier<E> {
    pub fn new(checks: IsErrorRetryables) -> Self {
        Self {
            checks,
            _error: PhantomData,
        }
    }
}

impl<E> fmt::Debug for ErrorRetryClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRetryClassifier")
            .field("error", &std::any::type_name::<E>())
            .field("checks", &self.checks)
            .finish()
    }
}

impl<E> ClassifyRetry for ErrorRetryClassifier<E>
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    fn classify_retry(&self, ctx: &InterceptorContext) -> RetryAction {
        let Some(Err(err)) = ctx.output_or_error() else {
            return RetryAction::NoActionIndicated;
        };
        let Some(err) = err.as_operation_error().and_then(|e| e.downcast_ref::<E>()) else {
            return RetryAction::NoActionIndicated;
        };

        let status = ctx.response().map(|r| r.status().as_u16());
        let api = ApiError::from_metadata(err, status);
        match self.checks.evaluate(&api) {
            Ternary::True => {
                tracing::debug!(error = %api, "retrying on provider override");
                RetryAction::retryable_error(ErrorKind::TransientError)
            }
            Ternary::False => {
                tracing::debug!(error = %api, "not retrying on provider override");
                RetryAction::RetryForbidden
            }
            Ternary::Unknown => RetryAction::NoActionIndicated,
        }
    }

    fn name(&self) -> &'static str {
        "Provider Error Retry Override"
    }

    fn priority(&self) -> RetryClassifierPriority {
        RetryClassifierPriority::run_after(RetryClassifierPriority::transient_error_classifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_acm::operation::request_certificate::RequestCertificateError;
    use aws_smithy_runtime_api::client::orchestrator::OrchestratorError;
    use aws_smithy_types::error::ErrorMetadata;
    use aws_smithy_runtime_api::client::interceptors::context::{Error, Input};

    fn quota(err: &ApiError) -> Ternary {
        if err.code_equals("LimitExceededException") {
            Ternary::False
        } else {
            Ternary::Unknown
        }
    }

    fn context_with(code: &str) -> InterceptorContext {
        let mut ctx = InterceptorContext::new(Input::doesnt_matter());
        let err = RequestCertificateError::generic(
            ErrorMetadata::builder().code(code).message("nope").build(),
        );
        ctx.set_output_or_error(Err(OrchestratorError::operation(Error::erase(err))));
        ctx
    }

    #[test]
    fn first_opinion_wins() {
        let checks = IsErrorRetryables::new()
            .with(|_| Ternary::Unknown)
            .with(quota)
            .with(|_| Ternary::True);

        let limit = ApiError::service("LimitExceededException", "quota");
        assert_eq!(checks.evaluate(&limit), Ternary::False);
        let other = ApiError::service("ThrottlingException", "slow down");
        assert_eq!(checks.evaluate(&other), Ternary::True);
        assert_eq!(IsErrorRetryables::new().evaluate(&other), Ternary::Unknown);
    }

    #[test]
    fn add_appends_after_base() {
        let base = IsErrorRetryables::new().with(quota);
        let always: IsErrorRetryable = Arc::new(|_: &ApiError| Ternary::True);
        let all = add_is_error_retryables(base, [always]);
        assert_eq!(all.len(), 2);
        assert_eq!(
            all.evaluate(&ApiError::service("LimitExceededException", "")),
            Ternary::False
        );
    }

    #[test]
    fn classifier_maps_answers_to_retry_actions() {
        let classifier = ErrorRetryClassifier::<RequestCertificateError>::new(
            IsErrorRetryables::new()
                .with(quota)
                .with(|err| err.code_equals("RequestInProgressException").into()),
        );

        assert_eq!(
            classifier.classify_retry(&context_with("LimitExceededException")),
            RetryAction::RetryForbidden
        );
        assert_eq!(
            classifier.classify_retry(&context_with("RequestInProgressException")),
            RetryAction::retryable_error(ErrorKind::TransientError)
        );
        assert_eq!(
            classifier.classify_retry(&InterceptorContext::new(Input::doesnt_matter())),
            RetryAction::NoActionIndicated
        );
    }
}
