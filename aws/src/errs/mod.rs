//! Error types and AWS error classification
//!
//! SDK errors are converted into [`ApiError`] as soon as they leave a service
//! call, so retry predicates, waiters and resources can match on the AWS
//! error code and message without knowing the operation's error type.

use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::fmt;
use std::time::Duration;
use tfplug::TfplugError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The service answered with a modeled or unmodeled error
    Service,
    Timeout,
    Dispatch,
    Construction,
    Response,
}

/// A classified AWS API error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: Option<String>,
    pub message: Option<String>,
    pub status: Option<u16>,
    pub kind: ApiErrorKind,
}

impl ApiError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
            status: None,
            kind: ApiErrorKind::Service,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Builds an error from the metadata of a typed operation error.
    pub fn from_metadata<E: ProvideErrorMetadata>(err: &E, status: Option<u16>) -> Self {
        let meta = err.meta();
        Self {
            code: meta.code().map(str::to_string),
            message: meta.message().map(str::to_string),
            status,
            kind: ApiErrorKind::Service,
        }
    }

    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    pub fn code_equals(&self, code: &str) -> bool {
        self.code() == code
    }

    pub fn message_contains(&self, code: &str, needle: &str) -> bool {
        self.code_equals(code) && self.message().contains(needle)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{}: {}", code, message)?,
            (Some(code), None) => write!(f, "{}", code)?,
            (None, Some(message)) => write!(f, "{}", message)?,
            (None, None) => write!(f, "unknown AWS API error")?,
        }
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl<E> From<SdkError<E, HttpResponse>> for ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(err: SdkError<E, HttpResponse>) -> Self {
        let status = err.raw_response().map(|r| r.status().as_u16());
        let kind = match &err {
            SdkError::ServiceError(_) => ApiErrorKind::Service,
            SdkError::TimeoutError(_) => ApiErrorKind::Timeout,
            SdkError::DispatchFailure(_) => ApiErrorKind::Dispatch,
            SdkError::ConstructionFailure(_) => ApiErrorKind::Construction,
            _ => ApiErrorKind::Response,
        };
        let meta = err.meta();
        let message = meta
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

        Self {
            code: meta.code().map(str::to_string),
            message: Some(message),
            status,
            kind,
        }
    }
}

impl<E> From<SdkError<E, HttpResponse>> for Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(err: SdkError<E, HttpResponse>) -> Self {
        Error::Api(ApiError::from(err))
    }
}

/// The resource (or operation) does not exist
#[derive(Debug)]
pub struct NotFoundError {
    pub message: String,
    pub last_error: Option<Box<Error>>,
}

impl NotFoundError {
    pub fn new(last_error: Error) -> Self {
        Self {
            message: "couldn't find resource".to_string(),
            last_error: Some(Box::new(last_error)),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_error {
            Some(err) => write!(f, "{}", err),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for NotFoundError {}

#[derive(Debug)]
pub struct TimeoutError {
    pub last_state: String,
    pub expected: Vec<String>,
    pub timeout: Duration,
    pub last_error: Option<Box<Error>>,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expected.is_empty() {
            write!(f, "timeout while waiting for resource to be gone")?;
        } else {
            write!(
                f,
                "timeout while waiting for state to become '{}'",
                self.expected.join(", ")
            )?;
        }

        let mut extra = Vec::new();
        if !self.last_state.is_empty() {
            extra.push(format!("last state: '{}'", self.last_state));
        }
        if !self.timeout.is_zero() {
            extra.push(format!("timeout: {:?}", self.timeout));
        }
        if !extra.is_empty() {
            write!(f, " ({})", extra.join(", "))?;
        }

        if let Some(err) = &self.last_error {
            write!(f, ": {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for TimeoutError {}

#[derive(Debug)]
pub struct UnexpectedStateError {
    pub state: String,
    pub expected: Vec<String>,
    pub last_error: Option<Box<Error>>,
}

impl fmt::Display for UnexpectedStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected state '{}', wanted target '{}'",
            self.state,
            self.expected.join(", ")
        )?;
        if let Some(err) = &self.last_error {
            write!(f, ". last error: {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnexpectedStateError {}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error("{0}")]
    UnexpectedState(#[from] UnexpectedStateError),

    #[error("operation cancelled")]
    Cancelled,

    /// A plain message, e.g. a failure reason reported by the service
    #[error("{0}")]
    Message(String),

    #[error("building request: {0}")]
    Build(#[from] aws_smithy_types::error::operation::BuildError),

    #[error("unknown service package: {0}")]
    UnknownServicePackage(String),

    #[error("AWS SDK API client ({service}): cached client has the wrong type, want {want}")]
    WrongClientType { service: String, want: &'static str },

    #[error("registering {0}")]
    Registration(String),

    #[error("no AWS SDK API client factory: {0}")]
    NoClientFactory(String),

    #[error("creating AWS SDK API client ({service}): {message}")]
    ClientConstruction { service: String, message: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid ARN {arn:?}: {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{}", join(.0))]
    Multiple(Vec<Error>),

    #[error(transparent)]
    Framework(#[from] TfplugError),
}

pub type Result<T> = std::result::Result<T, Error>;

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Collapses a list of errors: none is `Ok`, one is itself.
    pub fn from_errors(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }

    /// The innermost API error, looking through context wrappers and
    /// not-found errors.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            Error::Context { source, .. } => source.api_error(),
            Error::NotFound(e) => e.last_error.as_deref().and_then(Error::api_error),
            _ => None,
        }
    }

    fn any(&self, f: &dyn Fn(&Error) -> bool) -> bool {
        match self {
            Error::Multiple(errors) => errors.iter().any(|e| e.any(f)),
            Error::Context { source, .. } => f(self) || source.any(f),
            _ => f(self),
        }
    }
}

pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}

pub fn err_code_equals(err: &Error, code: &str) -> bool {
    err.any(&|e| e.api_error().is_some_and(|api| api.code_equals(code)))
}

pub fn err_message_contains(err: &Error, code: &str, needle: &str) -> bool {
    err.any(&|e| {
        e.api_error()
            .is_some_and(|api| api.message_contains(code, needle))
    })
}

pub fn err_status_code_equals(err: &Error, status: u16) -> bool {
    err.any(&|e| e.api_error().is_some_and(|api| api.status == Some(status)))
}

pub fn is_not_found(err: &Error) -> bool {
    err.any(&|e| matches!(e, Error::NotFound(_) | Error::EmptyResult(_)))
}

/// One `APIError(code, key)` per failed item, `None` when nothing failed.
pub fn failed_items_error<K, C, I>(items: I) -> Option<Error>
where
    I: IntoIterator<Item = (K, C)>,
    K: Into<String>,
    C: Into<String>,
{
    let mut items: Vec<(String, String)> = items
        .into_iter()
        .map(|(k, c)| (k.into(), c.into()))
        .collect();
    items.sort();

    let errors: Vec<Error> = items
        .into_iter()
        .map(|(key, code)| Error::Api(ApiError::service(code, key)))
        .collect();

    Error::from_errors(errors).err()
}
