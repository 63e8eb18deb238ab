//! HTTP request/response logging for Lambda
//!
//! Function code is uploaded inline in the request body of CreateFunction and
//! UpdateFunctionCode. Logging those bodies copies archives of up to 50MB, so
//! they are replaced by a placeholder.

use aws_smithy_runtime_api::box_error::BoxError;
use aws_smithy_runtime_api::client::interceptors::context::{
    BeforeDeserializationInterceptorContextRef, BeforeTransmitInterceptorContextRef,
};
use aws_smithy_runtime_api::client::interceptors::Intercept;
use aws_smithy_runtime_api::client::orchestrator::Metadata;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_types::config_bag::{ConfigBag, Storable, StoreReplace};
use std::borrow::Cow;
use std::time::Instant;

const CREATE_FUNCTION: &str = "CreateFunction";
const UPDATE_FUNCTION_CODE: &str = "UpdateFunctionCode";

pub const REDACTED: &str = "[Redacted]";

/// Operations whose request body must not be logged.
pub fn redacts_body(operation: &str) -> bool {
    operation == CREATE_FUNCTION || operation == UPDATE_FUNCTION_CODE
}

/// Request body as it appears in the log.
pub fn loggable_body<'a>(operation: &str, body: Option<&'a [u8]>) -> Cow<'a, str> {
    if redacts_body(operation) {
        return Cow::Borrowed(REDACTED);
    }
    match body {
        Some(bytes) => String::from_utf8_lossy(bytes),
        None => Cow::Borrowed("[streaming]"),
    }
}

#[derive(Debug)]
struct RequestSent(Instant);

impl Storable for RequestSent {
    type Storer = StoreReplace<Self>;
}

#[derive(Debug, Default)]
pub struct RequestResponseLogger;

impl Intercept for RequestResponseLogger {
    fn name(&self) -> &'static str {
        "LambdaRequestResponseLogger"
    }

    fn read_before_transmit(
        &self,
        context: &BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let operation = cfg
            .load::<Metadata>()
            .map(|m| m.name().to_string())
            .unwrap_or_default();
        let request = context.request();

        tracing::debug!(
            service = "Lambda",
            operation = %operation,
            http.method = %request.method(),
            http.url = %request.uri(),
            http.request.body = %loggable_body(&operation, request.body().bytes()),
            "HTTP Request Sent"
        );
        cfg.interceptor_state().store_put(RequestSent(Instant::now()));
        Ok(())
    }

    fn read_before_deserialization(
        &self,
        context: &BeforeDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let response = context.response();
        let elapsed_ms = cfg
            .load::<RequestSent>()
            .map(|sent| sent.0.elapsed().as_millis() as u64)
            .unwrap_or_default();

        tracing::debug!(
            service = "Lambda",
            http.status_code = response.status().as_u16(),
            http.duration_ms = elapsed_ms,
            "HTTP Response Received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_code_is_redacted() {
        let zip = b"PK\x03\x04 lots of code";
        assert_eq!(loggable_body("CreateFunction", Some(zip)), REDACTED);
        assert_eq!(loggable_body("UpdateFunctionCode", Some(zip)), REDACTED);
        assert_eq!(loggable_body("UpdateFunctionCode", None), REDACTED);
    }

    #[test]
    fn other_operations_log_the_body() {
        let body = br#"{"FunctionName":"f"}"#;
        assert_eq!(
            loggable_body("UpdateFunctionConfiguration", Some(body)),
            r#"{"FunctionName":"f"}"#
        );
        assert_eq!(loggable_body("Invoke", None), "[streaming]");
    }
}
