//! AWS Certificate Manager

use crate::conns::{ClientConfig, ClientFactory};
use crate::errs::Result;
use crate::names;
use crate::retry::{ErrorRetryClassifier, IsErrorRetryables, Ternary};
use aws_config::Region;
use aws_sdk_acm::operation::import_certificate::ImportCertificateError;
use aws_sdk_acm::operation::request_certificate::RequestCertificateError;
use aws_sdk_acm::{config, Client};

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::ACM
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::with_customizer(new_client, customize_client))
    }
}

fn new_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Client::from_conf(builder.build()))
}

/// Quota errors for certificate requests never clear by retrying.
pub fn is_error_retryables() -> IsErrorRetryables {
    IsErrorRetryables::new().with(|err| {
        if err.message_contains("LimitExceededException", "the maximum number of")
            && err.message_contains("LimitExceededException", "certificates in the last year")
        {
            Ternary::False
        } else {
            Ternary::Unknown
        }
    })
}

fn customize_client(client: Client) -> Result<Client> {
    let checks = is_error_retryables();
    let conf = client
        .config()
        .to_builder()
        .retry_classifier(ErrorRetryClassifier::<RequestCertificateError>::new(checks.clone()))
        .retry_classifier(ErrorRetryClassifier::<ImportCertificateError>::new(checks))
        .build();
    Ok(Client::from_conf(conf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errs::ApiError;

    #[test]
    fn yearly_certificate_quota_is_not_retried() {
        let checks = is_error_retryables();

        let quota = ApiError::service(
            "LimitExceededException",
            "Error: you have reached the maximum number of certificates in the last year.",
        );
        assert_eq!(checks.evaluate(&quota), Ternary::False);

        let throttled = ApiError::service("LimitExceededException", "Rate exceeded");
        assert_eq!(checks.evaluate(&throttled), Ternary::Unknown);

        let other = ApiError::service(
            "ValidationException",
            "the maximum number of certificates in the last year",
        );
        assert_eq!(checks.evaluate(&other), Ternary::Unknown);
    }
}
