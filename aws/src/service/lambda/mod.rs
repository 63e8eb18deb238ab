//! AWS Lambda

pub mod logger;

pub use logger::RequestResponseLogger;

use crate::conns::{ClientConfig, ClientFactory};
use crate::errs::Result;
use crate::names;
use crate::retry::{ErrorRetryClassifier, IsErrorRetryables, Ternary};
use aws_config::Region;
use aws_sdk_lambda::operation::invoke::InvokeError;
use aws_sdk_lambda::{config, Client};

const KMS_ACCESS_DENIED: &str = "KMSAccessDeniedException";
const KMS_ACCESS_DENIED_MESSAGE: &str =
    "Lambda was unable to decrypt the environment variables because KMS access was denied.";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::LAMBDA
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

/// A function whose environment cannot be decrypted stays broken until its
/// KMS grant changes.
pub fn is_error_retryables() -> IsErrorRetryables {
    IsErrorRetryables::new().with(|err| {
        if err.message_contains(KMS_ACCESS_DENIED, KMS_ACCESS_DENIED_MESSAGE) {
            Ternary::False
        } else {
            Ternary::Unknown
        }
    })
}

fn customize_client(client: Client) -> Result<Client> {
    let conf = client
        .config()
        .to_builder()
        .retry_classifier(ErrorRetryClassifier::<InvokeError>::new(is_error_retryables()))
        .interceptor(RequestResponseLogger)
        .build();
    Ok(Client::from_conf(conf))
}
