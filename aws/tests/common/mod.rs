#![allow(dead_code)]

use aws::conns::{AwsClient, Config};
use aws::service::{service_packages_all, ServicePackageRegistry};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const REGION: &str = "us-west-2";

/// Shared SDK settings with static credentials, so nothing is read from the
/// environment or instance metadata.
pub fn sdk_config() -> SdkConfig {
    SdkConfig::builder()
        .region(Region::new(REGION))
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            None,
            None,
            "test",
        )))
        .behavior_version(BehaviorVersion::latest())
        .build()
}

/// A client whose listed services all talk to `url`.
pub fn client_for(url: &str, services: &[&str]) -> Arc<AwsClient> {
    let endpoints: BTreeMap<String, String> = services
        .iter()
        .map(|service| (service.to_string(), url.to_string()))
        .collect();
    let config = Config {
        region: REGION.into(),
        max_retries: 1,
        endpoints,
        s3_use_path_style: true,
        ..Default::default()
    };
    let registry = ServicePackageRegistry::new(service_packages_all()).expect("registry");
    Arc::new(AwsClient::new(&config, sdk_config(), Arc::new(registry)))
}
