//! Elastic Container Registry

use crate::conns::{ClientConfig, ClientFactory};
use crate::errs::Result;
use crate::names;
use aws_config::Region;
use aws_sdk_ecr::{config, Client};

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::ECR
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_client))
    }
}

/// ECR clients honour the per-service endpoint override, e.g. for
/// registries behind a private endpoint.
fn new_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        tracing::debug!(endpoint = %endpoint, "using ECR endpoint override");
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Client::from_conf(builder.build()))
}
