//! Amazon DataZone

use crate::conns::{call, AwsClient, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, Error, NotFoundError, Result};
use crate::flex::{self, Optional};
use crate::names;
use crate::sweep::{SweepResource, Sweepable, SweeperRegistry};
use aws_config::Region;
use aws_sdk_datazone::{config, Client};
use std::sync::Arc;
use tfplug::Context;

pub const DOMAIN_TYPE_NAME: &str = "aws_datazone_domain";

pub const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::DATA_ZONE
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_client))
    }

    fn register_sweepers(&self, sweepers: &mut SweeperRegistry) -> Result<()> {
        sweepers.register(DOMAIN_TYPE_NAME, &[], sweep_domains)
    }
}

fn new_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Client::from_conf(builder.build()))
}

/// IDs of every domain in the region.
pub async fn list_domain_ids(ctx: &Context, conn: &Client) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let output = call(
            ctx,
            conn.list_domains()
                .set_next_token(next_token.take())
                .send(),
        )
        .await?;
        ids.extend(
            output
                .items()
                .optional()
                .unwrap_or_default()
                .iter()
                .filter_map(|domain| flex::to_string_opt(domain.id())),
        );
        match flex::to_string_opt(output.next_token()) {
            Some(token) => next_token = Some(token),
            None => return Ok(ids),
        }
    }
}

pub async fn delete_domain(ctx: &Context, conn: &Client, id: &str) -> Result<()> {
    call(ctx, conn.delete_domain().identifier(id).send())
        .await
        .map_err(|err| {
            if err_code_equals(&err, ERR_CODE_RESOURCE_NOT_FOUND) {
                Error::NotFound(NotFoundError::new(err))
            } else {
                err
            }
        })?;
    Ok(())
}

async fn sweep_domains(ctx: Context, client: Arc<AwsClient>) -> Result<Vec<Box<dyn Sweepable>>> {
    let conn = client.datazone_client()?;

    let mut sweepables: Vec<Box<dyn Sweepable>> = Vec::new();
    for id in list_domain_ids(&ctx, &conn).await? {
        let conn = conn.clone();
        let domain = id.clone();
        sweepables.push(Box::new(SweepResource::new(id, move |ctx| {
            let conn = conn.clone();
            let domain = domain.clone();
            async move { delete_domain(&ctx, &conn, &domain).await }
        })));
    }
    Ok(sweepables)
}
