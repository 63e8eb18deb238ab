//! Amazon OpenSearch Ingestion

use crate::conns::{call, AwsClient, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, Error, NotFoundError, Result};
use crate::flex::{self, Optional};
use crate::names;
use crate::sweep::{SweepResource, Sweepable, SweeperRegistry};
use aws_config::Region;
use aws_sdk_osis::{config, Client};
use std::sync::Arc;
use tfplug::Context;

pub const PIPELINE_TYPE_NAME: &str = "aws_osis_pipeline";

pub const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::OSIS
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_client))
    }

    fn register_sweepers(&self, sweepers: &mut SweeperRegistry) -> Result<()> {
        sweepers.register(PIPELINE_TYPE_NAME, &[], sweep_pipelines)
    }
}

fn new_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Client::from_conf(builder.build()))
}

/// Names of every pipeline in the region.
pub async fn list_pipeline_names(ctx: &Context, conn: &Client) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let output = call(
            ctx,
            conn.list_pipelines()
                .set_next_token(next_token.take())
                .send(),
        )
        .await?;
        names.extend(
            output
                .pipelines()
                .optional()
                .unwrap_or_default()
                .iter()
                .filter_map(|p| flex::to_string_opt(p.pipeline_name())),
        );
        match flex::to_string_opt(output.next_token()) {
            Some(token) => next_token = Some(token),
            None => return Ok(names),
        }
    }
}

pub async fn delete_pipeline(ctx: &Context, conn: &Client, name: &str) -> Result<()> {
    call(ctx, conn.delete_pipeline().pipeline_name(name).send())
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

async fn sweep_pipelines(ctx: Context, client: Arc<AwsClient>) -> Result<Vec<Box<dyn Sweepable>>> {
    let conn = client.osis_client()?;

    let sweepables = list_pipeline_names(&ctx, &conn)
        .await?
        .into_iter()
        .map(|name| {
            let conn = conn.clone();
            let pipeline = name.clone();
            Box::new(SweepResource::new(name, move |ctx| {
                let conn = conn.clone();
                let pipeline = pipeline.clone();
                async move { delete_pipeline(&ctx, &conn, &pipeline).await }
            })) as Box<dyn Sweepable>
        })
        .collect();
    Ok(sweepables)
}
