//! AWS Control Tower

pub mod landing_zone;
pub mod manifest;

pub use landing_zone::LandingZoneResource;

use crate::conns::{call, AwsClient, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, Error, NotFoundError, Result};
use crate::flex::{self, Optional};
use crate::names;
use crate::service::{ResourceRegistration, ResourceTags};
use crate::sweep::{ResourceSweeper, Sweepable, SweeperRegistry};
use crate::tags::{self, KeyValueTags, TagService};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_controltower::types::LandingZoneDetail;
use aws_sdk_controltower::{config, Client};
use aws_smithy_types::Document;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::Context;

pub const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::CONTROL_TOWER
    }

    fn resources(&self) -> Vec<ResourceRegistration> {
        vec![ResourceRegistration {
            type_name: landing_zone::TYPE_NAME,
            name: "Landing Zone",
            schema: landing_zone::schema,
            factory: LandingZoneResource::boxed,
            tags: Some(ResourceTags {
                identifier_attribute: names::ATTR_ARN,
                resource_type: None,
            }),
        }]
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_api))
    }

    fn tag_service(&self) -> Option<&dyn TagService> {
        Some(&ControlTowerTags)
    }

    fn register_sweepers(&self, sweepers: &mut SweeperRegistry) -> Result<()> {
        sweepers.register(landing_zone::TYPE_NAME, &[], sweep_landing_zones)
    }
}

fn new_api(config: &ClientConfig) -> Result<Arc<dyn ControlTowerApi>> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Arc::new(SdkControlTower::new(Client::from_conf(builder.build()))))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandingZone {
    pub arn: Option<String>,
    pub drift_status: Option<String>,
    pub latest_available_version: Option<String>,
    pub manifest: Option<Document>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingZoneOperation {
    pub status: String,
    pub status_message: Option<String>,
}

/// A started create; the landing zone is usable once the operation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLandingZone {
    pub arn: String,
    pub operation_identifier: String,
}

/// The Control Tower calls the provider makes
#[async_trait]
pub trait ControlTowerApi: Send + Sync {
    async fn create_landing_zone(
        &self,
        ctx: &Context,
        manifest: Document,
        version: &str,
        tags: Option<HashMap<String, String>>,
    ) -> Result<CreatedLandingZone>;

    /// Fails with `NotFound` when there is no such landing zone.
    async fn get_landing_zone(&self, ctx: &Context, id: &str) -> Result<LandingZone>;

    /// Returns the operation identifier.
    async fn update_landing_zone(
        &self,
        ctx: &Context,
        id: &str,
        manifest: Document,
        version: &str,
    ) -> Result<String>;

    /// Returns the operation identifier.
    async fn delete_landing_zone(&self, ctx: &Context, id: &str) -> Result<String>;

    /// Fails with `NotFound` when there is no such operation.
    async fn get_landing_zone_operation(&self, ctx: &Context, operation_id: &str) -> Result<LandingZoneOperation>;

    /// ARNs of every landing zone in the region.
    async fn list_landing_zones(&self, ctx: &Context) -> Result<Vec<String>>;

    async fn list_tags_for_resource(&self, ctx: &Context, arn: &str) -> Result<HashMap<String, String>>;

    async fn tag_resource(&self, ctx: &Context, arn: &str, tags: HashMap<String, String>) -> Result<()>;

    async fn untag_resource(&self, ctx: &Context, arn: &str, keys: Vec<String>) -> Result<()>;
}

pub struct SdkControlTower {
    client: Client,
}

impl SdkControlTower {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn not_found(err: Error) -> Error {
    if err_code_equals(&err, ERR_CODE_RESOURCE_NOT_FOUND) {
        Error::NotFound(NotFoundError::new(err))
    } else {
        err
    }
}

fn required(value: Option<String>, operation: &str) -> Result<String> {
    value.ok_or_else(|| Error::EmptyResult(operation.to_string()))
}

fn from_sdk_landing_zone(detail: &LandingZoneDetail) -> LandingZone {
    LandingZone {
        arn: flex::to_string_opt(detail.arn()),
        drift_status: detail
            .drift_status()
            .optional()
            .and_then(|d| d.status().optional())
            .map(|s| s.as_str().to_string()),
        latest_available_version: flex::to_string_opt(detail.latest_available_version()),
        manifest: detail.manifest().optional().cloned(),
        version: flex::to_string_opt(detail.version()),
    }
}

#[async_trait]
impl ControlTowerApi for SdkControlTower {
    async fn create_landing_zone(
        &self,
        ctx: &Context,
        manifest: Document,
        version: &str,
        tags: Option<HashMap<String, String>>,
    ) -> Result<CreatedLandingZone> {
        let output = call(
            ctx,
            self.client
                .create_landing_zone()
                .manifest(manifest)
                .version(version)
                .set_tags(tags)
                .send(),
        )
        .await?;

        Ok(CreatedLandingZone {
            arn: required(flex::to_string_opt(output.arn()), "CreateLandingZone")?,
            operation_identifier: required(
                flex::to_string_opt(output.operation_identifier()),
                "CreateLandingZone",
            )?,
        })
    }

    async fn get_landing_zone(&self, ctx: &Context, id: &str) -> Result<LandingZone> {
        let output = call(
            ctx,
            self.client
                .get_landing_zone()
                .landing_zone_identifier(id)
                .send(),
        )
        .await
        .map_err(not_found)?;

        output
            .landing_zone()
            .optional()
            .map(from_sdk_landing_zone)
            .ok_or_else(|| Error::EmptyResult("GetLandingZone".into()))
    }

    async fn update_landing_zone(
        &self,
        ctx: &Context,
        id: &str,
        manifest: Document,
        version: &str,
    ) -> Result<String> {
        let output = call(
            ctx,
            self.client
                .update_landing_zone()
                .landing_zone_identifier(id)
                .manifest(manifest)
                .version(version)
                .send(),
        )
        .await?;
        required(flex::to_string_opt(output.operation_identifier()), "UpdateLandingZone")
    }

    async fn delete_landing_zone(&self, ctx: &Context, id: &str) -> Result<String> {
        let output = call(
            ctx,
            self.client
                .delete_landing_zone()
                .landing_zone_identifier(id)
                .send(),
        )
        .await
        .map_err(not_found)?;
        required(flex::to_string_opt(output.operation_identifier()), "DeleteLandingZone")
    }

    async fn get_landing_zone_operation(&self, ctx: &Context, operation_id: &str) -> Result<LandingZoneOperation> {
        let output = call(
            ctx,
            self.client
                .get_landing_zone_operation()
                .operation_identifier(operation_id)
                .send(),
        )
        .await
        .map_err(not_found)?;

        let detail = output
            .operation_details()
            .optional()
            .ok_or_else(|| Error::EmptyResult("GetLandingZoneOperation".into()))?;
        Ok(LandingZoneOperation {
            status: detail
                .status()
                .optional()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_message: flex::to_string_opt(detail.status_message()),
        })
    }

    async fn list_landing_zones(&self, ctx: &Context) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = call(
                ctx,
                self.client
                    .list_landing_zones()
                    .set_next_token(next_token.take())
                    .send(),
            )
            .await?;
            arns.extend(
                output
                    .landing_zones()
                    .optional()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|lz| flex::to_string_opt(lz.arn())),
            );
            match flex::to_string_opt(output.next_token()) {
                Some(token) => next_token = Some(token),
                None => return Ok(arns),
            }
        }
    }

    async fn list_tags_for_resource(&self, ctx: &Context, arn: &str) -> Result<HashMap<String, String>> {
        let output = call(
            ctx,
            self.client
                .list_tags_for_resource()
                .resource_arn(arn)
                .send(),
        )
        .await?;
        Ok(output.tags().optional().cloned().unwrap_or_default())
    }

    async fn tag_resource(&self, ctx: &Context, arn: &str, tags: HashMap<String, String>) -> Result<()> {
        call(
            ctx,
            self.client
                .tag_resource()
                .resource_arn(arn)
                .set_tags(Some(tags))
                .send(),
        )
        .await?;
        Ok(())
    }

    async fn untag_resource(&self, ctx: &Context, arn: &str, keys: Vec<String>) -> Result<()> {
        call(
            ctx,
            self.client
                .untag_resource()
                .resource_arn(arn)
                .set_tag_keys(Some(keys))
                .send(),
        )
        .await?;
        Ok(())
    }
}

pub struct ControlTowerTags;

#[async_trait]
impl TagService for ControlTowerTags {
    async fn list_tags(&self, ctx: &Context, client: &AwsClient, identifier: &str) -> Result<()> {
        let tags = client
            .controltower_api()?
            .list_tags_for_resource(ctx, identifier)
            .await?;
        tags::set_tags_out(ctx, tags);
        Ok(())
    }

    async fn update_tags(
        &self,
        ctx: &Context,
        client: &AwsClient,
        identifier: &str,
        old: &KeyValueTags,
        new: &KeyValueTags,
    ) -> Result<()> {
        let api = client.controltower_api()?;

        let removed = old.removed(new).ignore_aws();
        if !removed.is_empty() {
            let keys = removed.keys().map(str::to_string).collect();
            api.untag_resource(ctx, identifier, keys)
                .await
                .map_err(|e| e.context(format!("untagging resource ({})", identifier)))?;
        }

        let updated = old.updated(new).ignore_aws();
        if !updated.is_empty() {
            api.tag_resource(ctx, identifier, updated.into_hash_map())
                .await
                .map_err(|e| e.context(format!("tagging resource ({})", identifier)))?;
        }
        Ok(())
    }
}

async fn sweep_landing_zones(ctx: Context, client: Arc<AwsClient>) -> Result<Vec<Box<dyn Sweepable>>> {
    let api = client.controltower_api()?;
    let mut sweepables: Vec<Box<dyn Sweepable>> = Vec::new();

    for arn in api.list_landing_zones(&ctx).await? {
        let id = landing_zone::landing_zone_id_from_arn(&arn)?;
        sweepables.push(Box::new(ResourceSweeper::new(
            LandingZoneResource::boxed(client.clone()),
            &[(names::ATTR_ID, id.as_str()), (names::ATTR_ARN, arn.as_str())],
        )?));
    }
    Ok(sweepables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errs::{is_not_found, ApiError};

    #[test]
    fn resource_not_found_becomes_not_found() {
        let err = not_found(Error::Api(ApiError::service(
            ERR_CODE_RESOURCE_NOT_FOUND,
            "Landing zone not found",
        )));
        assert!(is_not_found(&err));

        let err = not_found(Error::Api(ApiError::service("AccessDeniedException", "no")));
        assert!(!is_not_found(&err));
    }
}
