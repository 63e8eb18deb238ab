//! Amazon Elastic Kubernetes Service
//!
//! Only default add-on removal lives here: each add-on EKS installs on a new
//! cluster is first adopted (created with conflicts overwritten), then
//! deleted.

use crate::conns::{call, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, err_message_contains, is_not_found, Error, NotFoundError, Result};
use crate::flex::{self, Optional};
use crate::names;
use crate::retry::{retry_when, StateChangeConf};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_eks::types::ResolveConflicts;
use aws_sdk_eks::{config, Client};
use std::sync::Arc;
use std::time::Duration;
use tfplug::id::unique_id;
use tfplug::Context;

pub const ERR_CODE_INVALID_PARAMETER: &str = "InvalidParameterException";
pub const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

pub const ADDON_STATUS_ACTIVE: &str = "ACTIVE";
pub const ADDON_STATUS_CREATE_FAILED: &str = "CREATE_FAILED";
pub const ADDON_STATUS_CREATING: &str = "CREATING";
pub const ADDON_STATUS_DEGRADED: &str = "DEGRADED";
pub const ADDON_STATUS_DELETE_FAILED: &str = "DELETE_FAILED";
pub const ADDON_STATUS_DELETING: &str = "DELETING";

const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const ADDON_CREATED_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const ADDON_DELETED_TIMEOUT: Duration = Duration::from_secs(40 * 60);

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::EKS
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_api))
    }
}

fn new_api(config: &ClientConfig) -> Result<Arc<dyn EksApi>> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Arc::new(SdkEks::new(Client::from_conf(builder.build()))))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonIssue {
    pub code: String,
    pub message: String,
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addon {
    pub name: String,
    pub status: String,
    pub issues: Vec<AddonIssue>,
}

#[async_trait]
pub trait EksApi: Send + Sync {
    /// Creates (adopts) the add-on, overwriting conflicting configuration.
    async fn create_addon(&self, ctx: &Context, cluster: &str, addon: &str, client_request_token: &str) -> Result<()>;

    /// Fails with `NotFound` when the add-on does not exist.
    async fn describe_addon(&self, ctx: &Context, cluster: &str, addon: &str) -> Result<Addon>;

    async fn delete_addon(&self, ctx: &Context, cluster: &str, addon: &str) -> Result<()>;
}

pub struct SdkEks {
    client: Client,
}

impl SdkEks {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EksApi for SdkEks {
    async fn create_addon(&self, ctx: &Context, cluster: &str, addon: &str, client_request_token: &str) -> Result<()> {
        call(
            ctx,
            self.client
                .create_addon()
                .cluster_name(cluster)
                .addon_name(addon)
                .client_request_token(client_request_token)
                .resolve_conflicts(ResolveConflicts::Overwrite)
                .send(),
        )
        .await?;
        Ok(())
    }

    async fn describe_addon(&self, ctx: &Context, cluster: &str, addon: &str) -> Result<Addon> {
        let output = call(
            ctx,
            self.client
                .describe_addon()
                .cluster_name(cluster)
                .addon_name(addon)
                .send(),
        )
        .await
        .map_err(|err| {
            if err_code_equals(&err, ERR_CODE_RESOURCE_NOT_FOUND) {
                Error::NotFound(NotFoundError::new(err))
            } else {
                err
            }
        })?;

        let addon = output
            .addon()
            .optional()
            .ok_or_else(|| Error::EmptyResult("DescribeAddon".into()))?;
        let issues = addon
            .health()
            .optional()
            .map(|health| health.issues().optional().unwrap_or_default())
            .unwrap_or_default()
            .iter()
            .map(|issue| AddonIssue {
                code: issue
                    .code()
                    .optional()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                message: flex::to_string_opt(issue.message()).unwrap_or_default(),
                resource_ids: issue.resource_ids().optional().unwrap_or_default().to_vec(),
            })
            .collect();

        Ok(Addon {
            name: flex::to_string_opt(addon.addon_name()).unwrap_or_default(),
            status: addon
                .status()
                .optional()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            issues,
        })
    }

    async fn delete_addon(&self, ctx: &Context, cluster: &str, addon: &str) -> Result<()> {
        call(
            ctx,
            self.client
                .delete_addon()
                .cluster_name(cluster)
                .addon_name(addon)
                .send(),
        )
        .await?;
        Ok(())
    }
}

/// One error per health issue, `None` when the add-on reports none.
pub fn addon_issues_error(issues: &[AddonIssue]) -> Option<Error> {
    let errors: Vec<Error> = issues
        .iter()
        .map(|issue| {
            Error::Message(format!(
                "{}: {}. Resource IDs: [{}]",
                issue.code,
                issue.message,
                issue.resource_ids.join(" ")
            ))
        })
        .collect();
    Error::from_errors(errors).err()
}

async fn status_addon(
    ctx: &Context,
    api: &dyn EksApi,
    cluster: &str,
    addon: &str,
) -> Result<Option<(Addon, String)>> {
    match api.describe_addon(ctx, cluster, addon).await {
        Ok(output) => {
            let status = output.status.clone();
            Ok(Some((output, status)))
        }
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Waits for a created add-on to settle. A degraded add-on is good enough;
/// it only has to exist so it can be deleted again.
pub async fn wait_addon_created_allow_degraded(
    ctx: &Context,
    api: &dyn EksApi,
    cluster: &str,
    addon: &str,
) -> Result<Option<Addon>> {
    StateChangeConf::new(
        &[ADDON_STATUS_CREATING],
        &[ADDON_STATUS_ACTIVE, ADDON_STATUS_DEGRADED],
        ADDON_CREATED_TIMEOUT,
        move || status_addon(ctx, api, cluster, addon),
    )
    .failure_reason(|output: &Addon| {
        (output.status == ADDON_STATUS_CREATE_FAILED)
            .then(|| addon_issues_error(&output.issues))
            .flatten()
    })
    .wait_for_state(ctx)
    .await
}

pub async fn wait_addon_deleted(
    ctx: &Context,
    api: &dyn EksApi,
    cluster: &str,
    addon: &str,
    timeout: Duration,
) -> Result<Option<Addon>> {
    StateChangeConf::new(&[ADDON_STATUS_DELETING], &[], timeout, move || {
        status_addon(ctx, api, cluster, addon)
    })
    .failure_reason(|output: &Addon| {
        (output.status == ADDON_STATUS_DELETE_FAILED)
            .then(|| addon_issues_error(&output.issues))
            .flatten()
    })
    .wait_for_state(ctx)
    .await
}

fn is_create_addon_retryable(err: &Error) -> bool {
    err_message_contains(err, ERR_CODE_INVALID_PARAMETER, "CREATE_FAILED")
        || err_message_contains(err, ERR_CODE_INVALID_PARAMETER, "does not exist")
}

async fn remove_addon(ctx: &Context, api: &dyn EksApi, cluster: &str, addon: &str) -> Result<()> {
    tracing::debug!(cluster = %cluster, addon = %addon, "creating EKS Add-On");
    let token = unique_id();
    let token = token.as_str();

    retry_when(
        ctx,
        PROPAGATION_TIMEOUT,
        move || api.create_addon(ctx, cluster, addon, token),
        is_create_addon_retryable,
    )
    .await
    .map_err(|e| e.context(format!("error creating EKS Add-On ({})", addon)))?;

    wait_addon_created_allow_degraded(ctx, api, cluster, addon)
        .await
        .map_err(|e| {
            e.context(format!(
                "unexpected EKS Add-On ({}) state returned during creation",
                addon
            ))
        })?;
    tracing::debug!(cluster = %cluster, addon = %addon, "created EKS Add-On");

    tracing::debug!(cluster = %cluster, addon = %addon, "deleting EKS Add-On");
    api.delete_addon(ctx, cluster, addon)
        .await
        .map_err(|e| e.context(format!("error deleting EKS Add-On ({})", addon)))?;

    wait_addon_deleted(ctx, api, cluster, addon, ADDON_DELETED_TIMEOUT)
        .await
        .map_err(|e| e.context(format!("error waiting for EKS Add-On ({}) to delete", addon)))?;
    tracing::debug!(cluster = %cluster, addon = %addon, "deleted EKS Add-On");
    Ok(())
}

/// Removes the named default add-ons from `cluster`, all at once. Every
/// failure is reported, not just the first.
pub async fn remove_addons(ctx: &Context, api: &dyn EksApi, cluster: &str, addons: &[String]) -> Result<()> {
    if addons.is_empty() {
        return Ok(());
    }

    let removals = addons
        .iter()
        .map(|addon| remove_addon(ctx, api, cluster, addon));
    let errors = futures::future::join_all(removals)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();
    Error::from_errors(errors)
}
