//! AWS WAF Regional
//!
//! Every mutating WAF Regional call needs a change token, and only one
//! token per region may be in flight. See [`token::WafRetryer`].

pub mod ipset;
pub mod token;

pub use token::WafRetryer;

use crate::conns::{call, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, Error, Result, ResultExt};
use crate::flex::{self, Optional};
use crate::names;
use crate::service::ResourceRegistration;
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_wafregional::types::{self as sdk, ChangeAction, IpSetDescriptorType};
use aws_sdk_wafregional::{config, Client};
use std::sync::Arc;
use tfplug::Context;

pub const ERR_CODE_NONEXISTENT_ITEM: &str = "WAFNonexistentItemException";
pub const ERR_CODE_STALE_DATA: &str = "WAFStaleDataException";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::WAF_REGIONAL
    }

    fn resources(&self) -> Vec<ResourceRegistration> {
        vec![ResourceRegistration {
            type_name: ipset::TYPE_NAME,
            name: "IPSet",
            schema: ipset::schema,
            factory: ipset::IpSetResource::boxed,
            tags: None,
        }]
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::new(new_api))
    }
}

fn new_api(config: &ClientConfig) -> Result<Arc<dyn WafRegionalApi>> {
    let mut builder = config::Builder::from(&config.sdk_config).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Ok(Arc::new(SdkWafRegional {
        client: Client::from_conf(builder.build()),
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpSetDescriptor {
    /// IPV4 or IPV6
    pub r#type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSet {
    pub id: String,
    pub name: Option<String>,
    pub descriptors: Vec<IpSetDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSetUpdate {
    pub action: UpdateAction,
    pub descriptor: IpSetDescriptor,
}

/// The WAF Regional calls the provider makes
#[async_trait]
pub trait WafRegionalApi: Send + Sync {
    async fn get_change_token(&self, ctx: &Context) -> Result<String>;

    async fn create_ip_set(&self, ctx: &Context, name: &str, change_token: &str) -> Result<IpSet>;

    /// `None` when the IP set does not exist.
    async fn get_ip_set(&self, ctx: &Context, id: &str) -> Result<Option<IpSet>>;

    async fn update_ip_set(
        &self,
        ctx: &Context,
        id: &str,
        change_token: &str,
        updates: &[IpSetUpdate],
    ) -> Result<()>;

    async fn delete_ip_set(&self, ctx: &Context, id: &str, change_token: &str) -> Result<()>;
}

pub struct SdkWafRegional {
    client: Client,
}

impl SdkWafRegional {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn from_sdk_ip_set(ip_set: &sdk::IpSet) -> IpSet {
    IpSet {
        id: flex::to_string_opt(ip_set.ip_set_id()).unwrap_or_default(),
        name: flex::to_string_opt(ip_set.name()),
        descriptors: ip_set
            .ip_set_descriptors()
            .optional()
            .unwrap_or_default()
            .iter()
            .map(|d| IpSetDescriptor {
                r#type: d
                    .r#type()
                    .optional()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                value: flex::to_string_opt(d.value()).unwrap_or_default(),
            })
            .collect(),
    }
}

fn to_sdk_update(update: &IpSetUpdate) -> Result<sdk::IpSetUpdate> {
    let action = match update.action {
        UpdateAction::Insert => ChangeAction::Insert,
        UpdateAction::Delete => ChangeAction::Delete,
    };
    let descriptor = sdk::IpSetDescriptor::builder()
        .r#type(IpSetDescriptorType::from(update.descriptor.r#type.as_str()))
        .value(&update.descriptor.value)
        .build()?;
    Ok(sdk::IpSetUpdate::builder()
        .action(action)
        .ip_set_descriptor(descriptor)
        .build()?)
}

#[async_trait]
impl WafRegionalApi for SdkWafRegional {
    async fn get_change_token(&self, ctx: &Context) -> Result<String> {
        let output = call(ctx, self.client.get_change_token().send()).await?;
        output
            .change_token()
            .map(str::to_string)
            .ok_or_else(|| Error::EmptyResult("GetChangeToken".into()))
    }

    async fn create_ip_set(&self, ctx: &Context, name: &str, change_token: &str) -> Result<IpSet> {
        let output = call(
            ctx,
            self.client
                .create_ip_set()
                .name(name)
                .change_token(change_token)
                .send(),
        )
        .await?;
        output
            .ip_set()
            .map(from_sdk_ip_set)
            .ok_or_else(|| Error::EmptyResult("CreateIPSet".into()))
    }

    async fn get_ip_set(&self, ctx: &Context, id: &str) -> Result<Option<IpSet>> {
        match call(ctx, self.client.get_ip_set().ip_set_id(id).send()).await {
            Ok(output) => Ok(output.ip_set().map(from_sdk_ip_set)),
            Err(err) if err_code_equals(&err, ERR_CODE_NONEXISTENT_ITEM) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_ip_set(
        &self,
        ctx: &Context,
        id: &str,
        change_token: &str,
        updates: &[IpSetUpdate],
    ) -> Result<()> {
        let updates = updates
            .iter()
            .map(to_sdk_update)
            .collect::<Result<Vec<_>>>()?;
        call(
            ctx,
            self.client
                .update_ip_set()
                .ip_set_id(id)
                .change_token(change_token)
                .set_updates(Some(updates))
                .send(),
        )
        .await
        .context(format!("updating WAF Regional IPSet ({})", id))?;
        Ok(())
    }

    async fn delete_ip_set(&self, ctx: &Context, id: &str, change_token: &str) -> Result<()> {
        call(
            ctx,
            self.client
                .delete_ip_set()
                .ip_set_id(id)
                .change_token(change_token)
                .send(),
        )
        .await?;
        Ok(())
    }
}
