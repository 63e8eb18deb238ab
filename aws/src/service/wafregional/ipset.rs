//! aws_wafregional_ipset

use super::{IpSet, IpSetDescriptor, IpSetUpdate, UpdateAction, WafRegionalApi, WafRetryer};
use crate::conns::AwsClient;
use crate::errs::{err_code_equals, Result};
use crate::names::{ATTR_ID, ATTR_NAME, ATTR_TYPE, ATTR_VALUE};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::validator::{StringInSlice, StringLenBetween};
use tfplug::{
    import_state_passthrough_id, AttributeBuilder, AttributePath, AttributeType, Context, Diagnostic,
    Dynamic, DynamicValue, NestedBlock, NestingMode, Resource, Schema, SchemaBuilder,
};

pub const TYPE_NAME: &str = "aws_wafregional_ipset";

const ATTR_IP_SET_DESCRIPTOR: &str = "ip_set_descriptor";

/// UpdateIPSet accepts at most this many updates per call
const IP_SET_UPDATE_CHUNK: usize = 1000;

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Provides a WAF Regional IPSet Resource for use with Application Load Balancer.")
        .attribute(
            AttributeBuilder::new(ATTR_ID, AttributeType::String)
                .description("The ID of the WAF IPSet")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(ATTR_NAME, AttributeType::String)
                .description("The name or description of the IPSet")
                .required()
                .requires_replace()
                .validator(StringLenBetween { min: 1, max: 128 })
                .build(),
        )
        .block(NestedBlock::new(
            ATTR_IP_SET_DESCRIPTOR,
            NestingMode::Set,
            vec![
                AttributeBuilder::new(ATTR_TYPE, AttributeType::String)
                    .description("The string like IPV4 or IPV6")
                    .required()
                    .validator(StringInSlice::new(["IPV4", "IPV6"]))
                    .build(),
                AttributeBuilder::new(ATTR_VALUE, AttributeType::String)
                    .description("The CIDR notation")
                    .required()
                    .build(),
            ],
        ))
        .build()
}

pub struct IpSetResource {
    client: Arc<AwsClient>,
}

impl IpSetResource {
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }

    pub fn boxed(client: Arc<AwsClient>) -> Box<dyn Resource> {
        Box::new(Self::new(client))
    }

    fn retryer(&self, api: Arc<dyn WafRegionalApi>) -> WafRetryer<'_> {
        WafRetryer::new(api, self.client.region(), self.client.mutex_kv())
    }

    async fn create_ip_set(&self, ctx: &Context, name: &str) -> Result<IpSet> {
        let api = self.client.wafregional_api()?;
        let retryer = self.retryer(api.clone());

        let api = &api;
        let created = retryer
            .retry_with_token(ctx, move |token| async move {
                api.create_ip_set(ctx, name, &token).await
            })
            .await?;
        tracing::info!(id = %created.id, name, "created WAF Regional IPSet");
        Ok(created)
    }

    async fn find_ip_set(&self, ctx: &Context, id: &str) -> Result<Option<IpSet>> {
        self.client.wafregional_api()?.get_ip_set(ctx, id).await
    }

    async fn update_ip_set(
        &self,
        ctx: &Context,
        id: &str,
        old: &[IpSetDescriptor],
        new: &[IpSetDescriptor],
    ) -> Result<()> {
        let api = self.client.wafregional_api()?;
        let retryer = self.retryer(api.clone());
        update_descriptors(ctx, api.as_ref(), &retryer, id, &diff_descriptors(old, new)).await
    }

    async fn delete_ip_set(&self, ctx: &Context, id: &str, descriptors: &[IpSetDescriptor]) -> Result<()> {
        let api = self.client.wafregional_api()?;
        let retryer = self.retryer(api.clone());

        // An IP set still holding descriptors cannot be deleted.
        update_descriptors(ctx, api.as_ref(), &retryer, id, &diff_descriptors(descriptors, &[])).await?;

        let api = &api;
        retryer
            .retry_with_token(ctx, move |token| async move {
                api.delete_ip_set(ctx, id, &token).await
            })
            .await
    }

    /// State for `ip_set` read back from the service.
    fn state_from(&self, ip_set: &IpSet, fallback_name: Option<String>) -> tfplug::Result<DynamicValue> {
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new(ATTR_ID), ip_set.id.clone())?;
        match ip_set.name.clone().or(fallback_name) {
            Some(name) => state.set_string(&AttributePath::new(ATTR_NAME), name)?,
            None => state.set_null(&AttributePath::new(ATTR_NAME))?,
        }
        state.set_list(
            &AttributePath::new(ATTR_IP_SET_DESCRIPTOR),
            flatten_descriptors(&ip_set.descriptors),
        )?;
        Ok(state)
    }
}

/// Sends `updates` in chunks, each under its own change token.
async fn update_descriptors(
    ctx: &Context,
    api: &dyn WafRegionalApi,
    retryer: &WafRetryer<'_>,
    id: &str,
    updates: &[IpSetUpdate],
) -> Result<()> {
    for chunk in updates.chunks(IP_SET_UPDATE_CHUNK) {
        tracing::debug!(id, updates = chunk.len(), "updating WAF Regional IPSet descriptors");
        retryer
            .retry_with_token(ctx, move |token| async move {
                api.update_ip_set(ctx, id, &token, chunk).await
            })
            .await?;
    }
    Ok(())
}

/// Deletes for descriptors only in `old`, then inserts for those only in
/// `new`.
pub fn diff_descriptors(old: &[IpSetDescriptor], new: &[IpSetDescriptor]) -> Vec<IpSetUpdate> {
    let old: BTreeSet<_> = old.iter().collect();
    let new: BTreeSet<_> = new.iter().collect();

    let deletes = old.difference(&new).map(|d| IpSetUpdate {
        action: UpdateAction::Delete,
        descriptor: (*d).clone(),
    });
    let inserts = new.difference(&old).map(|d| IpSetUpdate {
        action: UpdateAction::Insert,
        descriptor: (*d).clone(),
    });
    deletes.chain(inserts).collect()
}

fn expand_descriptors(state: &DynamicValue) -> Vec<IpSetDescriptor> {
    let items = state
        .get_list(&AttributePath::new(ATTR_IP_SET_DESCRIPTOR))
        .unwrap_or_default();
    let mut descriptors: Vec<_> = items
        .iter()
        .filter_map(Dynamic::as_map)
        .filter_map(|m| {
            Some(IpSetDescriptor {
                r#type: m.get(ATTR_TYPE)?.as_str()?.to_string(),
                value: m.get(ATTR_VALUE)?.as_str()?.to_string(),
            })
        })
        .collect();
    descriptors.sort();
    descriptors.dedup();
    descriptors
}

fn flatten_descriptors(descriptors: &[IpSetDescriptor]) -> Vec<Dynamic> {
    let mut sorted = descriptors.to_vec();
    sorted.sort();
    sorted
        .into_iter()
        .map(|d| {
            Dynamic::Map(HashMap::from([
                (ATTR_TYPE.to_string(), Dynamic::String(d.r#type)),
                (ATTR_VALUE.to_string(), Dynamic::String(d.value)),
            ]))
        })
        .collect()
}

#[async_trait]
impl Resource for IpSetResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let name = match request.planned_state.get_string(&AttributePath::new(ATTR_NAME)) {
            Ok(name) => name,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error("Invalid name", e.to_string())],
                }
            }
        };
        let descriptors = expand_descriptors(&request.planned_state);

        let created = match self.create_ip_set(&ctx, &name).await {
            Ok(created) => created,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        format!("creating WAF Regional IPSet ({})", name),
                        e.to_string(),
                    )],
                }
            }
        };

        if let Err(e) = self.update_ip_set(&ctx, &created.id, &[], &descriptors).await {
            // The set exists: keep its ID in state so Terraform taints it.
            let new_state = self
                .state_from(&created, Some(name))
                .unwrap_or(request.planned_state);
            return CreateResourceResponse {
                new_state,
                diagnostics: vec![Diagnostic::error(
                    format!("updating WAF Regional IPSet ({})", created.id),
                    e.to_string(),
                )],
            };
        }

        let ip_set = IpSet {
            descriptors,
            ..created
        };
        match self.state_from(&ip_set, Some(name)) {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error("Failed to set state", e.to_string())],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let state = request.current_state;
        let id = match state.get_string(&AttributePath::new(ATTR_ID)) {
            Ok(id) => id,
            Err(e) => {
                return ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: vec![Diagnostic::error("Invalid ID", e.to_string())],
                }
            }
        };

        match self.find_ip_set(&ctx, &id).await {
            Ok(Some(ip_set)) => {
                let name = state.get_optional_string(&AttributePath::new(ATTR_NAME));
                match self.state_from(&ip_set, name) {
                    Ok(new_state) => ReadResourceResponse {
                        new_state: Some(new_state),
                        diagnostics: vec![],
                    },
                    Err(e) => ReadResourceResponse {
                        new_state: Some(state),
                        diagnostics: vec![Diagnostic::error("Failed to set state", e.to_string())],
                    },
                }
            }
            Ok(None) => {
                tracing::warn!(id = %id, "WAF Regional IPSet not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![Diagnostic::error(
                    format!("reading WAF Regional IPSet ({})", id),
                    e.to_string(),
                )],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let id = match request.prior_state.get_string(&AttributePath::new(ATTR_ID)) {
            Ok(id) => id,
            Err(e) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![Diagnostic::error("Invalid ID", e.to_string())],
                }
            }
        };
        let replaced = schema().replaced_attributes(&request.prior_state, &request.planned_state);
        if !replaced.is_empty() {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    format!("updating WAF Regional IPSet ({})", id),
                    format!("{} cannot be changed in place, the IPSet must be replaced", replaced.join(", ")),
                )],
            };
        }

        let old = expand_descriptors(&request.prior_state);
        let new = expand_descriptors(&request.planned_state);

        if old != new {
            if let Err(e) = self.update_ip_set(&ctx, &id, &old, &new).await {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![Diagnostic::error(
                        format!("updating WAF Regional IPSet ({})", id),
                        e.to_string(),
                    )],
                };
            }
        }

        let ip_set = IpSet {
            id,
            name: request
                .planned_state
                .get_optional_string(&AttributePath::new(ATTR_NAME)),
            descriptors: new,
        };
        match self.state_from(&ip_set, None) {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error("Failed to set state", e.to_string())],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let id = match request.prior_state.get_string(&AttributePath::new(ATTR_ID)) {
            Ok(id) => id,
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![Diagnostic::error("Invalid ID", e.to_string())],
                }
            }
        };
        let descriptors = expand_descriptors(&request.prior_state);

        match self.delete_ip_set(&ctx, &id, &descriptors).await {
            Ok(()) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) if err_code_equals(&e, super::ERR_CODE_NONEXISTENT_ITEM) => {
                DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![Diagnostic::error(
                    format!("deleting WAF Regional IPSet ({})", id),
                    e.to_string(),
                )],
            },
        }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new(ATTR_ID), &request, &mut response);
        response
    }
}
