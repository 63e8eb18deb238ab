//! Transparent tagging for registered resources
//!
//! Resources only deal with their own attributes. [`TaggedResource`] computes
//! `tags_all` from the provider's default tags, hands the tags to create
//! through the request context, lists tags after read and applies tag diffs
//! on update.

use super::context::TagsInContext;
use super::{InContext, KeyValueTags};
use crate::conns::AwsClient;
use crate::names::{ATTR_TAGS, ATTR_TAGS_ALL};
use crate::service::{ResourceTags, ServicePackage};
use async_trait::async_trait;
use std::sync::Arc;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::types::has_errors;
use tfplug::{AttributePath, Context, Diagnostic, DynamicValue, Resource, ResourceTimeouts, Schema};

pub struct TaggedResource {
    inner: Box<dyn Resource>,
    client: Arc<AwsClient>,
    package: Arc<dyn ServicePackage>,
    tags: ResourceTags,
    info: InContext,
}

impl TaggedResource {
    pub fn new(
        inner: Box<dyn Resource>,
        client: Arc<AwsClient>,
        package: Arc<dyn ServicePackage>,
        tags: ResourceTags,
        info: InContext,
    ) -> Self {
        Self {
            inner,
            client,
            package,
            tags,
            info,
        }
    }

    fn tags_context(&self, ctx: &Context) -> (Context, TagsInContext) {
        let tags = TagsInContext::new(
            self.client.default_tags_config().clone(),
            self.client.ignore_tags_config().clone(),
        );
        let ctx = ctx
            .clone()
            .with_value(tags.clone())
            .with_value(self.info.clone());
        (ctx, tags)
    }

    /// `tags_all` for the given resource tags.
    fn tags_all(&self, tags: &KeyValueTags) -> KeyValueTags {
        self.client
            .default_tags_config()
            .merge_tags(tags)
            .ignore_config(self.client.ignore_tags_config())
    }

    fn identifier(&self, state: &DynamicValue) -> Option<String> {
        state
            .get_optional_string(&AttributePath::new(self.tags.identifier_attribute))
            .filter(|s| !s.is_empty())
    }

    async fn read_tags(
        &self,
        ctx: &Context,
        tags_ctx: &TagsInContext,
        state: &mut DynamicValue,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if tags_ctx.tags_out().is_none() {
            let Some(identifier) = self.identifier(state) else {
                return;
            };
            let Some(service) = self.package.tag_service() else {
                return;
            };
            if let Err(e) = service.list_tags(ctx, &self.client, &identifier).await {
                diagnostics.push(Diagnostic::error(
                    format!("listing tags for {} ({})", self.info.display_name(), identifier),
                    e.to_string(),
                ));
                return;
            }
        }

        let tags_out = tags_ctx.tags_out().unwrap_or_default();
        let tags_all = tags_out
            .ignore_aws()
            .ignore_config(self.client.ignore_tags_config());
        let tags = tags_all.remove_default_config(self.client.default_tags_config());
        set_tags(state, &tags, &tags_all, diagnostics);
    }
}

fn state_tags(state: &DynamicValue, attr: &str) -> KeyValueTags {
    state
        .get(&AttributePath::new(attr))
        .map(KeyValueTags::from_dynamic)
        .unwrap_or_default()
}

fn set_tags(
    state: &mut DynamicValue,
    tags: &KeyValueTags,
    tags_all: &KeyValueTags,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (attr, value) in [(ATTR_TAGS, tags), (ATTR_TAGS_ALL, tags_all)] {
        if let Err(e) = state.set_string_map(&AttributePath::new(attr), value.map()) {
            diagnostics.push(Diagnostic::error(format!("setting {}", attr), e.to_string()));
        }
    }
}

#[async_trait]
impl Resource for TaggedResource {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn schema(&self) -> Schema {
        self.inner.schema()
    }

    fn timeouts(&self) -> ResourceTimeouts {
        self.inner.timeouts()
    }

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        self.inner.validate(ctx, request).await
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let (ctx, tags_ctx) = self.tags_context(&ctx);

        let tags = state_tags(&request.planned_state, ATTR_TAGS);
        let tags_all = self.tags_all(&tags);
        tags_ctx.set_tags_in(tags_all.clone());

        let mut response = self.inner.create(ctx, request).await;
        if !has_errors(&response.diagnostics) {
            set_tags(
                &mut response.new_state,
                &tags,
                &tags_all,
                &mut response.diagnostics,
            );
        }
        response
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let (ctx, tags_ctx) = self.tags_context(&ctx);

        let mut response = self.inner.read(ctx.clone(), request).await;
        if has_errors(&response.diagnostics) {
            return response;
        }
        if let Some(state) = response.new_state.as_mut() {
            self.read_tags(&ctx, &tags_ctx, state, &mut response.diagnostics)
                .await;
        }
        response
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let (ctx, tags_ctx) = self.tags_context(&ctx);

        let tags = state_tags(&request.planned_state, ATTR_TAGS);
        let old_all = state_tags(&request.prior_state, ATTR_TAGS_ALL);
        let new_all = self.tags_all(&tags);
        tags_ctx.set_tags_in(new_all.clone());

        if old_all != new_all {
            if let (Some(identifier), Some(service)) = (
                self.identifier(&request.prior_state),
                self.package.tag_service(),
            ) {
                tracing::debug!(
                    type_name = %self.info.type_name(),
                    id = %identifier,
                    "updating tags"
                );
                if let Err(e) = service
                    .update_tags(&ctx, &self.client, &identifier, &old_all, &new_all)
                    .await
                {
                    return UpdateResourceResponse {
                        new_state: request.prior_state,
                        diagnostics: vec![Diagnostic::error(
                            format!("updating tags for {} ({})", self.info.display_name(), identifier),
                            e.to_string(),
                        )],
                    };
                }
            }
        }

        let mut response = self.inner.update(ctx, request).await;
        if !has_errors(&response.diagnostics) {
            set_tags(
                &mut response.new_state,
                &tags,
                &new_all,
                &mut response.diagnostics,
            );
        }
        response
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let ctx = ctx.with_value(self.info.clone());
        self.inner.delete(ctx, request).await
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        self.inner.import_state(ctx, request).await
    }
}
