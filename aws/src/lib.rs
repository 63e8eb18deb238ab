pub mod arn;
pub mod conns;
pub mod errs;
pub mod flex;
pub mod names;
pub mod retry;
pub mod service;
pub mod smithy;
pub mod sweep;
pub mod tags;

pub use errs::{Error, Result};

use async_trait::async_trait;
use conns::{AwsClient, Config};
use service::{service_packages_all, ServicePackageRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tags::{InContext, TaggedResource};
use tfplug::validator::StringInSlice;
use tfplug::{
    AttributeBuilder, AttributeType, ConfigureProviderRequest, ConfigureProviderResponse, Context,
    Diagnostic, NestedBlock, NestingMode, Provider, Resource, Schema, SchemaBuilder, TfplugError,
};

pub const PROVIDER_TYPE_NAME: &str = "aws";

pub struct AwsProvider {
    registry: Arc<ServicePackageRegistry>,
    client: Option<Arc<AwsClient>>,
    mirror_tags_all: bool,
}

impl AwsProvider {
    pub fn new() -> Result<Self> {
        Ok(Self::with_registry(Arc::new(ServicePackageRegistry::new(
            service_packages_all(),
        )?)))
    }

    pub fn with_registry(registry: Arc<ServicePackageRegistry>) -> Self {
        Self {
            registry,
            client: None,
            mirror_tags_all: false,
        }
    }

    /// Publishes `tags_all` as a plain copy of `tags` in every resource
    /// schema, for callers that manage `tags_all` themselves.
    pub fn mirror_tags_all(mut self, mirror: bool) -> Self {
        self.mirror_tags_all = mirror;
        self
    }

    /// Uses an already built client instead of `configure`.
    pub fn with_client(mut self, client: Arc<AwsClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn client(&self) -> Option<&Arc<AwsClient>> {
        self.client.as_ref()
    }

    pub fn registry(&self) -> &Arc<ServicePackageRegistry> {
        &self.registry
    }
}

fn provider_schema() -> Schema {
    let string_list = || AttributeType::List(Box::new(AttributeType::String));
    let string_map = || AttributeType::Map(Box::new(AttributeType::String));

    SchemaBuilder::new()
        .version(0)
        .description("The AWS provider")
        .attribute(
            AttributeBuilder::new("region", AttributeType::String)
                .description("The region where AWS operations will take place")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("profile", AttributeType::String)
                .description("The profile for API operations. If not set, the default profile is used")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("max_retries", AttributeType::Number)
                .description("The maximum number of times an AWS API request is being executed")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("endpoints", string_map())
                .description("Custom endpoint URLs keyed by service package name")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("s3_use_path_style", AttributeType::Bool)
                .description("Set this to true to enable the request to use path-style addressing")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("s3_us_east_1_regional_endpoint", AttributeType::String)
                .description("Specifies whether S3 API calls in the us-east-1 region use the legacy global endpoint or a regional endpoint")
                .optional()
                .validator(StringInSlice::new(["legacy", "regional"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("skip_region_validation", AttributeType::Bool)
                .description("Skip static validation of region name")
                .optional()
                .build(),
        )
        .block(
            NestedBlock::new(
                "default_tags",
                NestingMode::Single,
                vec![AttributeBuilder::new("tags", string_map())
                    .description("Resource tags to default across all resources")
                    .optional()
                    .build()],
            )
            .max_items(1),
        )
        .block(
            NestedBlock::new(
                "ignore_tags",
                NestingMode::Single,
                vec![
                    AttributeBuilder::new("keys", string_list())
                        .description("Resource tag keys to ignore across all resources")
                        .optional()
                        .build(),
                    AttributeBuilder::new("key_prefixes", string_list())
                        .description("Resource tag key prefixes to ignore across all resources")
                        .optional()
                        .build(),
                ],
            )
            .max_items(1),
        )
        .build()
}

#[async_trait]
impl Provider for AwsProvider {
    fn type_name(&self) -> &str {
        PROVIDER_TYPE_NAME
    }

    fn schema(&self) -> Schema {
        provider_schema()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = provider_schema().validate(&request.config);
        if tfplug::types::has_errors(&diagnostics) {
            return ConfigureProviderResponse { diagnostics };
        }

        match Config::from_dynamic(&request.config) {
            Ok(config) => {
                tracing::info!(
                    region = %config.region,
                    terraform_version = %request.terraform_version,
                    "configuring AWS provider"
                );
                let client = AwsClient::load(&config, self.registry.clone()).await;
                self.client = Some(Arc::new(client));
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error("Invalid provider configuration", e.to_string()));
            }
        }

        ConfigureProviderResponse { diagnostics }
    }

    fn resource_schemas(&self) -> HashMap<String, Schema> {
        let mut schemas = HashMap::new();
        for type_name in self.registry.resource_type_names() {
            let Some((registration, _)) = self.registry.resource(type_name) else {
                continue;
            };
            let schema = (registration.schema)();
            let schema = match registration.tags {
                Some(_) if self.mirror_tags_all => {
                    match tags::mark_tags_all_not_computed(type_name, schema.clone()) {
                        Ok(mirrored) => mirrored,
                        Err(e) => {
                            tracing::warn!(type_name = %type_name, error = %e, "keeping computed tags_all");
                            schema
                        }
                    }
                }
                _ => schema,
            };
            schemas.insert(type_name.to_string(), schema);
        }
        schemas
    }

    fn create_resource(&self, type_name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let client = self
            .client
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;
        let (registration, package) = self
            .registry
            .resource(type_name)
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))?;

        let resource = (registration.factory)(client.clone());
        let Some(tags) = registration.tags else {
            return Ok(resource);
        };

        let info = InContext {
            service_package_name: package.service_package_name().to_string(),
            resource_name: registration.name.to_string(),
            type_name: registration.type_name.to_string(),
        };
        Ok(Box::new(TaggedResource::new(
            resource,
            client,
            package.clone(),
            tags,
            info,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::{AttributePath, DynamicValue};

    fn config(region: &str) -> DynamicValue {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("region"), region)
            .unwrap();
        config
    }

    #[test]
    fn every_resource_has_a_schema() {
        let provider = AwsProvider::new().unwrap();
        let schemas = provider.resource_schemas();
        let mut names: Vec<_> = schemas.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, vec!["aws_controltower_landing_zone", "aws_wafregional_ipset"]);
    }

    #[test]
    fn tags_all_can_be_mirrored() {
        let provider = AwsProvider::new().unwrap().mirror_tags_all(true);
        let schemas = provider.resource_schemas();
        let tags_all = schemas["aws_controltower_landing_zone"]
            .attribute("tags_all")
            .unwrap();
        assert!(!tags_all.computed);

        let provider = AwsProvider::new().unwrap();
        let schemas = provider.resource_schemas();
        assert!(schemas["aws_controltower_landing_zone"]
            .attribute("tags_all")
            .unwrap()
            .computed);
    }

    #[test]
    fn resources_need_a_configured_provider() {
        let provider = AwsProvider::new().unwrap();
        assert!(matches!(
            provider.create_resource("aws_wafregional_ipset"),
            Err(TfplugError::ProviderNotConfigured)
        ));
    }

    #[tokio::test]
    async fn configure_rejects_bad_regional_endpoint_setting() {
        let mut provider = AwsProvider::new().unwrap();
        let mut config = config("us-east-1");
        config
            .set_string(&AttributePath::new("s3_us_east_1_regional_endpoint"), "global")
            .unwrap();

        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".into(),
                    config,
                },
            )
            .await;
        assert!(tfplug::types::has_errors(&response.diagnostics));
        assert!(provider.client().is_none());
    }

    #[tokio::test]
    async fn configured_provider_wraps_tagged_resources() {
        let mut provider = AwsProvider::new().unwrap();
        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".into(),
                    config: config("eu-west-1"),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(provider.client().unwrap().region(), "eu-west-1");

        let landing_zone = provider
            .create_resource("aws_controltower_landing_zone")
            .unwrap();
        assert_eq!(landing_zone.type_name(), "aws_controltower_landing_zone");
        let ipset = provider.create_resource("aws_wafregional_ipset").unwrap();
        assert_eq!(ipset.type_name(), "aws_wafregional_ipset");

        assert!(matches!(
            provider.create_resource("aws_nope"),
            Err(TfplugError::ResourceNotFound(name)) if name == "aws_nope"
        ));
    }
}
