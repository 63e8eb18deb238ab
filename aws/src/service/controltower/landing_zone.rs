//! aws_controltower_landing_zone

use super::manifest::{manifest_state_value, suppress_equivalent_manifest_diffs};
use super::{ControlTowerApi, LandingZone, LandingZoneOperation};
use crate::arn::Arn;
use crate::conns::AwsClient;
use crate::errs::{is_not_found, Error, Result};
use crate::names::{ATTR_ARN, ATTR_ID, ATTR_STATUS, ATTR_VERSION};
use crate::retry::StateChangeConf;
use crate::smithy;
use crate::tags::{self, tags_schema, tags_schema_computed};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::validator::StringIsJson;
use tfplug::{
    import_state_passthrough_id, AttributeBuilder, AttributePath, AttributeType, Context, Diagnostic,
    Dynamic, DynamicValue, NestedBlock, NestingMode, Resource, ResourceTimeouts, Schema,
    SchemaBuilder, TimeoutKind,
};

pub const TYPE_NAME: &str = "aws_controltower_landing_zone";

const ATTR_DRIFT_STATUS: &str = "drift_status";
const ATTR_LATEST_AVAILABLE_VERSION: &str = "latest_available_version";
const ATTR_MANIFEST_JSON: &str = "manifest_json";

const OPERATION_STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
const OPERATION_STATUS_SUCCEEDED: &str = "SUCCEEDED";
const OPERATION_STATUS_FAILED: &str = "FAILED";

const LANDING_ZONE_TIMEOUT: Duration = Duration::from_secs(120 * 60);

fn timeouts() -> ResourceTimeouts {
    ResourceTimeouts::new()
        .create(LANDING_ZONE_TIMEOUT)
        .update(LANDING_ZONE_TIMEOUT)
        .delete(LANDING_ZONE_TIMEOUT)
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Creates a new landing zone using Control Tower.")
        .attribute(
            AttributeBuilder::new(ATTR_ID, AttributeType::String)
                .description("The identifier of the landing zone")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(ATTR_ARN, AttributeType::String)
                .description("The ARN of the landing zone")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                ATTR_DRIFT_STATUS,
                AttributeType::List(Box::new(AttributeType::Object(HashMap::from([(
                    ATTR_STATUS.to_string(),
                    AttributeType::String,
                )])))),
            )
            .description("The drift status summary of the landing zone")
            .computed()
            .build(),
        )
        .attribute(
            AttributeBuilder::new(ATTR_LATEST_AVAILABLE_VERSION, AttributeType::String)
                .description("The latest available version of the landing zone")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(ATTR_MANIFEST_JSON, AttributeType::String)
                .description("The manifest JSON file is a text file that describes your AWS resources")
                .required()
                .validator(StringIsJson)
                .build(),
        )
        .attribute(
            AttributeBuilder::new(ATTR_VERSION, AttributeType::String)
                .description("The landing zone version")
                .required()
                .build(),
        )
        .attribute(tags_schema())
        .attribute(tags_schema_computed())
        .block(timeouts().block())
        .build()
}

/// `arn:${Partition}:controltower:${Region}:${Account}:landingzone/${LandingZoneId}`
pub fn landing_zone_id_from_arn(arn: &str) -> Result<String> {
    let arn = Arn::parse(arn)?;
    Ok(arn
        .resource
        .strip_prefix("landingzone/")
        .unwrap_or(&arn.resource)
        .to_string())
}

async fn status_landing_zone_operation(
    ctx: &Context,
    api: &dyn ControlTowerApi,
    id: &str,
) -> Result<Option<(LandingZoneOperation, String)>> {
    match api.get_landing_zone_operation(ctx, id).await {
        Ok(operation) => {
            let status = operation.status.clone();
            Ok(Some((operation, status)))
        }
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Waits for a create, update or delete operation. A failed operation's
/// status message becomes the error.
pub async fn wait_landing_zone_operation_succeeded(
    ctx: &Context,
    api: &dyn ControlTowerApi,
    id: &str,
    timeout: Duration,
) -> Result<Option<LandingZoneOperation>> {
    StateChangeConf::new(
        &[OPERATION_STATUS_IN_PROGRESS],
        &[OPERATION_STATUS_SUCCEEDED],
        timeout,
        move || status_landing_zone_operation(ctx, api, id),
    )
    .failure_reason(|operation: &LandingZoneOperation| {
        (operation.status == OPERATION_STATUS_FAILED)
            .then(|| Error::Message(operation.status_message.clone().unwrap_or_default()))
    })
    .wait_for_state(ctx)
    .await
}

/// Writes the service's view of the landing zone into `state`. A manifest
/// equivalent to the one already in state is left as is.
fn set_landing_zone_state(state: &mut DynamicValue, landing_zone: &LandingZone) -> Result<()> {
    let set_optional = |state: &mut DynamicValue, name: &str, value: &Option<String>| match value {
        Some(value) => state.set_string(&AttributePath::new(name), value.clone()),
        None => state.set_null(&AttributePath::new(name)),
    };

    set_optional(state, ATTR_ARN, &landing_zone.arn)?;
    match &landing_zone.drift_status {
        Some(status) => state.set_list(
            &AttributePath::new(ATTR_DRIFT_STATUS),
            vec![Dynamic::string_map([(ATTR_STATUS, status.as_str())])],
        )?,
        None => state.set_null(&AttributePath::new(ATTR_DRIFT_STATUS))?,
    }
    set_optional(state, ATTR_LATEST_AVAILABLE_VERSION, &landing_zone.latest_available_version)?;

    match &landing_zone.manifest {
        Some(document) => {
            let manifest = smithy::document_to_json_string(document)?;
            let prior = state.get_optional_string(&AttributePath::new(ATTR_MANIFEST_JSON));
            let keep_prior = prior
                .as_deref()
                .is_some_and(|prior| suppress_equivalent_manifest_diffs(prior, &manifest));
            if !keep_prior {
                state.set_string(
                    &AttributePath::new(ATTR_MANIFEST_JSON),
                    manifest_state_value(&manifest),
                )?;
            }
        }
        None => state.set_null(&AttributePath::new(ATTR_MANIFEST_JSON))?,
    }
    set_optional(state, ATTR_VERSION, &landing_zone.version)?;
    Ok(())
}

pub struct LandingZoneResource {
    client: Arc<AwsClient>,
}

impl LandingZoneResource {
    pub fn new(client: Arc<AwsClient>) -> Self {
        Self { client }
    }

    pub fn boxed(client: Arc<AwsClient>) -> Box<dyn Resource> {
        Box::new(Self::new(client))
    }

    async fn create_landing_zone(&self, ctx: &Context, state: &mut DynamicValue, timeout: Duration) -> Result<()> {
        let api = self.client.controltower_api()?;
        let manifest_json = state.get_string(&AttributePath::new(ATTR_MANIFEST_JSON))?;
        let version = state.get_string(&AttributePath::new(ATTR_VERSION))?;
        let manifest = smithy::document_from_json_string(&manifest_json)?;

        let created = api
            .create_landing_zone(ctx, manifest, &version, tags::get_tags_in(ctx))
            .await
            .map_err(|e| e.context("creating ControlTower Landing Zone"))?;

        let id = landing_zone_id_from_arn(&created.arn)?;
        state.set_string(&AttributePath::new(ATTR_ID), id.clone())?;
        state.set_string(
            &AttributePath::new(ATTR_MANIFEST_JSON),
            manifest_state_value(&manifest_json),
        )?;
        tracing::info!(id = %id, operation = %created.operation_identifier, "created ControlTower Landing Zone");

        wait_landing_zone_operation_succeeded(ctx, api.as_ref(), &created.operation_identifier, timeout)
            .await
            .map_err(|e| e.context(format!("waiting for ControlTower Landing Zone ({}) create", id)))?;

        let landing_zone = api
            .get_landing_zone(ctx, &id)
            .await
            .map_err(|e| e.context(format!("reading ControlTower Landing Zone ({})", id)))?;
        set_landing_zone_state(state, &landing_zone)
    }

    /// `Ok(None)` when the landing zone no longer exists.
    async fn read_landing_zone(&self, ctx: &Context, mut state: DynamicValue) -> Result<Option<DynamicValue>> {
        let api = self.client.controltower_api()?;
        let id = state.get_string(&AttributePath::new(ATTR_ID))?;

        let landing_zone = match api.get_landing_zone(ctx, &id).await {
            Ok(landing_zone) => landing_zone,
            Err(err) if is_not_found(&err) => {
                tracing::warn!(id = %id, "ControlTower Landing Zone not found, removing from state");
                return Ok(None);
            }
            Err(err) => return Err(err.context(format!("reading ControlTower Landing Zone ({})", id))),
        };

        set_landing_zone_state(&mut state, &landing_zone)?;
        Ok(Some(state))
    }

    async fn update_landing_zone(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        state: &mut DynamicValue,
        timeout: Duration,
    ) -> Result<()> {
        let api = self.client.controltower_api()?;
        let id = prior.get_string(&AttributePath::new(ATTR_ID))?;
        state.set_string(&AttributePath::new(ATTR_ID), id.clone())?;

        let manifest_path = AttributePath::new(ATTR_MANIFEST_JSON);
        let version_path = AttributePath::new(ATTR_VERSION);
        let old_manifest = prior.get_optional_string(&manifest_path).unwrap_or_default();
        let new_manifest = state.get_string(&manifest_path)?;
        let new_version = state.get_string(&version_path)?;

        let manifest_changed = !suppress_equivalent_manifest_diffs(&old_manifest, &new_manifest);
        let version_changed = prior.get_optional_string(&version_path).as_deref() != Some(new_version.as_str());

        if manifest_changed || version_changed {
            let manifest = smithy::document_from_json_string(&new_manifest)?;
            let operation = api
                .update_landing_zone(ctx, &id, manifest, &new_version)
                .await
                .map_err(|e| e.context(format!("updating ControlTower Landing Zone ({})", id)))?;

            wait_landing_zone_operation_succeeded(ctx, api.as_ref(), &operation, timeout)
                .await
                .map_err(|e| e.context(format!("waiting for ControlTower Landing Zone ({}) update", id)))?;
            state.set_string(&manifest_path, manifest_state_value(&new_manifest))?;
        } else {
            state.set_string(&manifest_path, old_manifest)?;
        }

        let landing_zone = api
            .get_landing_zone(ctx, &id)
            .await
            .map_err(|e| e.context(format!("reading ControlTower Landing Zone ({})", id)))?;
        set_landing_zone_state(state, &landing_zone)
    }

    async fn delete_landing_zone(&self, ctx: &Context, state: &DynamicValue, timeout: Duration) -> Result<()> {
        let api = self.client.controltower_api()?;
        let id = state.get_string(&AttributePath::new(ATTR_ID))?;

        tracing::debug!(id = %id, "deleting ControlTower Landing Zone");
        let operation = match api.delete_landing_zone(ctx, &id).await {
            Ok(operation) => operation,
            Err(err) if is_not_found(&err) => return Ok(()),
            Err(err) => return Err(err.context("deleting ControlTower Landing Zone")),
        };

        wait_landing_zone_operation_succeeded(ctx, api.as_ref(), &operation, timeout)
            .await
            .map_err(|e| e.context(format!("waiting for ControlTower Landing Zone ({}) delete", id)))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for LandingZoneResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn timeouts(&self) -> ResourceTimeouts {
        timeouts()
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let timeout = match timeouts().resolve(TimeoutKind::Create, &request.config) {
            Ok(timeout) => timeout,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error("Invalid timeout", e.to_string())],
                }
            }
        };

        let mut state = request.planned_state.clone();
        match self.create_landing_zone(&ctx, &mut state, timeout).await {
            Ok(()) => CreateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Err(e) => {
                // Once created, the landing zone stays in state so Terraform taints it.
                let created = state
                    .get_optional_string(&AttributePath::new(ATTR_ID))
                    .is_some_and(|id| !id.is_empty());
                CreateResourceResponse {
                    new_state: if created { state } else { request.planned_state },
                    diagnostics: vec![Diagnostic::error("Failed to create landing zone", e.to_string())],
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let prior = request.current_state.clone();
        match self.read_landing_zone(&ctx, request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(prior),
                diagnostics: vec![Diagnostic::error("Failed to read landing zone", e.to_string())],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let timeout = match timeouts().resolve(TimeoutKind::Update, &request.config) {
            Ok(timeout) => timeout,
            Err(e) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![Diagnostic::error("Invalid timeout", e.to_string())],
                }
            }
        };

        let mut state = request.planned_state;
        match self
            .update_landing_zone(&ctx, &request.prior_state, &mut state, timeout)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error("Failed to update landing zone", e.to_string())],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let timeout = timeouts()
            .resolve(TimeoutKind::Delete, &request.prior_state)
            .unwrap_or(LANDING_ZONE_TIMEOUT);

        match self
            .delete_landing_zone(&ctx, &request.prior_state, timeout)
            .await
        {
            Ok(()) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![Diagnostic::error("Failed to delete landing zone", e.to_string())],
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

#[cfg(test)]
mod tests {
    use super::super::CreatedLandingZone;
    use super::*;
    use crate::conns::{ClientConfig, ClientFactory, Config};
    use crate::errs::{ApiError, NotFoundError};
    use crate::names;
    use crate::service::{ServicePackage, ServicePackageRegistry};
    use aws_config::SdkConfig;
    use aws_smithy_types::Document;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const ARN: &str = "arn:aws:controltower:us-east-1:123456789012:landingzone/1A2B3C4D5E6F";
    const MANIFEST: &str = r#"{"governedRegions": ["us-east-1"], "centralizedLogging": {"configurations": {"loggingBucket": {"retentionDays": "365"}}}}"#;

    #[derive(Default)]
    struct FakeControlTower {
        landing_zone: Mutex<Option<LandingZone>>,
        operations: Mutex<VecDeque<LandingZoneOperation>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeControlTower {
        fn script(&self, statuses: &[(&str, Option<&str>)]) {
            *self.operations.lock().unwrap() = statuses
                .iter()
                .map(|(status, message)| LandingZoneOperation {
                    status: status.to_string(),
                    status_message: message.map(str::to_string),
                })
                .collect();
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn stored(manifest: Document, version: &str) -> LandingZone {
            LandingZone {
                arn: Some(ARN.to_string()),
                drift_status: Some("IN_SYNC".into()),
                latest_available_version: Some("3.3".into()),
                manifest: Some(manifest),
                version: Some(version.to_string()),
            }
        }
    }

    fn not_found() -> Error {
        Error::NotFound(NotFoundError::new(Error::Api(ApiError::service(
            "ResourceNotFoundException",
            "not found",
        ))))
    }

    #[async_trait]
    impl ControlTowerApi for FakeControlTower {
        async fn create_landing_zone(
            &self,
            _ctx: &Context,
            manifest: Document,
            version: &str,
            tags: Option<HashMap<String, String>>,
        ) -> Result<CreatedLandingZone> {
            self.record(format!("create tags={:?}", tags.map(|t| t.len())));
            *self.landing_zone.lock().unwrap() = Some(Self::stored(manifest, version));
            Ok(CreatedLandingZone {
                arn: ARN.into(),
                operation_identifier: "op-create".into(),
            })
        }

        async fn get_landing_zone(&self, _ctx: &Context, _id: &str) -> Result<LandingZone> {
            self.landing_zone.lock().unwrap().clone().ok_or_else(not_found)
        }

        async fn update_landing_zone(
            &self,
            _ctx: &Context,
            _id: &str,
            manifest: Document,
            version: &str,
        ) -> Result<String> {
            self.record(format!("update {}", version));
            *self.landing_zone.lock().unwrap() = Some(Self::stored(manifest, version));
            Ok("op-update".into())
        }

        async fn delete_landing_zone(&self, _ctx: &Context, _id: &str) -> Result<String> {
            self.record("delete");
            match self.landing_zone.lock().unwrap().take() {
                Some(_) => Ok("op-delete".into()),
                None => Err(not_found()),
            }
        }

        async fn get_landing_zone_operation(&self, _ctx: &Context, _id: &str) -> Result<LandingZoneOperation> {
            let mut operations = self.operations.lock().unwrap();
            match operations.len() {
                0 => Err(not_found()),
                1 => Ok(operations[0].clone()),
                _ => Ok(operations.pop_front().unwrap()),
            }
        }

        async fn list_landing_zones(&self, _ctx: &Context) -> Result<Vec<String>> {
            Ok(self.landing_zone.lock().unwrap().iter().filter_map(|lz| lz.arn.clone()).collect())
        }

        async fn list_tags_for_resource(&self, _ctx: &Context, _arn: &str) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }

        async fn tag_resource(&self, _ctx: &Context, _arn: &str, _tags: HashMap<String, String>) -> Result<()> {
            Ok(())
        }

        async fn untag_resource(&self, _ctx: &Context, _arn: &str, _keys: Vec<String>) -> Result<()> {
            Ok(())
        }
    }

    struct FakePackage(Arc<FakeControlTower>);

    impl ServicePackage for FakePackage {
        fn service_package_name(&self) -> &'static str {
            names::CONTROL_TOWER
        }

        fn client_factory(&self) -> Option<ClientFactory> {
            let api = self.0.clone();
            Some(ClientFactory::new(move |_: &ClientConfig| {
                Ok(api.clone() as Arc<dyn ControlTowerApi>)
            }))
        }
    }

    fn resource(api: Arc<FakeControlTower>) -> LandingZoneResource {
        let registry = ServicePackageRegistry::new(vec![Arc::new(FakePackage(api))]).unwrap();
        let config = Config {
            region: "us-east-1".into(),
            ..Default::default()
        };
        LandingZoneResource::new(Arc::new(AwsClient::new(
            &config,
            SdkConfig::builder().build(),
            Arc::new(registry),
        )))
    }

    fn planned(manifest: &str, version: &str) -> DynamicValue {
        let mut state = DynamicValue::object();
        state
            .set_string(&AttributePath::new(ATTR_MANIFEST_JSON), manifest)
            .unwrap();
        state.set_string(&AttributePath::new(ATTR_VERSION), version).unwrap();
        state
    }

    async fn create(resource: &LandingZoneResource, state: DynamicValue) -> CreateResourceResponse {
        resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.into(),
                    planned_state: state.clone(),
                    config: state,
                },
            )
            .await
    }

    #[test]
    fn id_is_the_arn_resource() {
        assert_eq!(landing_zone_id_from_arn(ARN).unwrap(), "1A2B3C4D5E6F");
        assert!(landing_zone_id_from_arn("1A2B3C4D5E6F").is_err());
    }

    #[test]
    fn timeouts_default_to_two_hours() {
        let timeouts = timeouts();
        for kind in [TimeoutKind::Create, TimeoutKind::Update, TimeoutKind::Delete] {
            assert_eq!(timeouts.default_for(kind), Some(LANDING_ZONE_TIMEOUT));
        }
        assert_eq!(timeouts.default_for(TimeoutKind::Read), None);
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_the_operation() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("IN_PROGRESS", None), ("IN_PROGRESS", None), ("SUCCEEDED", None)]);
        let resource = resource(api.clone());

        let response = create(&resource, planned(MANIFEST, "3.3")).await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new(ATTR_ID)).unwrap(), "1A2B3C4D5E6F");
        assert_eq!(state.get_string(&AttributePath::new(ATTR_ARN)).unwrap(), ARN);
        assert_eq!(
            state.get_string(&AttributePath::new(ATTR_MANIFEST_JSON)).unwrap(),
            r#"{"centralizedLogging":{"configurations":{"loggingBucket":{"retentionDays":365}}},"governedRegions":["us-east-1"]}"#
        );
        assert_eq!(
            state
                .get_string(&AttributePath::new(ATTR_DRIFT_STATUS).index(0).attribute(ATTR_STATUS))
                .unwrap(),
            "IN_SYNC"
        );
        assert_eq!(*api.calls.lock().unwrap(), vec!["create tags=None"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_operation_reports_its_status_message() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("IN_PROGRESS", None), ("FAILED", Some("AccessDenied on organizations"))]);
        let resource = resource(api);

        let response = create(&resource, planned(MANIFEST, "3.3")).await;

        assert_eq!(response.diagnostics.len(), 1);
        let detail = response.diagnostics[0].to_string();
        assert!(detail.contains("waiting for ControlTower Landing Zone (1A2B3C4D5E6F) create"), "{}", detail);
        assert!(detail.contains("AccessDenied on organizations"), "{}", detail);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_wait_keeps_the_created_landing_zone_in_state() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("IN_PROGRESS", None), ("FAILED", Some("boom"))]);
        let resource = resource(api.clone());

        let response = create(&resource, planned(MANIFEST, "3.3")).await;

        assert!(tfplug::types::has_errors(&response.diagnostics));
        assert_eq!(
            response.new_state.get_string(&AttributePath::new(ATTR_ID)).unwrap(),
            "1A2B3C4D5E6F"
        );
        assert!(api.landing_zone.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn read_removes_missing_landing_zone() {
        let resource = resource(Arc::new(FakeControlTower::default()));
        let mut state = planned(MANIFEST, "3.3");
        state.set_string(&AttributePath::new(ATTR_ID), "1A2B3C4D5E6F").unwrap();

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.into(),
                    current_state: state,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn read_keeps_equivalent_manifest() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("SUCCEEDED", None)]);
        let resource = resource(api);
        let created = create(&resource, planned(MANIFEST, "3.3")).await.new_state;
        let stored = created
            .get_string(&AttributePath::new(ATTR_MANIFEST_JSON))
            .unwrap();

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.into(),
                    current_state: created,
                },
            )
            .await;
        let state = response.new_state.unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new(ATTR_MANIFEST_JSON)).unwrap(),
            stored
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_skips_equivalent_manifest() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("SUCCEEDED", None)]);
        let resource = resource(api.clone());
        let prior = create(&resource, planned(MANIFEST, "3.3")).await.new_state;

        let reformatted = r#"{"centralizedLogging":{"configurations":{"loggingBucket":{"retentionDays":365}}},"governedRegions":["us-east-1"]}"#;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.into(),
                    prior_state: prior.clone(),
                    planned_state: planned(reformatted, "3.3"),
                    config: planned(reformatted, "3.3"),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(api.calls.lock().unwrap().len(), 1);

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.into(),
                    prior_state: prior,
                    planned_state: planned(MANIFEST, "3.4"),
                    config: planned(MANIFEST, "3.4"),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(api.calls.lock().unwrap().last().unwrap(), "update 3.4");
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new(ATTR_VERSION))
                .unwrap(),
            "3.4"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_landing_zone_succeeds() {
        let api = Arc::new(FakeControlTower::default());
        api.script(&[("SUCCEEDED", None)]);
        let resource = resource(api.clone());
        let created = create(&resource, planned(MANIFEST, "3.3")).await.new_state;

        for _ in 0..2 {
            let response = resource
                .delete(
                    Context::new(),
                    DeleteResourceRequest {
                        type_name: TYPE_NAME.into(),
                        prior_state: created.clone(),
                    },
                )
                .await;
            assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        }
        assert_eq!(
            *api.calls.lock().unwrap(),
            vec!["create tags=None", "delete", "delete"]
        );
    }
}
