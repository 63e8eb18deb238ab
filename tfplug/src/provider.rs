//! Provider trait
//!
//! A provider is configured once, then hands out resource instances by type
//! name. Resources receive whatever client state they need at construction.

use crate::context::Context;
use crate::resource::Resource;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name, e.g. "aws"
    fn type_name(&self) -> &str;

    /// Schema of the provider configuration block
    fn schema(&self) -> Schema;

    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resource_schemas(&self) -> HashMap<String, Schema>;

    /// Fails with `ProviderNotConfigured` before `configure` succeeded and
    /// with `ResourceNotFound` for unknown type names.
    fn create_resource(&self, type_name: &str) -> Result<Box<dyn Resource>>;
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
}
