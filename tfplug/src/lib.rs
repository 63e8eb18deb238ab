//! tfplug - Terraform Plugin Framework for Rust
//!
//! Provider-side building blocks: request context, dynamic values, schemas,
//! validators and the provider/resource traits.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod id;
pub mod import;
pub mod timeouts;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
pub use resource::Resource;
pub use schema::{AttributeBuilder, AttributeType, NestedBlock, NestingMode, Schema, SchemaBuilder};
pub use timeouts::{ResourceTimeouts, TimeoutKind};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
