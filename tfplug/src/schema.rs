//! Schema types and builders for tfplug
//!
//! Schemas describe resource and provider configuration. Besides describing
//! the shape they drive config validation: required attributes and the
//! per-attribute validators are checked by [`Schema::validate`].

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

/// Schema is returned by providers and resources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.block.attributes.iter_mut().find(|a| a.name == name)
    }

    /// Checks required attributes and runs validators over `config`.
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_block(&self.block, &config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }

    /// Top-level attributes marked `requires_replace` whose value differs
    /// between `prior` and `planned`. Unknown planned values are not changes.
    pub fn replaced_attributes(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<String> {
        self.block
            .attributes
            .iter()
            .filter(|a| a.requires_replace)
            .filter(|a| {
                let path = AttributePath::new(&a.name);
                match (prior.get(&path), planned.get(&path)) {
                    (_, Some(Dynamic::Unknown)) => false,
                    (old, new) => old.unwrap_or(&Dynamic::Null) != new.unwrap_or(&Dynamic::Null),
                }
            })
            .map(|a| a.name.clone())
            .collect()
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub deprecated: bool,
    /// A change to this attribute replaces the resource instead of updating it
    pub requires_replace: bool,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("requires_replace", &self.requires_replace)
            .field(
                "validators",
                &self
                    .validators
                    .iter()
                    .map(|v| v.description())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

impl NestedBlock {
    pub fn new(type_name: &str, nesting: NestingMode, attributes: Vec<Attribute>) -> Self {
        Self {
            type_name: type_name.to_string(),
            block: Block {
                attributes,
                block_types: Vec::new(),
                description: String::new(),
                deprecated: false,
            },
            nesting,
            min_items: 0,
            max_items: 0,
        }
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.max_items = max;
        self
    }
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

fn validate_block(
    block: &Block,
    value: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(values) = value.as_map() else {
        return;
    };

    for attribute in &block.attributes {
        let attr_path = path.clone().attribute(&attribute.name);
        match values.get(&attribute.name) {
            None | Some(Dynamic::Null) => {
                if attribute.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!(
                                "The argument \"{}\" is required, but no definition was found.",
                                attribute.name
                            ),
                        )
                        .with_attribute(attr_path),
                    );
                }
            }
            Some(Dynamic::Unknown) => {}
            Some(v) => {
                for validator in &attribute.validators {
                    validator.validate(v, &attr_path, diagnostics);
                }
            }
        }
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        match (nested.nesting, values.get(&nested.type_name)) {
            (NestingMode::Single, Some(v)) => {
                validate_block(&nested.block, v, &nested_path, diagnostics)
            }
            (NestingMode::List | NestingMode::Set, Some(Dynamic::List(items))) => {
                if nested.max_items > 0 && items.len() as i64 > nested.max_items {
                    diagnostics.push(
                        Diagnostic::error(
                            "Too many blocks",
                            format!(
                                "No more than {} \"{}\" blocks are allowed",
                                nested.max_items, nested.type_name
                            ),
                        )
                        .with_attribute(nested_path.clone()),
                    );
                }
                for (i, item) in items.iter().enumerate() {
                    let item_path = nested_path.clone().index(i as i64);
                    validate_block(&nested.block, item, &item_path, diagnostics);
                }
            }
            _ => {}
        }
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                deprecated: false,
                requires_replace: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.attribute.requires_replace = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    attributes: Vec::new(),
                    block_types: Vec::new(),
                    description: String::new(),
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
