//! Resource tagging
//!
//! A resource's `tags` are merged over the provider's default tags to give
//! `tags_all`. Keys matching the ignore configuration, and the `aws:` system
//! keys, never reach state.

pub mod context;
pub mod interceptor;

pub use context::{get_tags_in, set_tags_out, InContext, TagsInContext};
pub use interceptor::TaggedResource;

use crate::conns::AwsClient;
use crate::errs::{Error, Result};
use crate::names::{ATTR_TAGS, ATTR_TAGS_ALL};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tfplug::schema::{Attribute, Schema};
use tfplug::{AttributeBuilder, AttributeType, Context, Dynamic};

const AWS_TAG_KEY_PREFIX: &str = "aws:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_aws(&self) -> Self {
        self.filter(|k, _| !k.starts_with(AWS_TAG_KEY_PREFIX))
    }

    pub fn ignore_config(&self, ignore: &IgnoreConfig) -> Self {
        self.filter(|k, _| !ignore.ignores(k))
    }

    /// Union of both sets; `other` wins on conflicting keys.
    pub fn merge(&self, other: &KeyValueTags) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Drops the pairs that are identical to a provider default tag.
    pub fn remove_default_config(&self, defaults: &DefaultConfig) -> Self {
        self.filter(|k, v| defaults.tags.key_value(k) != Some(v))
    }

    /// Tags present here but absent from `new`.
    pub fn removed(&self, new: &KeyValueTags) -> Self {
        self.filter(|k, _| !new.key_exists(k))
    }

    /// Tags of `new` that are absent here or have a different value.
    pub fn updated(&self, new: &KeyValueTags) -> Self {
        new.filter(|k, v| self.key_value(k) != Some(v))
    }

    pub fn key_exists(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Tags as a `HashMap`, the shape most SDK inputs take.
    pub fn into_hash_map(self) -> HashMap<String, String> {
        self.0.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_dynamic(&self) -> Dynamic {
        Dynamic::string_map(self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Reads a Terraform `map(string)`; null and unknown elements are skipped.
    pub fn from_dynamic(value: &Dynamic) -> Self {
        let Some(map) = value.as_map() else {
            return Self::default();
        };
        Self(
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
        )
    }

    fn filter(&self, keep: impl Fn(&str, &str) -> bool) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, v)| keep(k.as_str(), v.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for KeyValueTags {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for KeyValueTags {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Provider-wide `default_tags`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultConfig {
    pub tags: KeyValueTags,
}

impl DefaultConfig {
    /// `tags_all` for a resource: defaults overridden by the resource's own tags.
    pub fn merge_tags(&self, tags: &KeyValueTags) -> KeyValueTags {
        self.tags.merge(tags)
    }
}

/// Provider-wide `ignore_tags`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreConfig {
    pub keys: BTreeSet<String>,
    pub key_prefixes: BTreeSet<String>,
}

impl IgnoreConfig {
    pub fn ignores(&self, key: &str) -> bool {
        self.keys.contains(key) || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Listing and updating tags for one service's resources
#[async_trait]
pub trait TagService: Send + Sync {
    /// Lists the resource's tags and records them as `tags_out` in the
    /// request context.
    async fn list_tags(&self, ctx: &Context, client: &AwsClient, identifier: &str) -> Result<()>;

    async fn update_tags(
        &self,
        ctx: &Context,
        client: &AwsClient,
        identifier: &str,
        old: &KeyValueTags,
        new: &KeyValueTags,
    ) -> Result<()>;
}

pub fn tags_schema() -> Attribute {
    AttributeBuilder::new(ATTR_TAGS, AttributeType::Map(Box::new(AttributeType::String)))
        .description("Map of tags to assign to the resource")
        .optional()
        .build()
}

pub fn tags_schema_computed() -> Attribute {
    AttributeBuilder::new(ATTR_TAGS_ALL, AttributeType::Map(Box::new(AttributeType::String)))
        .description("Map of tags assigned to the resource, including provider default tags")
        .optional()
        .computed()
        .build()
}

/// Makes `tags_all` a copy of the `tags` attribute so callers that populate
/// `tags_all` themselves see it as plain configuration.
pub fn mark_tags_all_not_computed(type_name: &str, mut schema: Schema) -> Result<Schema> {
    if schema.attribute(ATTR_TAGS_ALL).is_none() {
        return Ok(schema);
    }
    let mut tags_all = schema
        .attribute(ATTR_TAGS)
        .cloned()
        .ok_or_else(|| Error::Registration(format!("{}: tags_all without tags", type_name)))?;
    tags_all.name = ATTR_TAGS_ALL.to_string();

    if let Some(attr) = schema.attribute_mut(ATTR_TAGS_ALL) {
        *attr = tags_all;
    }
    Ok(schema)
}

/// A tagged resource must declare `tags` and a computed `tags_all` map.
pub fn check_tags_schema(type_name: &str, schema: &Schema) -> Result<()> {
    let is_string_map =
        |attr: &Attribute| attr.r#type == AttributeType::Map(Box::new(AttributeType::String));

    match schema.attribute(ATTR_TAGS) {
        Some(attr) if is_string_map(attr) && !attr.required => {}
        _ => {
            return Err(Error::Registration(format!(
                "{}: expected optional map(string) attribute {:?}",
                type_name, ATTR_TAGS
            )))
        }
    }
    match schema.attribute(ATTR_TAGS_ALL) {
        Some(attr) if is_string_map(attr) && attr.computed => Ok(()),
        _ => Err(Error::Registration(format!(
            "{}: expected computed map(string) attribute {:?}",
            type_name, ATTR_TAGS_ALL
        ))),
    }
}
