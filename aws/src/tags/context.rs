//! Tag and resource information carried in the request context

use super::{DefaultConfig, IgnoreConfig, KeyValueTags};
use crate::names;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tfplug::Context;

/// Tags flowing between the tagging interceptor and resource code.
///
/// `tags_in` are the tags to apply on create; resources that receive tags as
/// part of a describe call set `tags_out` so the interceptor can skip the
/// separate list call on read.
#[derive(Debug, Clone, Default)]
pub struct TagsInContext {
    pub default_config: DefaultConfig,
    pub ignore_config: IgnoreConfig,
    tags_in: Arc<Mutex<Option<KeyValueTags>>>,
    tags_out: Arc<Mutex<Option<KeyValueTags>>>,
}

impl TagsInContext {
    pub fn new(default_config: DefaultConfig, ignore_config: IgnoreConfig) -> Self {
        Self {
            default_config,
            ignore_config,
            ..Default::default()
        }
    }

    pub fn tags_in(&self) -> Option<KeyValueTags> {
        self.tags_in.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_tags_in(&self, tags: KeyValueTags) {
        *self.tags_in.lock().unwrap_or_else(|e| e.into_inner()) = Some(tags);
    }

    pub fn tags_out(&self) -> Option<KeyValueTags> {
        self.tags_out.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_tags_out(&self, tags: KeyValueTags) {
        *self.tags_out.lock().unwrap_or_else(|e| e.into_inner()) = Some(tags);
    }
}

pub fn from_context(ctx: &Context) -> Option<TagsInContext> {
    ctx.value::<TagsInContext>()
}

/// Tags to send on create, without `aws:` keys. `None` when there are none.
pub fn get_tags_in(ctx: &Context) -> Option<HashMap<String, String>> {
    let tags = from_context(ctx)?.tags_in()?.ignore_aws();
    if tags.is_empty() {
        None
    } else {
        Some(tags.into_hash_map())
    }
}

/// Records the tags returned by the service for the interceptor's read.
pub fn set_tags_out<I>(ctx: &Context, tags: I)
where
    I: Into<KeyValueTags>,
{
    if let Some(in_context) = from_context(ctx) {
        in_context.set_tags_out(tags.into());
    }
}

/// Which resource a request is for, used in log and error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InContext {
    pub service_package_name: String,
    pub resource_name: String,
    pub type_name: String,
}

impl InContext {
    pub fn from_context(ctx: &Context) -> Option<Self> {
        ctx.value::<Self>()
    }

    pub fn service_name(&self) -> &str {
        names::human_friendly(&self.service_package_name).unwrap_or("<service>")
    }

    pub fn resource_name(&self) -> &str {
        if self.resource_name.is_empty() {
            "<thing>"
        } else {
            &self.resource_name
        }
    }

    pub fn type_name(&self) -> &str {
        if self.type_name.is_empty() {
            "aws_<service>_<thing>"
        } else {
            &self.type_name
        }
    }

    /// e.g. "ControlTower Landing Zone"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.service_name(), self.resource_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_out_is_shared_through_the_context() {
        let ctx = Context::new().with_value(TagsInContext::default());
        set_tags_out(&ctx, KeyValueTags::from_iter([("Name", "lz")]));

        let tags = from_context(&ctx).unwrap().tags_out().unwrap();
        assert_eq!(tags.key_value("Name"), Some("lz"));
    }

    #[test]
    fn tags_in_drops_system_tags() {
        let in_context = TagsInContext::default();
        in_context.set_tags_in(KeyValueTags::from_iter([
            ("aws:cloudformation:stack-id", "x"),
            ("Env", "dev"),
        ]));
        let ctx = Context::new().with_value(in_context);

        let tags = get_tags_in(&ctx).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["Env"], "dev");
        assert!(get_tags_in(&Context::new()).is_none());
    }

    #[test]
    fn in_context_placeholders() {
        let info = InContext::default();
        assert_eq!(info.service_name(), "<service>");
        assert_eq!(info.resource_name(), "<thing>");
        assert_eq!(info.type_name(), "aws_<service>_<thing>");

        let info = InContext {
            service_package_name: names::CONTROL_TOWER.into(),
            resource_name: "Landing Zone".into(),
            type_name: "aws_controltower_landing_zone".into(),
        };
        assert_eq!(info.display_name(), "ControlTower Landing Zone");
    }
}
