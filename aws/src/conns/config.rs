//! Provider configuration and per-service client configuration

use crate::errs::{Error, Result};
use crate::names;
use crate::tags::{DefaultConfig, IgnoreConfig, KeyValueTags};
use aws_config::SdkConfig;
use std::collections::BTreeMap;
use tfplug::{AttributePath, DynamicValue};
use url::Url;

pub const DEFAULT_MAX_RETRIES: u32 = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsEast1RegionalEndpoint {
    #[default]
    Legacy,
    Regional,
}

impl std::str::FromStr for UsEast1RegionalEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "regional" => Ok(Self::Regional),
            other => Err(Error::Config(format!(
                "s3_us_east_1_regional_endpoint must be \"legacy\" or \"regional\", got {:?}",
                other
            ))),
        }
    }
}

/// Provider configuration after environment fallbacks are applied
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub region: String,
    pub profile: Option<String>,
    pub max_retries: u32,
    pub endpoints: BTreeMap<String, String>,
    pub default_tags: KeyValueTags,
    pub ignore_tag_keys: Vec<String>,
    pub ignore_tag_key_prefixes: Vec<String>,
    pub s3_use_path_style: bool,
    pub s3_us_east_1_regional_endpoint: UsEast1RegionalEndpoint,
    pub skip_region_validation: bool,
}

impl Config {
    /// Reads the provider block, falling back to `AWS_REGION`,
    /// `AWS_DEFAULT_REGION` and `AWS_PROFILE`.
    pub fn from_dynamic(config: &DynamicValue) -> Result<Self> {
        let region = config
            .get_optional_string(&AttributePath::new("region"))
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "region is required (set in provider config or AWS_REGION env var)".to_string(),
                )
            })?;

        let profile = config
            .get_optional_string(&AttributePath::new("profile"))
            .or_else(|| std::env::var("AWS_PROFILE").ok())
            .filter(|p| !p.is_empty());

        let max_retries = match config.get(&AttributePath::new("max_retries")) {
            Some(v) if !v.is_null() => v
                .as_number()
                .map(|n| n as u32)
                .ok_or_else(|| Error::Config("max_retries must be a number".to_string()))?,
            _ => DEFAULT_MAX_RETRIES,
        };

        let endpoints = config.get_string_map(&AttributePath::new("endpoints"))?;
        for (service, endpoint) in &endpoints {
            Url::parse(endpoint).map_err(|e| {
                Error::Config(format!("endpoints.{}: invalid URL {:?}: {}", service, endpoint, e))
            })?;
        }

        let default_tags = KeyValueTags::from(
            config.get_string_map(&AttributePath::new("default_tags").attribute("tags"))?,
        );

        let ignore_tag_keys = string_list(config, AttributePath::new("ignore_tags").attribute("keys"));
        let ignore_tag_key_prefixes = string_list(
            config,
            AttributePath::new("ignore_tags").attribute("key_prefixes"),
        );

        let s3_us_east_1_regional_endpoint = config
            .get_optional_string(&AttributePath::new("s3_us_east_1_regional_endpoint"))
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            region,
            profile,
            max_retries,
            endpoints,
            default_tags,
            ignore_tag_keys,
            ignore_tag_key_prefixes,
            s3_use_path_style: config
                .get_bool(&AttributePath::new("s3_use_path_style"))
                .unwrap_or(false),
            s3_us_east_1_regional_endpoint,
            skip_region_validation: config
                .get_bool(&AttributePath::new("skip_region_validation"))
                .unwrap_or(false),
        };
        config.validate_region()?;
        Ok(config)
    }

    fn validate_region(&self) -> Result<()> {
        if self.skip_region_validation {
            return Ok(());
        }
        let valid = self.region.split('-').count() >= 3
            && self
                .region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid {
            Ok(())
        } else {
            Err(Error::Config(format!("invalid AWS Region: {}", self.region)))
        }
    }

    pub fn default_tags_config(&self) -> DefaultConfig {
        DefaultConfig {
            tags: self.default_tags.clone(),
        }
    }

    pub fn ignore_tags_config(&self) -> IgnoreConfig {
        IgnoreConfig {
            keys: self.ignore_tag_keys.iter().cloned().collect(),
            key_prefixes: self.ignore_tag_key_prefixes.iter().cloned().collect(),
        }
    }

    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }
}

fn string_list(config: &DynamicValue, path: AttributePath) -> Vec<String> {
    config
        .get_list(&path)
        .map(|values| crate::flex::expand_string_list(&values))
        .unwrap_or_default()
}

/// Everything a service package needs to construct its client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub sdk_config: SdkConfig,
    pub endpoint: Option<String>,
    pub region: String,
    pub s3_use_path_style: bool,
    pub s3_us_east_1_regional_endpoint: UsEast1RegionalEndpoint,
}

impl ClientConfig {
    /// Overrides take precedence over the per-service defaults.
    pub fn merge(mut self, overrides: &ClientOverrides) -> Self {
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(region) = &overrides.region {
            self.region = region.clone();
        }
        if let Some(force_path_style) = overrides.force_path_style {
            self.s3_use_path_style = force_path_style;
        }
        self
    }

    /// Region for S3 clients: us-east-1 talks to the global endpoint unless
    /// regional endpoints are requested or the endpoint is overridden.
    pub fn s3_region(&self) -> &str {
        if self.region == names::US_EAST_1
            && self.s3_us_east_1_regional_endpoint == UsEast1RegionalEndpoint::Legacy
            && self.endpoint.is_none()
        {
            names::GLOBAL_REGION
        } else {
            &self.region
        }
    }
}

/// Per-call client options. An empty set selects the cached default client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOverrides {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub force_path_style: Option<bool>,
}

impl ClientOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = Some(force);
        self
    }
}
