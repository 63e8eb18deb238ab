//! Per-operation resource timeouts
//!
//! Resources declare defaults; users may override them in a `timeouts` block
//! using Go-style duration strings ("90m", "1h30m", "2.5h").

use crate::error::{Result, TfplugError};
use crate::schema::{AttributeBuilder, AttributeType, NestedBlock, NestingMode};
use crate::types::{AttributePath, DynamicValue};
use std::time::Duration;

pub const TIMEOUTS_BLOCK: &str = "timeouts";

/// Used when a resource declares no default for an operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Read,
    Update,
    Delete,
}

impl TimeoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutKind::Create => "create",
            TimeoutKind::Read => "read",
            TimeoutKind::Update => "update",
            TimeoutKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl ResourceTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, timeout: Duration) -> Self {
        self.create = Some(timeout);
        self
    }

    pub fn read(mut self, timeout: Duration) -> Self {
        self.read = Some(timeout);
        self
    }

    pub fn update(mut self, timeout: Duration) -> Self {
        self.update = Some(timeout);
        self
    }

    pub fn delete(mut self, timeout: Duration) -> Self {
        self.delete = Some(timeout);
        self
    }

    pub fn default_for(&self, kind: TimeoutKind) -> Option<Duration> {
        match kind {
            TimeoutKind::Create => self.create,
            TimeoutKind::Read => self.read,
            TimeoutKind::Update => self.update,
            TimeoutKind::Delete => self.delete,
        }
    }

    fn kinds(&self) -> impl Iterator<Item = TimeoutKind> + '_ {
        [
            TimeoutKind::Create,
            TimeoutKind::Read,
            TimeoutKind::Update,
            TimeoutKind::Delete,
        ]
        .into_iter()
        .filter(|kind| self.default_for(*kind).is_some())
    }

    /// The `timeouts` block exposing only the operations with a default.
    pub fn block(&self) -> NestedBlock {
        let attributes = self
            .kinds()
            .map(|kind| {
                AttributeBuilder::new(kind.as_str(), AttributeType::String)
                    .optional()
                    .build()
            })
            .collect();

        NestedBlock::new(TIMEOUTS_BLOCK, NestingMode::Single, attributes)
    }

    /// Timeout for `kind`: the configured value, else the resource default,
    /// else [`DEFAULT_TIMEOUT`].
    pub fn resolve(&self, kind: TimeoutKind, config: &DynamicValue) -> Result<Duration> {
        let path = AttributePath::new(TIMEOUTS_BLOCK).attribute(kind.as_str());
        match config.get_optional_string(&path) {
            Some(s) => parse_duration(&s),
            None => Ok(self.default_for(kind).unwrap_or(DEFAULT_TIMEOUT)),
        }
    }
}

/// Parses a Go duration string such as "1h30m", "45s" or "1.5h".
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || TfplugError::InvalidDuration(input.to_string());

    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total += number * seconds_per_unit;
    }

    Ok(Duration::from_secs_f64(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_go_formats() {
        assert_eq!(parse_duration("90m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for input in ["", "10", "m", "10x", "1h-2m"] {
            assert!(parse_duration(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn resolve_prefers_configured_value() {
        let timeouts = ResourceTimeouts::new()
            .create(Duration::from_secs(7200))
            .delete(Duration::from_secs(7200));

        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("timeouts").attribute("create"), "10m")
            .unwrap();

        assert_eq!(
            timeouts.resolve(TimeoutKind::Create, &config).unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(
            timeouts.resolve(TimeoutKind::Delete, &config).unwrap(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            timeouts.resolve(TimeoutKind::Read, &config).unwrap(),
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn block_lists_only_declared_operations() {
        let block = ResourceTimeouts::new()
            .create(Duration::from_secs(60))
            .update(Duration::from_secs(60))
            .block();

        let names: Vec<_> = block
            .block
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["create", "update"]);
    }
}
