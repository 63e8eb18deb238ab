//! Landing zone manifest normalization
//!
//! The service echoes `retentionDays` back as a number even when it was
//! configured as a string, and reformats the whole document. Comparing
//! normalized manifests keeps both from showing up as a diff.

use crate::errs::{Error, Result};
use serde_json::Value;

const RETENTION_DAYS: &str = "retentionDays";

/// Compact JSON with sorted keys and integer `retentionDays` values.
pub fn normalize_manifest(json: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(json).map_err(|e| Error::InvalidJson(e.to_string()))?;
    normalize_retention_days(&mut value);
    serde_json::to_string(&value).map_err(|e| Error::InvalidJson(e.to_string()))
}

fn normalize_retention_days(node: &mut Value) {
    match node {
        Value::Array(items) => items.iter_mut().for_each(normalize_retention_days),
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if key == RETENTION_DAYS {
                    if let Some(days) = value.as_str().and_then(|s| s.parse::<i64>().ok()) {
                        *value = Value::from(days);
                    }
                }
                normalize_retention_days(value);
            }
        }
        _ => {}
    }
}

/// The value stored in state for a configured manifest.
pub fn manifest_state_value(json: &str) -> String {
    normalize_manifest(json).unwrap_or_else(|_| json.to_string())
}

pub fn suppress_equivalent_manifest_diffs(old: &str, new: &str) -> bool {
    match (normalize_manifest(old), normalize_manifest(new)) {
        (Ok(old), Ok(new)) => old == new,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
    {
      "governedRegions": [
        "REGION"
      ],
      "organizationStructure": {
        "security": {
          "name": "Security"
        }
      },
      "centralizedLogging": {
        "accountId": "89XXXXXXXX39",
        "configurations": {
          "accessLoggingBucket": {
            "retentionDays": "3650"
          },
          "kmsKeyArn": "arn:PARTITION:kms:REGION:89XXXXXXXX25:key/10e27ec4-5555-4444-b408-777777777777",
          "loggingBucket": {
            "retentionDays": "365"
          }
        },
        "enabled": true
      },
      "securityRoles": {
        "accountId": "89XXXXXXXX42"
      },
      "accessManagement": {
        "enabled": true
      }
    }"#;

    #[test]
    fn normalizes_retention_days_and_layout() {
        let expected = r#"{"accessManagement":{"enabled":true},"centralizedLogging":{"accountId":"89XXXXXXXX39","configurations":{"accessLoggingBucket":{"retentionDays":3650},"kmsKeyArn":"arn:PARTITION:kms:REGION:89XXXXXXXX25:key/10e27ec4-5555-4444-b408-777777777777","loggingBucket":{"retentionDays":365}},"enabled":true},"governedRegions":["REGION"],"organizationStructure":{"security":{"name":"Security"}},"securityRoles":{"accountId":"89XXXXXXXX42"}}"#;
        assert_eq!(normalize_manifest(MANIFEST).unwrap(), expected);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_manifest(MANIFEST).unwrap();
        assert_eq!(normalize_manifest(&once).unwrap(), once);
    }

    #[test]
    fn only_integer_strings_are_converted() {
        let got = normalize_manifest(
            r#"{"a":[{"retentionDays":"forever"},{"retentionDays":"30"}],"days":"7"}"#,
        )
        .unwrap();
        assert_eq!(
            got,
            r#"{"a":[{"retentionDays":"forever"},{"retentionDays":30}],"days":"7"}"#
        );
    }

    #[test]
    fn invalid_json() {
        assert!(matches!(normalize_manifest("{"), Err(Error::InvalidJson(_))));
        assert_eq!(manifest_state_value("not json"), "not json");
    }

    #[test]
    fn equivalent_manifests_do_not_diff() {
        assert!(suppress_equivalent_manifest_diffs(
            r#"{"b": 1, "a": {"retentionDays": "90"}}"#,
            r#"{"a":{"retentionDays":90},"b":1}"#,
        ));
        assert!(!suppress_equivalent_manifest_diffs(
            r#"{"a":{"retentionDays":"90"}}"#,
            r#"{"a":{"retentionDays":60}}"#,
        ));
        assert!(!suppress_equivalent_manifest_diffs("{", "{"));
    }
}
