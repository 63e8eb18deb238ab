//! Attribute validators run during config validation

use crate::types::{AttributePath, Diagnostic, Dynamic};
use regex::Regex;

/// Validator checks a single configured attribute value. Null and unknown
/// values are never passed to validators.
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

fn invalid(path: &AttributePath, summary: String, detail: String) -> Diagnostic {
    Diagnostic::error(summary, detail).with_attribute(path.clone())
}

/// Accepts strings that parse as JSON.
pub struct StringIsJson;

impl Validator for StringIsJson {
    fn description(&self) -> String {
        "value must be valid JSON".to_string()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };
        if let Err(e) = serde_json::from_str::<serde_json::Value>(s) {
            diagnostics.push(invalid(
                path,
                format!("{} contains an invalid JSON", path),
                e.to_string(),
            ));
        }
    }
}

/// Accepts strings whose length (in characters) is within `[min, max]`.
pub struct StringLenBetween {
    pub min: usize,
    pub max: usize,
}

impl Validator for StringLenBetween {
    fn description(&self) -> String {
        format!("length must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };
        let len = s.chars().count();
        if len < self.min || len > self.max {
            diagnostics.push(invalid(
                path,
                format!(
                    "expected length of {} to be in the range ({} - {})",
                    path, self.min, self.max
                ),
                format!("Got length {}", len),
            ));
        }
    }
}

pub struct StringInSlice {
    pub valid: Vec<String>,
}

impl StringInSlice {
    pub fn new<I, S>(valid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringInSlice {
    fn description(&self) -> String {
        format!("value must be one of {:?}", self.valid)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !self.valid.iter().any(|v| v == s) {
            diagnostics.push(invalid(
                path,
                format!("expected {} to be one of {:?}", path, self.valid),
                format!("got {}", s),
            ));
        }
    }
}

pub struct StringMatch {
    pub pattern: Regex,
    pub message: String,
}

impl Validator for StringMatch {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !self.pattern.is_match(s) {
            diagnostics.push(invalid(
                path,
                format!("invalid value for {} ({})", path, self.message),
                format!("Value '{}' does not match {}", s, self.pattern),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(validator: &dyn Validator, value: Dynamic) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        validator.validate(&value, &AttributePath::new("field"), &mut diags);
        diags
    }

    #[test]
    fn string_is_json_rejects_garbage() {
        assert!(run(&StringIsJson, Dynamic::from(r#"{"a":1}"#)).is_empty());

        let diags = run(&StringIsJson, Dynamic::from("{nope"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("field")));
    }

    #[test]
    fn string_len_between_counts_characters() {
        let validator = StringLenBetween { min: 1, max: 3 };

        assert!(run(&validator, Dynamic::from("äöü")).is_empty());
        assert_eq!(run(&validator, Dynamic::from("")).len(), 1);
        assert_eq!(run(&validator, Dynamic::from("abcd")).len(), 1);
    }

    #[test]
    fn string_in_slice_accepts_listed_values() {
        let validator = StringInSlice::new(["IPV4", "IPV6"]);

        assert!(run(&validator, Dynamic::from("IPV6")).is_empty());
        assert_eq!(run(&validator, Dynamic::from("ipv6")).len(), 1);
    }

    #[test]
    fn string_match_uses_pattern() {
        let validator = StringMatch {
            pattern: Regex::new(r"^[a-z]+$").unwrap(),
            message: "lowercase letters only".to_string(),
        };

        assert!(run(&validator, Dynamic::from("abc")).is_empty());
        assert_eq!(run(&validator, Dynamic::from("aBc")).len(), 1);
    }

    #[test]
    fn validators_ignore_non_strings() {
        assert!(run(&StringIsJson, Dynamic::Number(1.0)).is_empty());
    }
}
