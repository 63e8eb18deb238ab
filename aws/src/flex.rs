//! Helpers for moving values between Terraform state and SDK shapes

use tfplug::Dynamic;

/// Uniform access to SDK output fields, some of which are generated as `&T`
/// and some as `Option<&T>` depending on the service model.
pub trait Optional<'a, T: ?Sized> {
    fn optional(self) -> Option<&'a T>;
}

impl<'a, T: ?Sized> Optional<'a, T> for &'a T {
    fn optional(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T: ?Sized> Optional<'a, T> for Option<&'a T> {
    fn optional(self) -> Option<&'a T> {
        self
    }
}

/// Owned string from an SDK accessor, `None` for absent or empty values.
pub fn to_string_opt<'a>(value: impl Optional<'a, str>) -> Option<String> {
    value
        .optional()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-empty strings of a Terraform list, in order. Nulls and unknowns are
/// skipped.
pub fn expand_string_list(values: &[Dynamic]) -> Vec<String> {
    values
        .iter()
        .filter_map(Dynamic::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn flatten_string_list<I, S>(values: I) -> Vec<Dynamic>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(|s| Dynamic::String(s.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_bridges_required_and_optional_accessors() {
        let required: &str = "arn:aws:acm";
        let optional: Option<&str> = None;

        assert_eq!(to_string_opt(required), Some("arn:aws:acm".to_string()));
        assert_eq!(to_string_opt(optional), None);
        assert_eq!(to_string_opt(""), None);
    }

    #[test]
    fn expand_string_list_skips_nulls_and_empties() {
        let values = vec![
            Dynamic::from("vpc-cni"),
            Dynamic::Null,
            Dynamic::from(""),
            Dynamic::from("kube-proxy"),
        ];
        assert_eq!(expand_string_list(&values), vec!["vpc-cni", "kube-proxy"]);
    }
}
