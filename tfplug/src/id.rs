//! Unique identifiers for resources and idempotency tokens

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

pub const UNIQUE_ID_PREFIX: &str = "terraform-";

/// Length of the part appended to the prefix: a 14 digit UTC timestamp,
/// 4 digits of sub-second precision and an 8 digit hex counter.
pub const UNIQUE_ID_SUFFIX_LENGTH: usize = 26;

static COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id() -> String {
    prefixed_unique_id(UNIQUE_ID_PREFIX)
}

/// IDs sort by creation time; the counter keeps IDs generated within the same
/// tick distinct.
pub fn prefixed_unique_id(prefix: &str) -> String {
    let now = Utc::now();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    format!(
        "{}{}{:04}{:08x}",
        prefix,
        now.format("%Y%m%d%H%M%S"),
        (now.timestamp_subsec_micros() / 100) % 10_000,
        counter
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unique_ids_have_prefix_and_fixed_suffix() {
        let id = prefixed_unique_id("tf-acc-");
        assert!(id.starts_with("tf-acc-"));
        assert_eq!(id.len(), "tf-acc-".len() + UNIQUE_ID_SUFFIX_LENGTH);
    }

    #[test]
    fn unique_ids_do_not_repeat() {
        let ids: HashSet<_> = (0..1000).map(|_| unique_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
