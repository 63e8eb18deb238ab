//! Amazon Resource Names

use crate::errs::{Error, Result};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "arn";
const SECTIONS: usize = 6;

/// `arn:partition:service:region:account-id:resource`
///
/// `resource` keeps any further `:` or `/` separators, e.g.
/// `landingzone/1A2B3C4D5E6F`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };

        let sections: Vec<&str> = s.splitn(SECTIONS, ':').collect();
        if sections.first() != Some(&PREFIX) {
            return Err(invalid("invalid prefix"));
        }
        if sections.len() != SECTIONS {
            return Err(invalid("not enough sections"));
        }

        Ok(Self {
            partition: sections[1].to_string(),
            service: sections[2].to_string(),
            region: sections[3].to_string(),
            account_id: sections[4].to_string(),
            resource: sections[5].to_string(),
        })
    }
}

impl FromStr for Arn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            PREFIX, self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}
