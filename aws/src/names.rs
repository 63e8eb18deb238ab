//! Service package names, common attribute names and region helpers

pub const ACM: &str = "acm";
pub const CONTROL_TOWER: &str = "controltower";
pub const DATA_ZONE: &str = "datazone";
pub const ECR: &str = "ecr";
pub const EKS: &str = "eks";
pub const LAMBDA: &str = "lambda";
pub const OSIS: &str = "osis";
pub const S3: &str = "s3legacy";
pub const WAF_REGIONAL: &str = "wafregional";

pub const ATTR_ARN: &str = "arn";
pub const ATTR_ID: &str = "id";
pub const ATTR_NAME: &str = "name";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_TAGS: &str = "tags";
pub const ATTR_TAGS_ALL: &str = "tags_all";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_VALUE: &str = "value";
pub const ATTR_VERSION: &str = "version";

pub const GLOBAL_REGION: &str = "aws-global";
pub const US_EAST_1: &str = "us-east-1";

pub const STANDARD_PARTITION: &str = "aws";
pub const CHINA_PARTITION: &str = "aws-cn";
pub const US_GOV_PARTITION: &str = "aws-us-gov";
pub const ISO_PARTITION: &str = "aws-iso";
pub const ISOB_PARTITION: &str = "aws-iso-b";

/// Display name used in log and error messages, e.g. "ControlTower".
pub fn human_friendly(service_package_name: &str) -> Option<&'static str> {
    let name = match service_package_name {
        ACM => "ACM",
        CONTROL_TOWER => "ControlTower",
        DATA_ZONE => "DataZone",
        ECR => "ECR",
        EKS => "EKS",
        LAMBDA => "Lambda",
        OSIS => "OpenSearch Ingestion",
        S3 => "S3",
        WAF_REGIONAL => "WAF Regional",
        _ => return None,
    };
    Some(name)
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        CHINA_PARTITION
    } else if region.starts_with("us-gov-") {
        US_GOV_PARTITION
    } else if region.starts_with("us-isob-") {
        ISOB_PARTITION
    } else if region.starts_with("us-iso-") {
        ISO_PARTITION
    } else {
        STANDARD_PARTITION
    }
}
