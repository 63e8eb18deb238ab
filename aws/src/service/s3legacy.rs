//! Amazon S3, legacy bucket support
//!
//! Clients here keep the old addressing rules: us-east-1 resolves to the
//! global endpoint unless regional endpoints are requested, and path-style
//! addressing follows the provider setting.

use crate::conns::{call, AwsClient, ClientConfig, ClientFactory};
use crate::errs::{err_code_equals, Result, ResultExt};
use crate::names;
use crate::retry::{retry_on_aws_code, ErrorRetryClassifier, IsErrorRetryables, Ternary};
use crate::tags::{self, KeyValueTags, TagService};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::delete_bucket::DeleteBucketError;
use aws_sdk_s3::operation::put_bucket_policy::PutBucketPolicyError;
use aws_sdk_s3::operation::put_bucket_tagging::PutBucketTaggingError;
use aws_sdk_s3::types::{Tag, Tagging};
use aws_sdk_s3::{config, Client};
use tfplug::Context;

pub const ERR_CODE_NO_SUCH_BUCKET: &str = "NoSuchBucket";
pub const ERR_CODE_NO_SUCH_TAG_SET: &str = "NoSuchTagSet";
pub const ERR_CODE_OPERATION_ABORTED: &str = "OperationAborted";

const CONFLICTING_OPERATION_MESSAGE: &str =
    "A conflicting conditional operation is currently in progress against this resource. Please try again.";

pub struct ServicePackage;

impl super::ServicePackage for ServicePackage {
    fn service_package_name(&self) -> &'static str {
        names::S3
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        Some(ClientFactory::with_customizer(new_client, customize_client))
    }

    fn tag_service(&self) -> Option<&dyn TagService> {
        Some(&BucketTags)
    }
}

fn new_client(config: &ClientConfig) -> Result<Client> {
    let region = config.s3_region().to_string();
    let mut builder = config::Builder::from(&config.sdk_config)
        .region(Region::new(region.clone()))
        .force_path_style(config.s3_use_path_style);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    tracing::debug!(
        region = %region,
        path_style = config.s3_use_path_style,
        "building S3 client"
    );
    Ok(Client::from_conf(builder.build()))
}

/// Concurrent bucket configuration changes abort each other; the loser can
/// simply try again.
pub fn is_error_retryables() -> IsErrorRetryables {
    IsErrorRetryables::new().with(|err| {
        if err.message_contains(ERR_CODE_OPERATION_ABORTED, CONFLICTING_OPERATION_MESSAGE) {
            Ternary::True
        } else {
            Ternary::Unknown
        }
    })
}

fn customize_client(client: Client) -> Result<Client> {
    let checks = is_error_retryables();
    let conf = client
        .config()
        .to_builder()
        .retry_classifier(ErrorRetryClassifier::<CreateBucketError>::new(checks.clone()))
        .retry_classifier(ErrorRetryClassifier::<DeleteBucketError>::new(checks.clone()))
        .retry_classifier(ErrorRetryClassifier::<PutBucketPolicyError>::new(checks.clone()))
        .retry_classifier(ErrorRetryClassifier::<PutBucketTaggingError>::new(checks))
        .build();
    Ok(Client::from_conf(conf))
}

/// Bucket tags. S3 replaces the whole tag set on every write, and a bucket
/// that was just created may not be visible yet.
pub struct BucketTags;

#[async_trait]
impl TagService for BucketTags {
    async fn list_tags(&self, ctx: &Context, client: &AwsClient, bucket: &str) -> Result<()> {
        let conn = client.s3_client()?;
        let output = retry_on_aws_code(ctx, ERR_CODE_NO_SUCH_BUCKET, || {
            call(ctx, conn.get_bucket_tagging().bucket(bucket).send())
        })
        .await;

        let tags = match output {
            Ok(output) => output
                .tag_set()
                .iter()
                .map(|tag| (tag.key(), tag.value()))
                .collect::<KeyValueTags>(),
            Err(err) if err_code_equals(&err, ERR_CODE_NO_SUCH_TAG_SET) => KeyValueTags::new(),
            Err(err) => return Err(err.context(format!("listing tags for S3 Bucket ({})", bucket))),
        };

        tags::set_tags_out(ctx, tags);
        Ok(())
    }

    async fn update_tags(
        &self,
        ctx: &Context,
        client: &AwsClient,
        bucket: &str,
        _old: &KeyValueTags,
        new: &KeyValueTags,
    ) -> Result<()> {
        let conn = client.s3_client()?;
        let new = new.ignore_aws();

        if new.is_empty() {
            retry_on_aws_code(ctx, ERR_CODE_NO_SUCH_BUCKET, || {
                call(ctx, conn.delete_bucket_tagging().bucket(bucket).send())
            })
            .await
            .context(format!("deleting tags for S3 Bucket ({})", bucket))?;
            return Ok(());
        }

        let tagging = tagging(&new)?;
        retry_on_aws_code(ctx, ERR_CODE_NO_SUCH_BUCKET, || {
            call(
                ctx,
                conn.put_bucket_tagging()
                    .bucket(bucket)
                    .tagging(tagging.clone())
                    .send(),
            )
        })
        .await
        .context(format!("updating tags for S3 Bucket ({})", bucket))?;
        Ok(())
    }
}

fn tagging(tags: &KeyValueTags) -> Result<Tagging> {
    let tag_set = tags
        .map()
        .iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Tagging::builder().set_tag_set(Some(tag_set)).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conns::UsEast1RegionalEndpoint;
    use crate::errs::ApiError;
    use aws_config::{BehaviorVersion, SdkConfig};

    fn client_config(region: &str, setting: UsEast1RegionalEndpoint, endpoint: Option<&str>) -> ClientConfig {
        ClientConfig {
            sdk_config: SdkConfig::builder()
                .behavior_version(BehaviorVersion::latest())
                .build(),
            endpoint: endpoint.map(str::to_string),
            region: region.to_string(),
            s3_use_path_style: false,
            s3_us_east_1_regional_endpoint: setting,
        }
    }

    #[test]
    fn us_east_1_legacy_uses_the_global_region() {
        let client = new_client(&client_config(
            "us-east-1",
            UsEast1RegionalEndpoint::Legacy,
            None,
        ))
        .unwrap();
        assert_eq!(client.config().region().map(|r| r.as_ref()), Some("aws-global"));

        let client = new_client(&client_config(
            "us-east-1",
            UsEast1RegionalEndpoint::Regional,
            None,
        ))
        .unwrap();
        assert_eq!(client.config().region().map(|r| r.as_ref()), Some("us-east-1"));
    }

    #[test]
    fn endpoint_override_keeps_the_configured_region() {
        let client = new_client(&client_config(
            "us-east-1",
            UsEast1RegionalEndpoint::Legacy,
            Some("http://localhost:4566"),
        ))
        .unwrap();
        assert_eq!(client.config().region().map(|r| r.as_ref()), Some("us-east-1"));
    }

    #[test]
    fn conflicting_operations_are_retried() {
        let checks = is_error_retryables();

        let conflict = ApiError::service(ERR_CODE_OPERATION_ABORTED, CONFLICTING_OPERATION_MESSAGE);
        assert_eq!(checks.evaluate(&conflict), Ternary::True);

        let other = ApiError::service(ERR_CODE_OPERATION_ABORTED, "Bucket is being deleted");
        assert_eq!(checks.evaluate(&other), Ternary::Unknown);
    }

    #[test]
    fn tag_set_is_sorted_by_key() {
        let tags = KeyValueTags::from_iter([("Name", "logs"), ("env", "prod")]);
        let tagging = tagging(&tags).unwrap();
        let keys: Vec<_> = tagging.tag_set().iter().map(|t| t.key()).collect();
        assert_eq!(keys, vec!["Name", "env"]);
    }
}
