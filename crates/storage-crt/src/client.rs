//! AWS SDK S3 client implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ErrorDocument, IndexDocument,
    PublicAccessBlockConfiguration, WebsiteConfiguration,
};
use aws_sdk_s3::Client as S3Client;

use hoist_common::content_hash_from_hex;
use hoist_storage::{ObjectHeaders, ObjectInfo, ObjectStore, StorageError, WebsiteConfig};

use crate::error::CrtError;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Service error codes reported when the caller lacks permission.
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AllAccessDisabled", "Forbidden"];

/// Static credentials supplied instead of the default provider chain.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Connection settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// AWS region.
    pub region: String,
    /// Explicit credentials, or `None` for the default provider chain.
    pub credentials: Option<AwsCredentials>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint_url: Option<String>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            credentials: None,
            endpoint_url: None,
        }
    }
}

/// ObjectStore implementation using AWS SDK for Rust.
pub struct CrtStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
}

impl CrtStorageClient {
    /// Create a new client with the default credential chain.
    ///
    /// # Arguments
    /// * `settings` - Region, optional credentials and endpoint
    ///
    /// # Returns
    /// A new S3 object store client.
    pub async fn new(settings: S3Settings) -> Result<Self, StorageError> {
        if settings.region.is_empty() {
            return Err(CrtError::ConfigError("region must not be empty".into()).into());
        }

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "hoist",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let config_loader = match settings.endpoint_url {
            Some(ref url) => config_loader.endpoint_url(url),
            None => config_loader,
        };

        let sdk_config = config_loader.load().await;
        let s3_client = S3Client::new(&sdk_config);

        Ok(Self { s3_client })
    }
}

/// Map a service error code to a storage error.
///
/// Permission failures become `AccessDenied` so callers can tell them apart
/// from transient network trouble; everything else is an SDK error.
fn classify_failure(
    code: Option<&str>,
    message: String,
    bucket: &str,
    key: &str,
    retryable: bool,
) -> StorageError {
    match code {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        },
        _ => CrtError::SdkError { message, retryable }.into(),
    }
}

fn service_failure<E>(service_err: &E, bucket: &str, key: &str, retryable: bool) -> StorageError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    classify_failure(
        service_err.code(),
        service_err.to_string(),
        bucket,
        key,
        retryable,
    )
}

/// Bucket policy granting anonymous `GetObject` on every key.
fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }],
    })
    .to_string()
}

fn public_access_block(block: bool) -> PublicAccessBlockConfiguration {
    PublicAccessBlockConfiguration::builder()
        .block_public_acls(block)
        .ignore_public_acls(block)
        .block_public_policy(block)
        .restrict_public_buckets(block)
        .build()
}

#[async_trait]
impl ObjectStore for CrtStorageClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.s3_client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(service_failure(&service_err, bucket, "", false))
                }
            }
        }
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        location_hint: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut request = self.s3_client.create_bucket().bucket(bucket);

        // us-east-1 is the implicit location and must not be sent explicitly.
        if let Some(location) = location_hint.filter(|l| *l != DEFAULT_REGION) {
            let configuration: CreateBucketConfiguration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(location))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you() {
                    log::debug!("Bucket {} already owned", bucket);
                    Ok(())
                } else {
                    Err(service_failure(&service_err, bucket, "", false))
                }
            }
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects: Vec<ObjectInfo> = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.s3_client.list_objects_v2().bucket(bucket);

            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_bucket() {
                    StorageError::BucketNotFound {
                        bucket: bucket.to_string(),
                    }
                } else {
                    service_failure(&service_err, bucket, prefix, true)
                }
            })?;

            if let Some(ref contents) = response.contents {
                for obj in contents {
                    objects.push(ObjectInfo {
                        key: obj.key().unwrap_or_default().to_string(),
                        size: obj.size().map(|s| s as u64).unwrap_or(0),
                        content_hash: obj.e_tag().and_then(content_hash_from_hex),
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token.clone();
            } else {
                break;
            }
        }

        log::debug!("Listed {} objects in {}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = match self.s3_client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(service_failure(&service_err, bucket, key, true));
            }
        };

        let data: Vec<u8> = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::NetworkError {
                message: e.to_string(),
                retryable: true,
            })?
            .into_bytes()
            .to_vec();

        Ok(Some(data))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from(data.to_vec());

        let mut request = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(&headers.content_type)
            .cache_control(&headers.cache_control)
            .set_content_encoding(headers.content_encoding.clone());

        for (k, v) in headers.user_metadata() {
            request = request.metadata(k, v);
        }

        request
            .send()
            .await
            .map_err(|err| service_failure(&err.into_service_error(), bucket, key, true))?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.s3_client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| service_failure(&err.into_service_error(), bucket, key, true))?;

        Ok(())
    }

    async fn configure_website(
        &self,
        bucket: &str,
        website: &WebsiteConfig,
    ) -> Result<(), StorageError> {
        let index: IndexDocument = IndexDocument::builder()
            .suffix(&website.index_document)
            .build()
            .map_err(|e| CrtError::ConfigError(e.to_string()))?;
        let not_found: ErrorDocument = ErrorDocument::builder()
            .key(&website.not_found_document)
            .build()
            .map_err(|e| CrtError::ConfigError(e.to_string()))?;
        let configuration: WebsiteConfiguration = WebsiteConfiguration::builder()
            .index_document(index)
            .error_document(not_found)
            .build();

        self.s3_client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(configuration)
            .send()
            .await
            .map_err(|err| service_failure(&err.into_service_error(), bucket, "", false))?;

        log::debug!(
            "Website hosting on {} serves {} and {}",
            bucket,
            website.index_document,
            website.not_found_document
        );
        Ok(())
    }

    async fn set_public_access(&self, bucket: &str, public: bool) -> Result<(), StorageError> {
        if public {
            // The block has to be lifted before S3 accepts a public policy.
            self.s3_client
                .put_public_access_block()
                .bucket(bucket)
                .public_access_block_configuration(public_access_block(false))
                .send()
                .await
                .map_err(|err| service_failure(&err.into_service_error(), bucket, "", false))?;

            self.s3_client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(public_read_policy(bucket))
                .send()
                .await
                .map_err(|err| service_failure(&err.into_service_error(), bucket, "", false))?;
        } else {
            self.s3_client
                .delete_bucket_policy()
                .bucket(bucket)
                .send()
                .await
                .map_err(|err| service_failure(&err.into_service_error(), bucket, "", false))?;

            self.s3_client
                .put_public_access_block()
                .bucket(bucket)
                .public_access_block_configuration(public_access_block(true))
                .send()
                .await
                .map_err(|err| service_failure(&err.into_service_error(), bucket, "", false))?;
        }

        log::info!(
            "Bucket {} is now {}",
            bucket,
            if public { "public" } else { "private" }
        );
        Ok(())
    }
}
