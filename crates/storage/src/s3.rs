//! S3-backed object store.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use pipeline_core::{Error, ObjectStore, Result};
use tracing::{debug, info};

use crate::config::StorageConfig;

/// Object store over the AWS S3 API (or any compatible endpoint).
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Builds a client from the default AWS credential chain plus overrides.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        info!(
            region = config.region.as_deref().unwrap_or("default"),
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            "Created S3 object store client"
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }

    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::object_store(format!(
                    "get s3://{}/{} failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        let data = response.body.collect().await.map_err(|e| {
            Error::object_store(format!("reading s3://{}/{} failed: {}", bucket, key, e))
        })?;

        let bytes = data.into_bytes();
        debug!(bucket = bucket, key = key, bytes = bytes.len(), "Fetched object");

        String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::tabular(format!("s3://{}/{} is not valid UTF-8: {}", bucket, key, e))
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let len = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                Error::object_store(format!(
                    "put s3://{}/{} failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(bucket = bucket, key = key, bytes = len, "Stored object");
        Ok(())
    }
}
