//! Inbound object storage
//!
//! Thin S3 client for the inbound extracts bucket: fetch a file, list pending
//! files, and remove a file once its load run has completed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use tracing::{debug, info, instrument};

pub mod config;

/// Operations a load run needs from the inbound bucket. The S3 client
/// implements this; tests script it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "edp-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for Storage {
    /// Fetch one inbound object.
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Fetching s3://{}/{}", self.bucket, key);

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to fetch s3://{}/{}", self.bucket, key))?;

        let data = object
            .body
            .collect()
            .await
            .context("failed to read object body")?
            .into_bytes()
            .to_vec();

        info!("Loaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(data)
    }

    /// Remove an inbound object.
    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to delete s3://{}/{}", self.bucket, key))?;

        info!("Removed source file: s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// List pending object keys under a prefix.
    #[instrument(skip(self))]
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("failed to list s3://{}/{}", self.bucket, prefix))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!("Found {} pending objects under {}", keys.len(), prefix);
        Ok(keys)
    }
}
