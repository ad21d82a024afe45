//! S3-backed `BlobStore` (C2). Keys are opaque strings produced by
//! `manga_types::keys`; this adapter does no path interpretation of its own.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use manga_types::errors::MangaError;
use manga_types::traits::BlobStore;

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config), bucket)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_text(&self, key: &str, body: String) -> Result<(), MangaError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/markdown; charset=utf-8")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("s3 put_object failed for {key}: {e}")))?;
        Ok(())
    }

    async fn put_binary(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), MangaError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("s3 put_object failed for {key}: {e}")))?;
        Ok(())
    }

    async fn get_text(&self, key: &str) -> Result<String, MangaError> {
        let bytes = self.get_binary(key).await?;
        String::from_utf8(bytes)
            .map_err(|e| MangaError::Internal(format!("non-utf8 body for {key}: {e}")))
    }

    async fn get_binary(&self, key: &str) -> Result<Vec<u8>, MangaError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NoSuchKey") {
                    MangaError::NotFound(format!("blob not found: {key}"))
                } else {
                    MangaError::Transient(format!("s3 get_object failed for {key}: {msg}"))
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| MangaError::Transient(format!("s3 body read failed for {key}: {e}")))?
            .into_bytes()
            .to_vec();
        Ok(bytes)
    }
}
