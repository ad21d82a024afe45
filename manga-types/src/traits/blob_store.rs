//! BlobStore (C2): content-addressed object storage keyed by the layout in
//! `crate::keys`.

use async_trait::async_trait;

use crate::errors::MangaError;

#[cfg_attr(any(test, feature = "mocking"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    async fn put_text(&self, key: &str, body: String) -> Result<(), MangaError>;

    async fn put_binary(&self, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), MangaError>;

    async fn get_text(&self, key: &str) -> Result<String, MangaError>;

    async fn get_binary(&self, key: &str) -> Result<Vec<u8>, MangaError>;
}
