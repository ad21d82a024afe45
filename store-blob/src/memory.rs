//! In-memory `BlobStore` test double.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use manga_types::errors::MangaError;
use manga_types::traits::BlobStore;

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_text(&self, key: &str, body: String) -> Result<(), MangaError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.into_bytes());
        Ok(())
    }

    async fn put_binary(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), MangaError> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get_text(&self, key: &str) -> Result<String, MangaError> {
        let bytes = self.get_binary(key).await?;
        String::from_utf8(bytes)
            .map_err(|e| MangaError::Internal(format!("non-utf8 body for {key}: {e}")))
    }

    async fn get_binary(&self, key: &str) -> Result<Vec<u8>, MangaError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| MangaError::NotFound(format!("blob not found: {key}")))
    }
}
