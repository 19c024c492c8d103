use async_trait::async_trait;

use super::{StorageBackend, StorageError};

/// Remote HTTP blob store: blobs are PUT under the configured endpoint and
/// addressed by the resulting URL, authenticated by a bearer token.
pub struct BlobStorage {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl BlobStorage {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            client: reqwest::Client::new(),
            endpoint,
            token: token.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for BlobStorage {
    async fn store(&self, id: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let url = format!(
            "{}/react-apps/{id}-{}.zip",
            self.endpoint,
            chrono::Utc::now().timestamp_millis()
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(bytes.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StorageError::UnexpectedStatus(response.status().as_u16()));
        }
        log::debug!("uploaded archive to {url}");
        Ok(url)
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self.client.get(reference).send().await?;
        if !response.status().is_success() {
            log::error!(
                "failed to fetch blob {reference}: status {}",
                response.status()
            );
            return Ok(None);
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn delete(&self, reference: &str) {
        match self
            .client
            .delete(reference)
            .bearer_auth(&self.token)
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                log::warn!(
                    "could not delete blob {reference}: status {}",
                    response.status()
                );
            }
            Ok(_) => log::debug!("deleted blob {reference}"),
            Err(e) => log::warn!("could not delete blob {reference}: {e}"),
        }
    }
}
