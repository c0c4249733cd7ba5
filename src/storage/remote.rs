//! HTTP-backed remote store with a local proxy cache
//!
//! Fetched content is cached on disk; a cache hit younger than the
//! store's cache timeout is served without touching the origin. Origin
//! failures surface as errors so the pipeline can feed its not-found
//! cache; a plain 404 is an ordinary miss.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::{hosted::HostedStorage, sanitize_path, BackingStore};
use crate::model::{Content, PathStyle};
use crate::types::{DepotError, Result};

/// Remote store proxying one upstream origin
pub struct RemoteStorage {
    base_url: String,
    client: reqwest::Client,
    /// Local proxy cache, reusing the hosted filesystem layout
    cache: HostedStorage,
    cache_root: PathBuf,
    cache_ttl: Duration,
}

impl RemoteStorage {
    /// Create a remote store for `base_url`, caching under `cache_root`
    pub fn new(
        base_url: &str,
        client: reqwest::Client,
        cache_root: PathBuf,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache: HostedStorage::new(cache_root.clone(), PathStyle::Plain),
            cache_root,
            cache_ttl,
        }
    }

    fn url_for(&self, path: &str) -> Result<String> {
        let clean = sanitize_path(path)?;
        Ok(format!("{}/{}", self.base_url, clean))
    }

    /// A cached copy younger than the TTL, if any
    async fn fresh_cached(&self, path: &str) -> Option<Content> {
        let clean = sanitize_path(path).ok()?;
        let file = self.cache_root.join(clean);
        let meta = tokio::fs::metadata(&file).await.ok()?;
        let age = meta.modified().ok()?.elapsed().ok()?;
        if age < self.cache_ttl {
            self.cache.fetch(path).await.ok().flatten()
        } else {
            None
        }
    }

    fn map_request_error(&self, url: &str, e: reqwest::Error) -> DepotError {
        if e.is_timeout() {
            DepotError::Timeout(format!("Origin timeout: {url}"))
        } else {
            DepotError::Io(format!("Origin request failed: {url}: {e}"))
        }
    }
}

#[async_trait]
impl BackingStore for RemoteStorage {
    async fn fetch(&self, path: &str) -> Result<Option<Content>> {
        if let Some(cached) = self.fresh_cached(path).await {
            debug!(path = path, "Proxy cache hit");
            return Ok(Some(cached));
        }

        let url = self.url_for(path)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(&url, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DepotError::Io(format!(
                "Origin returned HTTP {} for {url}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(&url, e))?;

        // Best-effort: a cache write failure must not fail the fetch
        if let Err(e) = self.cache.write(path, data.clone()).await {
            warn!(path = path, error = %e, "Proxy cache write failed");
        }
        debug!(path = path, size = data.len(), url = %url, "Origin fetch cached");

        Ok(Some(Content::new(data)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        if self.fresh_cached(path).await.is_some() {
            return Ok(true);
        }

        let url = self.url_for(path)?;
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(&url, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if response.status().is_success() {
            return Ok(true);
        }
        Err(DepotError::Io(format!(
            "Origin returned HTTP {} for {url}",
            response.status()
        )))
    }

    async fn write(&self, _path: &str, _data: Bytes) -> Result<()> {
        Err(DepotError::Unsupported(
            "Remote stores are read-only proxies".into(),
        ))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        // Deleting from a remote store only drops the local proxy copy
        self.cache.delete(path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        // Origins expose no directory protocol; reflect the proxy cache
        self.cache.list(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_normalizes_slashes() {
        let storage = RemoteStorage::new(
            "https://repo1.maven.org/maven2/",
            reqwest::Client::new(),
            std::env::temp_dir().join("depot-test-cache"),
            Duration::from_secs(60),
        );
        assert_eq!(
            storage.url_for("/org/acme/app.jar").unwrap(),
            "https://repo1.maven.org/maven2/org/acme/app.jar"
        );
    }

    #[tokio::test]
    async fn test_cached_copy_served_without_origin() {
        let dir = tempfile::tempdir().unwrap();
        // Unroutable origin: any fetch reaching the network would fail
        let storage = RemoteStorage::new(
            "http://127.0.0.1:1",
            reqwest::Client::builder()
                .timeout(Duration::from_millis(200))
                .build()
                .unwrap(),
            dir.path().to_path_buf(),
            Duration::from_secs(3600),
        );

        storage
            .cache
            .write("org/acme/app.jar", Bytes::from_static(b"cached"))
            .await
            .unwrap();

        let content = storage.fetch("org/acme/app.jar").await.unwrap().unwrap();
        assert_eq!(&content.bytes[..], b"cached");
        assert!(storage.exists("org/acme/app.jar").await.unwrap());
    }

    #[tokio::test]
    async fn test_origin_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RemoteStorage::new(
            "http://127.0.0.1:1",
            reqwest::Client::builder()
                .timeout(Duration::from_millis(200))
                .build()
                .unwrap(),
            dir.path().to_path_buf(),
            Duration::from_secs(3600),
        );
        assert!(storage.fetch("org/acme/missing.jar").await.is_err());
    }

    #[tokio::test]
    async fn test_write_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RemoteStorage::new(
            "http://127.0.0.1:1",
            reqwest::Client::new(),
            dir.path().to_path_buf(),
            Duration::from_secs(60),
        );
        let err = storage.write("a.jar", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, DepotError::Unsupported(_)));
    }
}
