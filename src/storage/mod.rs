//! Artifact storage for per-table renderings.
//!
//! Each normalized table publishes a fixed set of artifacts (OCR payload,
//! CSV, markdown, schema, semantic summary). Artifacts are written once and
//! never rewritten; the returned URL is what chunks carry in
//! `related_files`. The filesystem store also resolves table image
//! references, fetching remote URLs over HTTP and local references from
//! disk.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by artifact stores.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Artifact could not be written.
    #[error("Failed to store artifact {name}: {source}")]
    StoreFailed {
        /// Artifact file name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Referenced artifact could not be read.
    #[error("Failed to fetch artifact {reference}: {reason}")]
    FetchFailed {
        /// Reference that failed to resolve.
        reference: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Interface implemented by artifact backends.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact under the given name and return its URL.
    async fn store_artifact(&self, name: &str, bytes: &[u8])
    -> Result<String, ArtifactStoreError>;

    /// Resolve an artifact reference to its bytes.
    async fn fetch_artifact(&self, reference: &str) -> Result<Vec<u8>, ArtifactStoreError>;
}

/// Filesystem-backed artifact store rooted at a configured directory.
pub struct FsArtifactStore {
    root: PathBuf,
    http: Client,
}

impl FsArtifactStore {
    /// Construct a store rooted at `root`; the directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let http = Client::builder()
            .user_agent("gridweave/artifacts")
            .build()
            .expect("Failed to construct reqwest::Client for artifact fetches");
        Self {
            root: root.into(),
            http,
        }
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        // Artifact names are pipeline-minted; strip any path components.
        let file_name = Path::new(name)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        self.root.join(file_name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store_artifact(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, ArtifactStoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ArtifactStoreError::StoreFailed {
                name: name.to_string(),
                source,
            })?;

        let path = self.artifact_path(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ArtifactStoreError::StoreFailed {
                name: name.to_string(),
                source,
            })?;

        tracing::debug!(name, bytes = bytes.len(), "Artifact stored");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn fetch_artifact(&self, reference: &str) -> Result<Vec<u8>, ArtifactStoreError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self.http.get(reference).send().await.map_err(|error| {
                ArtifactStoreError::FetchFailed {
                    reference: reference.to_string(),
                    reason: error.to_string(),
                }
            })?;
            if !response.status().is_success() {
                return Err(ArtifactStoreError::FetchFailed {
                    reference: reference.to_string(),
                    reason: format!("server returned {}", response.status()),
                });
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|error| ArtifactStoreError::FetchFailed {
                    reference: reference.to_string(),
                    reason: error.to_string(),
                })?;
            return Ok(bytes.to_vec());
        }

        let path = Path::new(reference);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        tokio::fs::read(&path)
            .await
            .map_err(|error| ArtifactStoreError::FetchFailed {
                reference: reference.to_string(),
                reason: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use tempfile::TempDir;

    #[tokio::test]
    async fn stores_and_fetches_artifact_by_name() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());

        let url = store
            .store_artifact("t1.csv", b"a,b\n1,2\n")
            .await
            .expect("store");
        assert!(url.ends_with("t1.csv"));

        let bytes = store.fetch_artifact("t1.csv").await.expect("fetch");
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn path_components_in_names_are_stripped() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());

        let url = store
            .store_artifact("../escape.md", b"| a |")
            .await
            .expect("store");
        assert!(url.ends_with("escape.md"));
        assert!(dir.path().join("escape.md").exists());
    }

    #[tokio::test]
    async fn fetches_remote_references_over_http() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());

        server
            .mock_async(|when, then| {
                when.method(GET).path("/images/t1.png");
                then.status(200).body("png-bytes");
            })
            .await;

        let bytes = store
            .fetch_artifact(&format!("{}/images/t1.png", server.base_url()))
            .await
            .expect("fetch");
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn missing_artifact_is_a_fetch_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());
        let error = store.fetch_artifact("absent.csv").await.expect_err("error");
        assert!(matches!(error, ArtifactStoreError::FetchFailed { .. }));
    }
}
