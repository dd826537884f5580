//! Content-addressed blob storage on the local filesystem

use super::{compute_sha256, fetch, ArtifactKind, ArtifactRef};
use crate::error::{FlowError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local artifact store rooted at a directory
///
/// Layout: `<root>/blobs/<sha256>` for content, `<root>/cache/` for the task
/// cache manifests.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    download_timeout_secs: u64,
}

impl ArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>, download_timeout_secs: u64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("blobs"))?;
        fs::create_dir_all(root.join("cache"))?;
        Ok(Self {
            root,
            download_timeout_secs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        self.root.join("blobs").join(digest)
    }

    /// Store bytes under their digest; storing the same content twice is a no-op
    pub fn put_bytes(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<ArtifactRef> {
        let digest = compute_sha256(bytes);
        let path = self.blob_path(&digest);
        if !path.exists() {
            let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
            fs::write(&tmp, bytes)?;
            fs::rename(&tmp, &path)?;
            debug!(kind = %kind, digest = %digest, bytes = bytes.len(), "Stored artifact");
        }
        Ok(ArtifactRef::stored(kind, digest))
    }

    /// Copy a local file into the store
    pub fn put_file(&self, kind: ArtifactKind, path: &Path) -> Result<ArtifactRef> {
        let bytes = fs::read(path).map_err(|e| {
            FlowError::DataFetch(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.put_bytes(kind, &bytes)
    }

    /// Copy local files into the store so their identity is their content.
    /// Store and remote references pass through unchanged.
    pub fn stage(&self, artifact: &ArtifactRef) -> Result<ArtifactRef> {
        match artifact.local_path() {
            Some(path) => self.put_file(artifact.kind, Path::new(path)),
            None => Ok(artifact.clone()),
        }
    }

    /// True when the referenced content is available without a download
    pub fn contains(&self, artifact: &ArtifactRef) -> bool {
        match (artifact.store_digest(), artifact.local_path()) {
            (Some(digest), _) => self.blob_path(digest).exists(),
            (None, Some(path)) => Path::new(path).exists(),
            _ => false,
        }
    }

    /// Resolve a reference to a readable local path, downloading if remote
    pub fn resolve(&self, artifact: &ArtifactRef) -> Result<PathBuf> {
        if let Some(digest) = artifact.store_digest() {
            let path = self.blob_path(digest);
            return if path.exists() {
                Ok(path)
            } else {
                Err(FlowError::DataFetch(format!(
                    "artifact {} is missing from store {}",
                    artifact,
                    self.root.display()
                )))
            };
        }

        if artifact.is_remote() {
            let client = fetch::http_client(self.download_timeout_secs)?;
            let bytes = fetch::download(&client, &artifact.uri)?;
            let stored = self.put_bytes(artifact.kind, &bytes)?;
            return self.resolve(&stored);
        }

        let path = PathBuf::from(artifact.local_path().unwrap_or(&artifact.uri));
        if path.exists() {
            Ok(path)
        } else {
            Err(FlowError::DataFetch(format!(
                "{} does not exist",
                path.display()
            )))
        }
    }

    /// Read the full content of an artifact, verifying its digest when known
    pub fn read(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        let path = self.resolve(artifact)?;
        let bytes = fs::read(&path)?;
        if let Some(expected) = &artifact.digest {
            let actual = compute_sha256(&bytes);
            if &actual != expected {
                return Err(FlowError::DataFetch(format!(
                    "artifact {} is corrupt: digest {} does not match",
                    artifact, actual
                )));
            }
        }
        Ok(bytes)
    }
}
