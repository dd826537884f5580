//! Artifact references and the local artifact store
//!
//! An [`ArtifactRef`] is an opaque handle to a blob: the raw dataset, a
//! serialized model, or a persisted table. Stages never open artifacts
//! directly; they ask the [`ArtifactStore`] to resolve a reference to a local
//! path, which downloads remote sources on demand.

pub mod fetch;
mod store;

pub use store::ArtifactStore;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const STORE_SCHEME: &str = "store://";

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Raw input dataset (CSV)
    Dataset,
    /// Serialized model
    Model,
    /// Table persisted by the task cache
    Table,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Dataset => "dataset",
            ArtifactKind::Model => "model",
            ArtifactKind::Table => "table",
        };
        f.write_str(s)
    }
}

/// Immutable handle to a blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    /// `store://<sha256>`, a local path, or an `http(s)://` URL
    pub uri: String,
    /// SHA-256 of the content, when known
    pub digest: Option<String>,
}

impl ArtifactRef {
    /// Reference a dataset by location; content is fetched lazily
    pub fn dataset(source: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Dataset,
            uri: source.into(),
            digest: None,
        }
    }

    /// Reference content held by the store
    pub fn stored(kind: ArtifactKind, digest: impl Into<String>) -> Self {
        let digest = digest.into();
        Self {
            kind,
            uri: format!("{}{}", STORE_SCHEME, digest),
            digest: Some(digest),
        }
    }

    /// Identity used for fingerprinting: the digest when known, else the URI
    pub fn identity(&self) -> &str {
        self.digest.as_deref().unwrap_or(&self.uri)
    }

    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }

    /// Digest part of a `store://` URI
    pub fn store_digest(&self) -> Option<&str> {
        self.uri.strip_prefix(STORE_SCHEME)
    }

    /// Local filesystem path for path-like URIs
    pub fn local_path(&self) -> Option<&str> {
        if self.is_remote() || self.store_digest().is_some() {
            None
        } else {
            Some(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.uri)
    }
}

/// Compute SHA-256 hash of data
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
