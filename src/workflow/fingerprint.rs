//! Content-addressed task keys

use super::value::{PortValues, Value};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 over a stage's name, cache version, parameters and input digests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(
        stage: &str,
        cache_version: &str,
        params: &str,
        inputs: &PortValues,
    ) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(b"boostflow-task\0");
        hasher.update(stage.as_bytes());
        hasher.update(b"\0");
        hasher.update(cache_version.as_bytes());
        hasher.update(b"\0");
        hasher.update(params.as_bytes());
        hasher.update(b"\0");
        // PortValues iterates in name order
        for (name, value) in inputs.iter() {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value_digest(value)?.as_bytes());
            hasher.update(b"\0");
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for logs
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable digest of a single value
pub fn value_digest(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Csv(a) => format!("csv:{}", a.identity()),
        Value::Blob(a) => format!("blob:{}", a.identity()),
        Value::Integer(v) => format!("int:{}", v),
        Value::Float(v) => format!("float:{:016x}", v.to_bits()),
        Value::Table(t) => format!("table:{}", t.content_hash()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactRef;

    fn inputs(seed: i64) -> PortValues {
        PortValues::new()
            .with("dataset", Value::Csv(ArtifactRef::dataset("https://example.com/d.csv")))
            .with("seed", Value::Integer(seed))
            .with("test_split_ratio", Value::Float(0.33))
    }

    #[test]
    fn test_stable_for_same_inputs() {
        let a = Fingerprint::compute("split", "1.0", "", &inputs(7)).unwrap();
        let b = Fingerprint::compute("split", "1.0", "", &inputs(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_sensitive_to_every_component() {
        let base = Fingerprint::compute("split", "1.0", "", &inputs(7)).unwrap();
        assert_ne!(base, Fingerprint::compute("split", "1.0", "", &inputs(8)).unwrap());
        assert_ne!(base, Fingerprint::compute("split", "1.1", "", &inputs(7)).unwrap());
        assert_ne!(base, Fingerprint::compute("fit", "1.0", "", &inputs(7)).unwrap());
        assert_ne!(base, Fingerprint::compute("split", "1.0", "abc", &inputs(7)).unwrap());
    }

    #[test]
    fn test_integer_and_float_differ() {
        assert_ne!(
            value_digest(&Value::Integer(1)).unwrap(),
            value_digest(&Value::Float(1.0)).unwrap()
        );
    }
}
