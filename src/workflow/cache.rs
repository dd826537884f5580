//! Disk-backed task cache
//!
//! One JSON manifest per fingerprint under `<store>/cache/`. Scalar outputs
//! are inlined in the manifest; tables are persisted as Parquet blobs in the
//! artifact store and rehydrated against the schema the stage declares.

use super::fingerprint::Fingerprint;
use super::stage::StageInterface;
use super::value::{PortType, PortValues, Value};
use crate::artifact::{ArtifactKind, ArtifactRef, ArtifactStore};
use crate::data::{TableLoader, TableWriter};
use crate::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serialized form of one output value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CachedValue {
    Csv { artifact: ArtifactRef },
    Blob { artifact: ArtifactRef },
    Integer { value: i64 },
    Float { value: f64 },
    Table {
        schema: String,
        rows: usize,
        content_hash: String,
        artifact: ArtifactRef,
    },
}

/// Manifest of one cached stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub node: String,
    pub stage: String,
    pub cache_version: String,
    pub created_at: DateTime<Utc>,
    pub outputs: BTreeMap<String, CachedValue>,
}

#[derive(Debug, Clone)]
pub struct TaskCache {
    store: Arc<ArtifactStore>,
    dir: PathBuf,
}

impl TaskCache {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        let dir = store.cache_dir();
        Self { store, dir }
    }

    fn manifest_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }

    /// Cached outputs for `fingerprint`, or `None` on a miss
    ///
    /// Unreadable manifests and missing blobs count as misses so that a
    /// damaged cache only costs a re-run.
    pub fn lookup(
        &self,
        fingerprint: &Fingerprint,
        interface: &StageInterface,
    ) -> Result<Option<PortValues>> {
        let path = self.manifest_path(fingerprint);
        if !path.exists() {
            return Ok(None);
        }

        let entry: CacheEntry = match fs::read(&path)
            .map_err(FlowError::from)
            .and_then(|bytes| Ok(serde_json::from_slice::<CacheEntry>(&bytes)?))
        {
            Ok(entry) => entry,
            Err(e) => {
                warn!(fingerprint = %fingerprint.short(), error = %e, "Ignoring unreadable cache entry");
                return Ok(None);
            }
        };

        match self.rehydrate(&entry, interface) {
            Ok(values) => Ok(Some(values)),
            Err(e) => {
                warn!(fingerprint = %fingerprint.short(), error = %e, "Ignoring stale cache entry");
                Ok(None)
            }
        }
    }

    fn rehydrate(&self, entry: &CacheEntry, interface: &StageInterface) -> Result<PortValues> {
        let mut values = PortValues::new();
        for port in &interface.outputs {
            let cached = entry.outputs.get(&port.name).ok_or_else(|| {
                FlowError::ExecutionError(format!("cache entry lacks output `{}`", port.name))
            })?;
            let value = match (cached, &port.ty) {
                (CachedValue::Csv { artifact }, PortType::Csv) => {
                    self.require(artifact)?;
                    Value::Csv(artifact.clone())
                }
                (CachedValue::Blob { artifact }, PortType::Blob) => {
                    self.require(artifact)?;
                    Value::Blob(artifact.clone())
                }
                (CachedValue::Integer { value }, PortType::Integer) => Value::Integer(*value),
                (CachedValue::Float { value }, PortType::Float) => Value::Float(*value),
                (
                    CachedValue::Table {
                        artifact,
                        content_hash,
                        ..
                    },
                    PortType::Table(schema),
                ) => {
                    let path = self.store.resolve(artifact)?;
                    let table = TableLoader::new().load_parquet(&path, schema)?;
                    if &table.content_hash()? != content_hash {
                        return Err(FlowError::ExecutionError(format!(
                            "cached table `{}` does not match its recorded hash",
                            port.name
                        )));
                    }
                    Value::Table(table)
                }
                (other, ty) => {
                    return Err(FlowError::SchemaMismatch(format!(
                        "cached output `{}` is {:?}, port expects {}",
                        port.name, other, ty
                    )))
                }
            };
            values.insert(port.name.clone(), value);
        }
        Ok(values)
    }

    fn require(&self, artifact: &ArtifactRef) -> Result<()> {
        if artifact.store_digest().is_some() && !self.store.contains(artifact) {
            return Err(FlowError::DataFetch(format!("{} is missing", artifact)));
        }
        Ok(())
    }

    /// Record the outputs of a successful execution
    pub fn store(
        &self,
        fingerprint: &Fingerprint,
        node: &str,
        stage: &str,
        cache_version: &str,
        outputs: &PortValues,
    ) -> Result<CacheEntry> {
        let mut cached = BTreeMap::new();
        for (name, value) in outputs.iter() {
            let entry = match value {
                Value::Csv(a) => CachedValue::Csv { artifact: a.clone() },
                Value::Blob(a) => CachedValue::Blob { artifact: a.clone() },
                Value::Integer(v) => CachedValue::Integer { value: *v },
                Value::Float(v) => CachedValue::Float { value: *v },
                Value::Table(t) => {
                    let tmp = self.dir.join(format!("{}.parquet.tmp", uuid::Uuid::new_v4()));
                    TableWriter::save_parquet(t, &tmp)?;
                    let artifact = self.store.put_file(ArtifactKind::Table, &tmp);
                    let _ = fs::remove_file(&tmp);
                    CachedValue::Table {
                        schema: t.schema().name().to_string(),
                        rows: t.height(),
                        content_hash: t.content_hash()?,
                        artifact: artifact?,
                    }
                }
            };
            cached.insert(name.clone(), entry);
        }

        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            node: node.to_string(),
            stage: stage.to_string(),
            cache_version: cache_version.to_string(),
            created_at: Utc::now(),
            outputs: cached,
        };

        let path = self.manifest_path(fingerprint);
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_vec_pretty(&entry)?)?;
        fs::rename(&tmp, &path)?;
        debug!(node, fingerprint = %fingerprint.short(), "Cached stage outputs");

        Ok(entry)
    }

    /// Every readable manifest, oldest first
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        if !self.dir.exists() {
            return Ok(entries);
        }
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path).map(|b| serde_json::from_slice::<CacheEntry>(&b)) {
                Ok(Ok(entry)) => entries.push(entry),
                _ => warn!(path = %path.display(), "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    /// Drop one entry; returns whether it existed
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let path = self.manifest_path(fingerprint);
        if path.exists() {
            fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove every manifest; blobs stay in the store
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        if !self.dir.exists() {
            return Ok(removed);
        }
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DatasetSchemas, Table};
    use polars::df;

    fn setup() -> (tempfile::TempDir, TaskCache) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path(), 5).unwrap());
        (dir, TaskCache::new(store))
    }

    fn interface() -> StageInterface {
        StageInterface::new()
            .output("accuracy", PortType::Float)
            .output("y", PortType::Table(DatasetSchemas::pima().labels))
    }

    fn outputs() -> PortValues {
        let labels = DatasetSchemas::pima().labels;
        let y = Table::new(labels, df!("class" => [1i64, 0, 1]).unwrap()).unwrap();
        PortValues::new()
            .with("accuracy", Value::Float(0.75))
            .with("y", Value::Table(y))
    }

    fn fp(tag: &str) -> Fingerprint {
        Fingerprint::compute(tag, "1.0", "", &PortValues::new()).unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let (_dir, cache) = setup();
        let key = fp("metrics");
        assert!(cache.lookup(&key, &interface()).unwrap().is_none());

        cache.store(&key, "metrics", "metrics", "1.0", &outputs()).unwrap();
        let hit = cache.lookup(&key, &interface()).unwrap().unwrap();
        assert_eq!(hit.float("accuracy").unwrap(), 0.75);
        let y = hit.table("y").unwrap();
        assert_eq!(y.height(), 3);
        assert_eq!(y.label_values().unwrap(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_corrupt_manifest_is_a_miss() {
        let (_dir, cache) = setup();
        let key = fp("metrics");
        fs::write(cache.manifest_path(&key), b"{not json").unwrap();
        assert!(cache.lookup(&key, &interface()).unwrap().is_none());
    }

    #[test]
    fn test_entries_and_clear() {
        let (_dir, cache) = setup();
        cache.store(&fp("a"), "a", "metrics", "1.0", &outputs()).unwrap();
        cache.store(&fp("b"), "b", "metrics", "1.0", &outputs()).unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.outputs.len() == 2));

        assert!(cache.remove(&fp("a")).unwrap());
        assert!(!cache.remove(&fp("a")).unwrap());
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.entries().unwrap().is_empty());
    }
}
