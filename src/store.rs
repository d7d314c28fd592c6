use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

/// Records addressable by an opaque string id.
pub trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug)]
pub enum StoreError {
    Io { collection: String, source: io::Error },
    Corrupt { collection: String, detail: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { collection, source } => {
                write!(f, "collection {collection} unavailable: {source}")
            }
            StoreError::Corrupt { collection, detail } => {
                write!(f, "collection {collection} is corrupt: {detail}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Corrupt { .. } => None,
        }
    }
}

fn io_err(collection: &str, source: io::Error) -> StoreError {
    StoreError::Io { collection: collection.to_string(), source }
}

/// Write `lines`-style content to `path` atomically: serialize into a temp
/// file, flush + fsync, then rename over the destination. A crash mid-write
/// leaves the previous snapshot intact.
fn atomic_write(collection: &str, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let start = std::time::Instant::now();
    let tmp_path = path.with_extension("tmp");
    let file = File::create(&tmp_path).map_err(|e| io_err(collection, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(|e| io_err(collection, e))?;
    writer.flush().map_err(|e| io_err(collection, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| io_err(collection, e))?;
    fs::rename(&tmp_path, path).map_err(|e| io_err(collection, e))?;
    metrics::histogram!(crate::observability::STORE_FLUSH_DURATION_SECONDS)
        .record(start.elapsed().as_secs_f64());
    Ok(())
}

/// A named collection persisted as line-delimited JSON, one record per line.
///
/// The whole collection is loaded at startup and rewritten on every mutation
/// (read-modify-write over the full record set). The `RwLock` is the
/// per-collection writer lock: mutations hold it across the in-memory change
/// and the flush, so two concurrent writers cannot lose each other's update.
pub struct Collection<T> {
    name: String,
    path: PathBuf,
    records: RwLock<Vec<T>>,
}

impl<T> Collection<T>
where
    T: Clone + Serialize + DeserializeOwned + HasId,
{
    /// Open (or create) `<dir>/<name>.jsonl` and load every record.
    ///
    /// JSON `null` lines are skipped defensively; any other unparsable line
    /// fails the open, surfacing the collection as unavailable rather than
    /// silently dropping data.
    pub fn open(dir: &Path, name: &str) -> Result<Self, StoreError> {
        let path = dir.join(format!("{name}.jsonl"));
        let mut records = Vec::new();

        match File::open(&path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                for (idx, line) in reader.lines().enumerate() {
                    let line = line.map_err(|e| io_err(name, e))?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Option<T>>(trimmed) {
                        Ok(Some(record)) => records.push(record),
                        Ok(None) => {
                            tracing::warn!(collection = name, line = idx + 1, "skipping null record");
                        }
                        Err(e) => {
                            return Err(StoreError::Corrupt {
                                collection: name.to_string(),
                                detail: format!("line {}: {e}", idx + 1),
                            });
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(name, e)),
        }

        Ok(Self {
            name: name.to_string(),
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Every record, in insertion order.
    pub async fn list_all(&self) -> Vec<T> {
        self.records.read().await.clone()
    }

    pub async fn find_by_id(&self, id: &str) -> Option<T> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Persist `record` at the end of the collection.
    pub async fn append(&self, record: T) -> Result<T, StoreError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        self.flush(&records)?;
        Ok(record)
    }

    /// Apply `patch` to the record with `id` and rewrite the collection.
    /// Returns `None` when the id is unknown; fields the patch leaves alone
    /// stay untouched.
    pub async fn update_by_id<F>(&self, id: &str, patch: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let mut records = self.records.write().await;
        let Some(pos) = records.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        patch(&mut records[pos]);
        let updated = records[pos].clone();
        self.flush(&records)?;
        Ok(Some(updated))
    }

    /// Exclusive read-modify-write over the whole collection. `op` sees the
    /// current records and may change them; the collection is flushed only
    /// when it returns `Ok`, so a rejected operation leaves no trace. This is
    /// the path for mutations whose validation must be atomic with the write
    /// (e.g. conflict checks).
    pub async fn mutate<R, E, F>(&self, op: F) -> Result<Result<R, E>, StoreError>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let mut records = self.records.write().await;
        match op(&mut records) {
            Ok(value) => {
                self.flush(&records)?;
                Ok(Ok(value))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    pub async fn remove_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let Some(pos) = records.iter().position(|r| r.id() == id) else {
            return Ok(false);
        };
        records.remove(pos);
        self.flush(&records)?;
        Ok(true)
    }

    fn flush(&self, records: &[T]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(|e| StoreError::Corrupt {
                collection: self.name.clone(),
                detail: e.to_string(),
            })?;
            buf.push(b'\n');
        }
        atomic_write(&self.name, &self.path, &buf)
    }
}

/// A single JSON document with the same load-at-startup / flush-on-write
/// lifecycle as [`Collection`]. Used for the override lists and the
/// verification-code map.
pub struct Document<T> {
    name: String,
    path: PathBuf,
    value: RwLock<T>,
}

impl<T> Document<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    pub fn open(dir: &Path, name: &str) -> Result<Self, StoreError> {
        let path = dir.join(format!("{name}.json"));
        let value = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                collection: name.to_string(),
                detail: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => T::default(),
            Err(e) => return Err(io_err(name, e)),
        };
        Ok(Self {
            name: name.to_string(),
            path,
            value: RwLock::new(value),
        })
    }

    pub async fn read(&self) -> T {
        self.value.read().await.clone()
    }

    pub async fn update<F>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let mut value = self.value.write().await;
        mutate(&mut value);
        let bytes = serde_json::to_vec_pretty(&*value).map_err(|e| StoreError::Corrupt {
            collection: self.name.clone(),
            detail: e.to_string(),
        })?;
        atomic_write(&self.name, &self.path, &bytes)?;
        Ok(value.clone())
    }
}
