//! File-backed record storage.
//!
//! Layout: `<base>/<yyyy-mm-dd>/<id>.json`, where the date is the UTC day of
//! the record's own timestamp. Bodies are stored as base64 strings.

use super::{QueryCriteria, StorageError, TrafficStorage};
use crate::model::TrafficRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|source| StorageError::Io {
            path: base_path.clone(),
            source,
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, record: &TrafficRecord) -> PathBuf {
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        self.base_path.join(date).join(format!("{}.json", record.id))
    }

    /// All date shard directories, sorted by name.
    fn date_dirs(&self) -> Result<Vec<PathBuf>, StorageError> {
        let entries = fs::read_dir(&self.base_path).map_err(|source| StorageError::Io {
            path: self.base_path.clone(),
            source,
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn read_record(path: &Path) -> Result<TrafficRecord, StorageError> {
        let content = fs::read(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Ids become file names, so they must not escape their shard directory.
fn validate_id(id: &str) -> Result<(), StorageError> {
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

impl TrafficStorage for FileStorage {
    fn save(&self, record: &TrafficRecord) -> Result<(), StorageError> {
        validate_id(&record.id)?;
        let path = self.record_path(record);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_vec_pretty(record).map_err(|source| StorageError::Serialize {
            id: record.id.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Saved record {} to {}", record.id, path.display());
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<TrafficRecord>, StorageError> {
        validate_id(id)?;
        let file_name = format!("{id}.json");
        for dir in self.date_dirs()? {
            let path = dir.join(&file_name);
            if path.is_file() {
                return Self::read_record(&path).map(Some);
            }
        }
        Ok(None)
    }

    fn query(&self, criteria: &QueryCriteria) -> Result<Vec<TrafficRecord>, StorageError> {
        let mut records = Vec::new();

        for dir in self.date_dirs()? {
            let entries = fs::read_dir(&dir).map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;

            for entry in entries.filter_map(|entry| entry.ok()) {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                match Self::read_record(&path) {
                    Ok(record) if criteria.matches(&record) => records.push(record),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable record file: {}", e),
                }
            }
        }

        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        Ok(records
            .into_iter()
            .skip(criteria.offset)
            .take(criteria.limit)
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        validate_id(id)?;
        let file_name = format!("{id}.json");
        let mut deleted = false;

        for dir in self.date_dirs()? {
            let path = dir.join(&file_name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Deleted record {}", id);
                    deleted = true;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(StorageError::Io { path, source }),
            }
        }

        Ok(deleted)
    }
}
