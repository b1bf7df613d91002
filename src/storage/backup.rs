//! Backup store.
//!
//! A [`Snapshot`] is a full, consistent copy of an [`ArticleStore`](super::ArticleStore):
//! every group with its ordered article ids, every article, and the next id to assign.
//! Snapshots are written as pretty-printed JSON so the file can be inspected and edited by
//! hand.
//!
//! Writes go to a sibling `*.tmp` file which is then renamed over the target; a crash
//! half-way through a save leaves the previous backup intact.
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Article, ArticleId};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed backup '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("backup holds article id {0}, leaving no id to assign next")]
    IdSpaceExhausted(ArticleId),
}

/// One group and its article ids in posting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub articles: Vec<ArticleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Groups in creation order.
    pub groups: Vec<GroupRecord>,
    pub articles: BTreeMap<ArticleId, Article>,
    #[serde(default = "first_id")]
    pub next_id: ArticleId,
}

fn first_id() -> ArticleId {
    1
}

impl Snapshot {
    /// Reads a snapshot from `path`. A missing file is not an error and yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, BackupError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no backup at {}", path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(BackupError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let snapshot: Snapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| BackupError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            "backup loaded from {} ({} groups, {} articles)",
            path.display(),
            snapshot.groups.len(),
            snapshot.articles.len()
        );
        Ok(Some(snapshot))
    }

    /// Atomically replaces the file at `path` with this snapshot.
    pub fn save(&self, path: &Path) -> Result<(), BackupError> {
        let tmp = path.with_extension("tmp");
        let io_err = |source| BackupError::Io {
            path: tmp.clone(),
            source,
        };

        let mut writer = BufWriter::new(File::create(&tmp).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| BackupError::Format {
            path: tmp.clone(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer
            .into_inner()
            .map_err(|e| io_err(e.into_error()))?
            .sync_all()
            .map_err(io_err)?;

        fs::rename(&tmp, path).map_err(|source| BackupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("backup saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use crate::storage::ArticleStore;

    use super::*;

    #[test]
    fn missing_backup_is_none() {
        let temp = TempDir::new("backup").unwrap();
        let loaded = Snapshot::load(&temp.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load() {
        let temp = TempDir::new("backup").unwrap();
        let path = temp.path().join("storage_backup.json");
        let store = ArticleStore::new();
        store.add_group("talk.example");
        store.add_article("comp.example", "Welcome", "admin@example", "line\n.dot");

        store.snapshot().save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap().unwrap();

        assert_eq!(loaded, store.snapshot());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_backup() {
        let temp = TempDir::new("backup").unwrap();
        let path = temp.path().join("storage_backup.json");
        let store = ArticleStore::new();
        store.snapshot().save(&path).unwrap();

        store.add_article("a", "s", "f", "b");
        store.snapshot().save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded.articles.len(), 1);
        assert_eq!(loaded.next_id, 2);
    }

    #[test]
    #[should_panic(expected = "Format")]
    fn malformed_backup_is_an_error() {
        let temp = TempDir::new("backup").unwrap();
        let path = temp.path().join("storage_backup.json");
        fs::write(&path, "{ not json").unwrap();

        Snapshot::load(&path).unwrap();
    }

    #[test]
    fn missing_counter_defaults_to_first_id() {
        let temp = TempDir::new("backup").unwrap();
        let path = temp.path().join("storage_backup.json");
        fs::write(&path, r#"{"groups": [{"name": "g", "articles": []}], "articles": {}}"#)
            .unwrap();

        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded.next_id, 1);
        assert_eq!(loaded.groups[0].name, "g");
    }
}
