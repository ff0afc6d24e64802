//! JSON snapshot of the fact store.
//!
//! The file is an array of `{Address, Arguments: [{Type, Value}]}` objects,
//! one per address. Dumps go to `<path>.tmp` first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PersistenceError;
use crate::message::{Argument, Message};
use crate::store::FactStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoredArgument {
    #[serde(rename = "Type")]
    kind: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoredMessage {
    address: String,
    #[serde(default)]
    arguments: Vec<StoredArgument>,
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            address: message.address.clone(),
            arguments: message
                .arguments
                .iter()
                .map(|arg| StoredArgument {
                    kind: arg.kind.clone(),
                    value: arg.value.clone(),
                })
                .collect(),
        }
    }
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Message::new(
            stored.address,
            stored
                .arguments
                .into_iter()
                .map(|arg| Argument::new(arg.kind, arg.value))
                .collect(),
        )
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write every record of `store` to `path`. Returns the number of records.
///
/// Entries are sorted by address so consecutive dumps of the same state are
/// byte-identical.
pub fn dump(store: &FactStore, path: &Path) -> Result<usize, PersistenceError> {
    let mut entries: Vec<StoredMessage> = store
        .get_all()
        .values()
        .map(|record| StoredMessage::from(record.message()))
        .collect();
    entries.sort_by(|a, b| a.address.cmp(&b.address));

    let json = serde_json::to_string_pretty(&entries).map_err(PersistenceError::Serialize)?;

    let tmp = tmp_path(path);
    fs::write(&tmp, json).map_err(|source| PersistenceError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(entries.len())
}

/// Replay a snapshot at `path` into `store` through [`FactStore::set_record`].
///
/// Returns `Ok(None)` when no snapshot exists yet, otherwise the number of
/// entries read.
pub fn load(store: &FactStore, path: &Path) -> Result<Option<usize>, PersistenceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No store snapshot found, starting empty");
            return Ok(None);
        }
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let entries: Vec<StoredMessage> =
        serde_json::from_str(&raw).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let count = entries.len();
    for entry in entries {
        store.set_record(entry.into());
    }
    Ok(Some(count))
}
