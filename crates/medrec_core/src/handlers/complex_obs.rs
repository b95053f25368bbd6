//! Complex observation storage on save.
//!
//! # Responsibility
//! - Route a complex observation's payload to the storage named by its
//!   `complex_handler`.
//! - Record the storage reference in `value_complex`.
//!
//! # Invariants
//! - Storage failures never fail the save. They are logged and recorded in
//!   `Obs.complex_storage_error`.
//! - Stored file names never contain path separators.

use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::DomainObject;
use crate::model::clinical::{ComplexData, Obs};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Name of the built-in file storage.
pub const FILE_STORAGE_NAME: &str = "file";

#[derive(Debug)]
pub enum ComplexStorageError {
    UnknownStorage(String),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for ComplexStorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStorage(name) => {
                write!(f, "no complex obs storage registered as `{name}`")
            }
            Self::Io { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ComplexStorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownStorage(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Format-specific storage for complex observation payloads.
pub trait ComplexObsStorage: Send + Sync {
    fn name(&self) -> &str;

    /// Stores `data` and returns the value to keep in `value_complex`.
    fn store(&self, obs_uuid: Option<Uuid>, data: &ComplexData)
        -> Result<String, ComplexStorageError>;
}

/// Storages keyed by handler name.
#[derive(Default)]
pub struct ComplexObsRegistry {
    storages: BTreeMap<String, Arc<dyn ComplexObsStorage>>,
}

impl ComplexObsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `storage`, replacing any storage with the same name.
    pub fn register(&mut self, storage: Arc<dyn ComplexObsStorage>) {
        self.storages.insert(storage.name().to_string(), storage);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ComplexObsStorage>> {
        self.storages.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.storages.keys().map(String::as_str).collect()
    }
}

/// Writes payloads as files under one directory.
#[derive(Debug, Clone)]
pub struct FileComplexObsStorage {
    dir: PathBuf,
}

impl FileComplexObsStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ComplexObsStorage for FileComplexObsStorage {
    fn name(&self) -> &str {
        FILE_STORAGE_NAME
    }

    fn store(
        &self,
        obs_uuid: Option<Uuid>,
        data: &ComplexData,
    ) -> Result<String, ComplexStorageError> {
        let prefix = obs_uuid.unwrap_or_else(Uuid::new_v4);
        let file_name = format!("{prefix}_{}", sanitize_file_name(&data.title));
        let path = self.dir.join(&file_name);

        std::fs::create_dir_all(&self.dir)
            .and_then(|()| std::fs::write(&path, &data.data))
            .map_err(|source| ComplexStorageError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(format!("{}|{file_name}", data.title))
    }
}

fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "payload".to_string()
    } else {
        cleaned
    }
}

/// Save handler delegating complex payloads to their storage.
pub struct ComplexObsSaveHandler {
    storages: Arc<ComplexObsRegistry>,
}

impl ComplexObsSaveHandler {
    pub fn new(storages: Arc<ComplexObsRegistry>) -> Self {
        Self { storages }
    }
}

impl LifecycleHandler for ComplexObsSaveHandler {
    fn name(&self) -> &'static str {
        "complex_obs_storage"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        _call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(obs) = target.downcast_mut::<Obs>() else {
            return Ok(());
        };
        let (Some(storage_name), Some(data)) =
            (obs.complex_handler.clone(), obs.complex_data.as_ref())
        else {
            return Ok(());
        };

        let stored = match self.storages.get(&storage_name) {
            Some(storage) => storage.store(obs.uuid, data),
            None => Err(ComplexStorageError::UnknownStorage(storage_name.clone())),
        };

        match stored {
            Ok(value) => {
                obs.value_complex = Some(value);
                obs.complex_data = None;
                obs.complex_storage_error = None;
            }
            Err(err) => {
                log::warn!(
                    "event=complex_obs_store module=handlers status=error storage={} error={}",
                    storage_name,
                    err
                );
                obs.complex_storage_error = Some(err.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{sanitize_file_name, ComplexObsStorage, FileComplexObsStorage};
    use crate::model::clinical::ComplexData;
    use uuid::Uuid;

    #[test]
    fn sanitizes_separators_out_of_titles() {
        assert_eq!(sanitize_file_name("../x-ray 1.png"), ".._x-ray_1.png");
        assert_eq!(sanitize_file_name(""), "payload");
    }

    #[test]
    fn file_storage_writes_payload_and_returns_reference() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileComplexObsStorage::new(dir.path().join("complex"));
        let uuid = Uuid::new_v4();

        let value = storage
            .store(
                Some(uuid),
                &ComplexData {
                    title: "chest.png".to_string(),
                    data: vec![1, 2, 3],
                },
            )
            .unwrap();

        let file_name = format!("{uuid}_chest.png");
        assert_eq!(value, format!("chest.png|{file_name}"));
        let written = std::fs::read(dir.path().join("complex").join(file_name)).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }
}
