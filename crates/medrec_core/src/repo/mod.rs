//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence collaborator used by services and cascade
//!   handlers.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Repositories never run lifecycle advice; callers do that first.

use crate::db::DbError;
use crate::model::capability::RecordId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod clinical_repo;

pub use clinical_repo::{ClinicalRepository, PendingWrite, RecordKind, SqliteClinicalRepository};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { kind: RecordKind, id: RecordId },
    InvalidData(String),
    Serialization(serde_json::Error),
    /// Another thread panicked while holding the connection lock.
    ConnectionPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Serialization(err) => write!(f, "record body serialization failed: {err}"),
            Self::ConnectionPoisoned => write!(f, "database connection lock is poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) | Self::ConnectionPoisoned => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
