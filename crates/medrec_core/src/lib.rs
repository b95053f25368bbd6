//! Core domain logic for medrec.
//! Lifecycle advice (audit, void, retire and their cascades) over clinical
//! and catalog object graphs, with SQLite persistence.

pub mod advice;
pub mod config;
pub mod db;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use advice::{
    AdviceError, AdviceResult, FixedSession, HandlerCall, HandlerRegistry, InvocationContext,
    LifecycleAdvice, LifecycleCategory, LifecycleHandler, RejectReason, SessionContext,
    StaticSession, TypeFilter, ValidationFailure,
};
pub use config::{AdviceConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, open_shared_db, open_shared_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::capability::{erase, shared, DomainObject, EpochMillis, ObjectRef, Shared, UserId};
pub use repo::{
    ClinicalRepository, PendingWrite, RepoError, RepoResult, SqliteClinicalRepository,
};
pub use service::{ServiceContext, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
