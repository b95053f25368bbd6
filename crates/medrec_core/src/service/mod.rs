//! Core use-case services.
//!
//! # Responsibility
//! - Run lifecycle advice explicitly before every lifecycle-bearing write.
//! - Assemble registry, advice, repository and services in one place.
//!
//! # Invariants
//! - A rejected advice call returns before the service writes anything.
//! - The root and every record a cascade reached are written in one
//!   transaction, or not at all.
//! - Services hold no connection lock while the advice walks.

use crate::advice::context::SessionContext;
use crate::advice::error::{AdviceError, ValidationFailure};
use crate::advice::registry::{HandlerRegistry, RegistryError};
use crate::advice::walker::LifecycleAdvice;
use crate::config::{AdviceConfig, ConfigError};
use crate::db::SharedConnection;
use crate::handlers::complex_obs::{ComplexObsRegistry, FileComplexObsStorage};
use crate::handlers::sequence::{ConceptCodeSeed, SequenceGenerator};
use crate::handlers::{register_builtin, BuiltinDeps};
use crate::model::capability::RecordId;
use crate::repo::{ClinicalRepository, PendingWrite, RepoError, SqliteClinicalRepository};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod concept_service;
pub mod encounter_service;
pub mod patient_service;

pub use concept_service::ConceptService;
pub use encounter_service::EncounterService;
pub use patient_service::PatientService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Advice(AdviceError),
    Repo(RepoError),
    Registry(RegistryError),
    Config(ConfigError),
}

impl ServiceError {
    /// Returns whether the call was rejected by a validation handler.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Advice(err) if err.is_rejection())
    }

    pub fn rejection(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Advice(err) => err.rejection(),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advice(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Advice(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<AdviceError> for ServiceError {
    fn from(value: AdviceError) -> Self {
        Self::Advice(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RegistryError> for ServiceError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Writes `root`, then every record the advice queued, in one transaction.
/// Returns the root's id.
pub(crate) fn persist_with(
    repository: &dyn ClinicalRepository,
    root: PendingWrite,
    queued: Vec<PendingWrite>,
) -> ServiceResult<RecordId> {
    let mut writes = Vec::with_capacity(queued.len() + 1);
    writes.push(root);
    writes.extend(queued);
    let ids = repository.save_batch(&writes)?;
    ids.first()
        .copied()
        .ok_or_else(|| RepoError::InvalidData("write batch returned no ids".to_string()).into())
}

/// Fully wired services over one shared connection.
pub struct ServiceContext {
    pub config: AdviceConfig,
    pub repository: Arc<dyn ClinicalRepository>,
    pub advice: LifecycleAdvice,
    pub patients: PatientService,
    pub encounters: EncounterService,
    pub concepts: ConceptService,
}

impl ServiceContext {
    /// Wires services with the built-in handler table only.
    pub fn new(
        conn: SharedConnection,
        session: Arc<dyn SessionContext>,
        config: AdviceConfig,
    ) -> ServiceResult<Self> {
        Self::with_handlers(conn, session, config, |_, _| Ok(()))
    }

    /// Wires services, letting the host register extra handlers after the
    /// built-in table.
    pub fn with_handlers(
        conn: SharedConnection,
        session: Arc<dyn SessionContext>,
        config: AdviceConfig,
        extend: impl FnOnce(&mut HandlerRegistry, &BuiltinDeps) -> Result<(), RegistryError>,
    ) -> ServiceResult<Self> {
        config.validate()?;

        let repository: Arc<dyn ClinicalRepository> =
            Arc::new(SqliteClinicalRepository::new(conn));

        let mut complex_storages = ComplexObsRegistry::new();
        if let Some(dir) = &config.complex_obs_dir {
            complex_storages.register(Arc::new(FileComplexObsStorage::new(dir.clone())));
        }

        let concept_codes = Arc::new(SequenceGenerator::new(Arc::new(ConceptCodeSeed::new(
            repository.clone(),
            config.concept_code_prefix.clone(),
        ))));

        let deps = BuiltinDeps {
            config: config.clone(),
            repository: repository.clone(),
            complex_storages: Arc::new(complex_storages),
            concept_codes,
        };
        let mut registry = HandlerRegistry::new();
        register_builtin(&mut registry, &deps)?;
        extend(&mut registry, &deps)?;

        let advice = LifecycleAdvice::new(Arc::new(registry), session);
        Ok(Self {
            patients: PatientService::new(advice.clone(), repository.clone()),
            encounters: EncounterService::new(advice.clone(), repository.clone()),
            concepts: ConceptService::new(advice.clone(), repository.clone()),
            config,
            repository,
            advice,
        })
    }
}
