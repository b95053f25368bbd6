//! Concept and location catalog service.

use crate::advice::walker::LifecycleAdvice;
use crate::model::capability::{erase, shared, RecordId, Shared};
use crate::model::catalog::{Concept, Location};
use crate::repo::{ClinicalRepository, PendingWrite};
use crate::service::{persist_with, ServiceResult};
use std::sync::Arc;

pub struct ConceptService {
    advice: LifecycleAdvice,
    repository: Arc<dyn ClinicalRepository>,
}

impl ConceptService {
    pub fn new(advice: LifecycleAdvice, repository: Arc<dyn ClinicalRepository>) -> Self {
        Self { advice, repository }
    }

    /// Saves the concept with its names; a concept without a code gets the
    /// next generated one.
    pub fn save_concept(&self, concept: &Shared<Concept>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(concept), None)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Concept(concept.clone()),
            queued,
        )
    }

    /// Retires the concept. Its names are voidable, not retireable, and are
    /// left as they are.
    pub fn retire_concept(&self, concept: &Shared<Concept>, reason: &str) -> ServiceResult<()> {
        let queued = self.advice.retire(&erase(concept), reason)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Concept(concept.clone()),
            queued,
        )?;
        Ok(())
    }

    pub fn unretire_concept(&self, concept: &Shared<Concept>) -> ServiceResult<()> {
        let queued = self.advice.unretire(&erase(concept))?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Concept(concept.clone()),
            queued,
        )?;
        Ok(())
    }

    pub fn get_concept(&self, id: RecordId) -> ServiceResult<Option<Shared<Concept>>> {
        Ok(self.repository.get_concept(id)?.map(shared))
    }

    pub fn save_location(&self, location: &Shared<Location>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(location), None)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Location(location.clone()),
            queued,
        )
    }

    /// Retires the location and, with the same timestamp, its child locations.
    pub fn retire_location(&self, location: &Shared<Location>, reason: &str) -> ServiceResult<()> {
        let queued = self.advice.retire(&erase(location), reason)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Location(location.clone()),
            queued,
        )?;
        Ok(())
    }

    pub fn unretire_location(&self, location: &Shared<Location>) -> ServiceResult<()> {
        let queued = self.advice.unretire(&erase(location))?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Location(location.clone()),
            queued,
        )?;
        Ok(())
    }

    pub fn get_location(&self, id: RecordId) -> ServiceResult<Option<Shared<Location>>> {
        Ok(self.repository.get_location(id)?.map(shared))
    }
}
