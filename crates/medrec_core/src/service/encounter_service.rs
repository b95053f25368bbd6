//! Visit, encounter and order use-case service.
//!
//! # Invariants
//! - Voiding a visit reaches its persisted encounters through the visit
//!   cascade handler, which only queues them; the service writes the visit
//!   row and the queued encounters in one batch.

use crate::advice::walker::LifecycleAdvice;
use crate::model::capability::{erase, shared, RecordId, Shared};
use crate::model::clinical::{Encounter, Order, Visit};
use crate::repo::{ClinicalRepository, PendingWrite};
use crate::service::{persist_with, ServiceResult};
use std::sync::Arc;

pub struct EncounterService {
    advice: LifecycleAdvice,
    repository: Arc<dyn ClinicalRepository>,
}

impl EncounterService {
    pub fn new(advice: LifecycleAdvice, repository: Arc<dyn ClinicalRepository>) -> Self {
        Self { advice, repository }
    }

    pub fn save_visit(&self, visit: &Shared<Visit>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(visit), None)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Visit(visit.clone()),
            queued,
        )
    }

    pub fn void_visit(&self, visit: &Shared<Visit>, reason: &str) -> ServiceResult<()> {
        let queued = self.advice.void(&erase(visit), reason)?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Visit(visit.clone()),
            queued,
        )?;
        log::info!("event=visit_void module=service status=ok visit_id={id}");
        Ok(())
    }

    pub fn unvoid_visit(&self, visit: &Shared<Visit>) -> ServiceResult<()> {
        let queued = self.advice.unvoid(&erase(visit))?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Visit(visit.clone()),
            queued,
        )?;
        log::info!("event=visit_unvoid module=service status=ok visit_id={id}");
        Ok(())
    }

    pub fn get_visit(&self, id: RecordId) -> ServiceResult<Option<Shared<Visit>>> {
        Ok(self.repository.get_visit(id)?.map(shared))
    }

    /// Stamps and saves the encounter with its observations and orders.
    pub fn save_encounter(&self, encounter: &Shared<Encounter>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(encounter), None)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Encounter(encounter.clone()),
            queued,
        )
    }

    pub fn void_encounter(&self, encounter: &Shared<Encounter>, reason: &str) -> ServiceResult<()> {
        let queued = self.advice.void(&erase(encounter), reason)?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Encounter(encounter.clone()),
            queued,
        )?;
        log::info!("event=encounter_void module=service status=ok encounter_id={id}");
        Ok(())
    }

    pub fn unvoid_encounter(&self, encounter: &Shared<Encounter>) -> ServiceResult<()> {
        let queued = self.advice.unvoid(&erase(encounter))?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Encounter(encounter.clone()),
            queued,
        )?;
        log::info!("event=encounter_unvoid module=service status=ok encounter_id={id}");
        Ok(())
    }

    pub fn get_encounter(&self, id: RecordId) -> ServiceResult<Option<Shared<Encounter>>> {
        Ok(self.repository.get_encounter(id)?.map(shared))
    }

    pub fn encounters_for_patient(
        &self,
        patient_id: RecordId,
        include_voided: bool,
    ) -> ServiceResult<Vec<Shared<Encounter>>> {
        Ok(self
            .repository
            .encounters_for_patient(patient_id, include_voided)?
            .into_iter()
            .map(shared)
            .collect())
    }

    pub fn save_order(&self, order: &Shared<Order>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(order), None)?;
        persist_with(
            self.repository.as_ref(),
            PendingWrite::Order(order.clone()),
            queued,
        )
    }
}
