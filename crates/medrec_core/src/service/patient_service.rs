//! Patient use-case service.

use crate::advice::walker::LifecycleAdvice;
use crate::model::capability::{erase, shared, RecordId, Shared};
use crate::model::clinical::Patient;
use crate::repo::{ClinicalRepository, PendingWrite};
use crate::service::{persist_with, ServiceResult};
use std::sync::Arc;

pub struct PatientService {
    advice: LifecycleAdvice,
    repository: Arc<dyn ClinicalRepository>,
}

impl PatientService {
    pub fn new(advice: LifecycleAdvice, repository: Arc<dyn ClinicalRepository>) -> Self {
        Self { advice, repository }
    }

    /// Stamps and saves the patient with its names and identifiers.
    pub fn save_patient(&self, patient: &Shared<Patient>) -> ServiceResult<RecordId> {
        let queued = self.advice.save(&erase(patient), None)?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Patient(patient.clone()),
            queued,
        )?;
        log::info!("event=patient_save module=service status=ok patient_id={id}");
        Ok(id)
    }

    /// Voids the patient, its owned data, and its persisted encounters and
    /// orders, all with one timestamp.
    pub fn void_patient(&self, patient: &Shared<Patient>, reason: &str) -> ServiceResult<()> {
        let queued = self.advice.void(&erase(patient), reason)?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Patient(patient.clone()),
            queued,
        )?;
        log::info!("event=patient_void module=service status=ok patient_id={id}");
        Ok(())
    }

    /// Reverses a void; data voided separately stays voided.
    pub fn unvoid_patient(&self, patient: &Shared<Patient>) -> ServiceResult<()> {
        let queued = self.advice.unvoid(&erase(patient))?;
        let id = persist_with(
            self.repository.as_ref(),
            PendingWrite::Patient(patient.clone()),
            queued,
        )?;
        log::info!("event=patient_unvoid module=service status=ok patient_id={id}");
        Ok(())
    }

    pub fn get_patient(&self, id: RecordId) -> ServiceResult<Option<Shared<Patient>>> {
        Ok(self.repository.get_patient(id)?.map(shared))
    }
}
