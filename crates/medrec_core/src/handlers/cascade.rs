//! Business cascades: voiding a patient or a visit reaches persisted
//! records that are not part of the in-memory graph.
//!
//! # Invariants
//! - Cascaded objects share the root's context, so an unvoid later matches
//!   them by the same `date_voided`.
//! - Cascaded objects are only queued on the call; the service writes them
//!   together with the root once the whole walk has succeeded.

use crate::advice::category::LifecycleCategory;
use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::{erase, shared, DomainObject, RecordId};
use crate::model::clinical::Encounter;
use crate::repo::{ClinicalRepository, PendingWrite, RepoResult};
use std::sync::Arc;

/// Which persisted children a cascade reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeScope {
    /// Encounters and standalone orders of a patient.
    Patient,
    /// Encounters of a visit.
    Visit,
}

/// Voids, or unvoids, the encounters and orders of a patient or visit.
pub struct RecordCascadeHandler {
    name: &'static str,
    scope: CascadeScope,
    repository: Arc<dyn ClinicalRepository>,
}

impl RecordCascadeHandler {
    /// Void and unvoid cascade for `Patient` roots.
    pub fn patient(name: &'static str, repository: Arc<dyn ClinicalRepository>) -> Self {
        Self {
            name,
            scope: CascadeScope::Patient,
            repository,
        }
    }

    /// Void and unvoid cascade for `Visit` roots.
    pub fn visit(name: &'static str, repository: Arc<dyn ClinicalRepository>) -> Self {
        Self {
            name,
            scope: CascadeScope::Visit,
            repository,
        }
    }

    fn encounters(&self, owner_id: RecordId, include_voided: bool) -> RepoResult<Vec<Encounter>> {
        match self.scope {
            CascadeScope::Patient => self
                .repository
                .encounters_for_patient(owner_id, include_voided),
            CascadeScope::Visit => self
                .repository
                .encounters_for_visit(owner_id, include_voided),
        }
    }
}

impl LifecycleHandler for RecordCascadeHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        // Unsaved roots have nothing persisted to reach.
        let Some(owner_id) = target.id() else {
            return Ok(());
        };

        // Void reaches the not-yet-voided children; unvoid reaches the voided
        // ones and lets the unvoid handler match them by date.
        let unvoiding = call.category() == LifecycleCategory::Unvoid;

        let mut reached = 0usize;
        for encounter in self.encounters(owner_id, unvoiding)? {
            if unvoiding && !encounter.void.voided {
                continue;
            }
            let node = shared(encounter);
            call.cascade(&erase(&node))?;
            call.defer_write(PendingWrite::Encounter(node));
            reached += 1;
        }

        if self.scope == CascadeScope::Patient {
            for order in self.repository.orders_for_patient(owner_id, unvoiding)? {
                if unvoiding && !order.void.voided {
                    continue;
                }
                let node = shared(order);
                call.cascade(&erase(&node))?;
                call.defer_write(PendingWrite::Order(node));
                reached += 1;
            }
        }

        log::debug!(
            "event=lifecycle_cascade module=handlers status=ok handler={} category={} owner_id={} reached={}",
            self.name,
            call.category(),
            owner_id,
            reached
        );
        Ok(())
    }
}
