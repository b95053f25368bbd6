//! Audit stamping on save.

use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::DomainObject;

/// Sets creator/date_created once, and changed_by/date_changed on every
/// save of an already persisted object.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditSaveHandler;

impl LifecycleHandler for AuditSaveHandler {
    fn name(&self) -> &'static str {
        "audit_stamper"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let is_update = target.id().is_some();
        let Some(auditable) = target.as_auditable_mut() else {
            return Ok(());
        };

        let audit = auditable.audit_mut();
        if audit.creator.is_none() {
            audit.creator = Some(call.user());
        }
        if audit.date_created.is_none() {
            audit.date_created = Some(call.timestamp());
        }
        if is_update {
            audit.changed_by = Some(call.user());
            audit.date_changed = Some(call.timestamp());
        }
        Ok(())
    }
}
