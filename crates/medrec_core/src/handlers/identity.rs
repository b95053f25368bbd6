//! Global identifier assignment and empty-string normalization on save.

use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::DomainObject;
use uuid::Uuid;

/// Assigns a random uuid when none is set, then turns `Some("")` string
/// fields into `None`.
///
/// Voided objects keep their empty strings untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSaveHandler;

impl LifecycleHandler for UuidSaveHandler {
    fn name(&self) -> &'static str {
        "uuid_assigner"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        _call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        if target.uuid().is_none() {
            target.set_uuid(Uuid::new_v4());
        }

        let voided = target.as_voidable().is_some_and(|v| v.is_voided());
        if voided {
            return Ok(());
        }
        for field in target.string_fields_mut() {
            if field.as_deref() == Some("") {
                *field = None;
            }
        }
        Ok(())
    }
}
