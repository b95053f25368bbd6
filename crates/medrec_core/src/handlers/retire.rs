//! Retire and unretire handlers for catalog metadata.

use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::DomainObject;

/// Stamps retire fields; mirrors `BaseVoidHandler` on the retire axis.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseRetireHandler;

impl LifecycleHandler for BaseRetireHandler {
    fn name(&self) -> &'static str {
        "base_retire"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(retireable) = target.as_retireable_mut() else {
            return Ok(());
        };
        let info = retireable.retire_info_mut();
        if info.retired && info.retired_by.is_some() {
            return Ok(());
        }

        info.retired = true;
        info.retire_reason = call.reason().map(str::to_string);
        if info.retired_by.is_none() {
            info.retired_by = Some(call.user());
        }
        if info.date_retired.is_none() {
            info.date_retired = Some(call.timestamp());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BaseUnretireHandler;

impl LifecycleHandler for BaseUnretireHandler {
    fn name(&self) -> &'static str {
        "base_unretire"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(retireable) = target.as_retireable_mut() else {
            return Ok(());
        };
        let info = retireable.retire_info_mut();
        if info.retired && info.date_retired == call.origin_date() {
            info.clear();
        }
        Ok(())
    }
}
