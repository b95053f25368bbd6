//! Void and unvoid handlers for voidable clinical data.
//!
//! # Invariants
//! - The mandatory-reason checks run before any void field is written
//!   (orders 1 and 10 against the default order).
//! - Unvoid only touches objects whose `date_voided` equals the root's,
//!   i.e. objects voided in the same transition.

use crate::advice::error::{AdviceError, AdviceResult, RejectReason};
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::config::AdviceConfig;
use crate::model::capability::DomainObject;

/// Order of the void-reason check on void.
pub const VOID_REASON_ORDER: i32 = 1;

/// Order of the void-reason check on save.
pub const VOIDED_SAVE_REASON_ORDER: i32 = 10;

/// Rejects a void call without a non-blank reason for the configured types
/// and their subtypes.
#[derive(Debug, Clone)]
pub struct RequireVoidReasonHandler {
    config: AdviceConfig,
}

impl RequireVoidReasonHandler {
    pub fn new(config: AdviceConfig) -> Self {
        Self { config }
    }
}

impl LifecycleHandler for RequireVoidReasonHandler {
    fn name(&self) -> &'static str {
        "require_void_reason"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        if self.config.requires_void_reason(target.type_lineage())
            && call.context().has_blank_reason()
        {
            return Err(AdviceError::rejected(target, RejectReason::VoidReasonRequired));
        }
        Ok(())
    }
}

/// Rejects saving a voided object that carries no void reason, whether or
/// not the void happens in this call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireVoidReasonOnSaveHandler;

impl LifecycleHandler for RequireVoidReasonOnSaveHandler {
    fn name(&self) -> &'static str {
        "require_void_reason_on_save"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        _call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(voidable) = target.as_voidable() else {
            return Ok(());
        };
        let info = voidable.void_info();
        let reason_missing = info
            .void_reason
            .as_deref()
            .map_or(true, |reason| reason.trim().is_empty());
        if info.voided && reason_missing {
            return Err(AdviceError::rejected(target, RejectReason::VoidedWithoutReason));
        }
        Ok(())
    }
}

/// Stamps void fields.
///
/// An object already voided through this handler is left alone; one marked
/// voided directly (no `voided_by`) gets its missing fields filled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseVoidHandler;

impl LifecycleHandler for BaseVoidHandler {
    fn name(&self) -> &'static str {
        "base_void"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(voidable) = target.as_voidable_mut() else {
            return Ok(());
        };
        let info = voidable.void_info_mut();
        if info.voided && info.voided_by.is_some() {
            return Ok(());
        }

        info.voided = true;
        info.void_reason = call.reason().map(str::to_string);
        if info.voided_by.is_none() {
            info.voided_by = Some(call.user());
        }
        if info.date_voided.is_none() {
            info.date_voided = Some(call.timestamp());
        }
        Ok(())
    }
}

/// Clears void fields on objects voided in the same transition as the root.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseUnvoidHandler;

impl LifecycleHandler for BaseUnvoidHandler {
    fn name(&self) -> &'static str {
        "base_unvoid"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(voidable) = target.as_voidable_mut() else {
            return Ok(());
        };
        let info = voidable.void_info_mut();
        if info.voided && info.date_voided == call.origin_date() {
            info.clear();
        }
        Ok(())
    }
}
