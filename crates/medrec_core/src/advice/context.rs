//! Ambient session contract and per-call invocation context.
//!
//! # Invariants
//! - One `InvocationContext` is built per top-level lifecycle call (per
//!   element for `save_all`) and is shared, unchanged, by every node of
//!   that walk.
//! - `timestamp` and `reason` are never regenerated for children.

use crate::advice::category::LifecycleCategory;
use crate::model::capability::{EpochMillis, UserId};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Ambient collaborator supplying the current user and clock.
pub trait SessionContext: Send + Sync {
    fn authenticated_user(&self) -> Option<UserId>;

    fn now(&self) -> EpochMillis;
}

/// Session bound to one user and the system clock.
#[derive(Debug, Clone, Copy)]
pub struct StaticSession {
    user: Option<UserId>,
}

impl StaticSession {
    pub fn new(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    /// Session without an authenticated user (daemon threads, bootstrap).
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl SessionContext for StaticSession {
    fn authenticated_user(&self) -> Option<UserId> {
        self.user
    }

    fn now(&self) -> EpochMillis {
        system_now_millis()
    }
}

/// Session with a caller-controlled clock.
#[derive(Debug)]
pub struct FixedSession {
    user: Option<UserId>,
    now: AtomicI64,
}

impl FixedSession {
    pub fn new(user: UserId, now: EpochMillis) -> Self {
        Self {
            user: Some(user),
            now: AtomicI64::new(now),
        }
    }

    pub fn set_now(&self, now: EpochMillis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) -> EpochMillis {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl SessionContext for FixedSession {
    fn authenticated_user(&self) -> Option<UserId> {
        self.user
    }

    fn now(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Immutable transition metadata shared by one top-level lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub category: LifecycleCategory,
    pub user: UserId,
    /// Stamp applied to every node: now for save, the root's void/retire
    /// date (or now) for void/retire.
    pub timestamp: EpochMillis,
    /// Void/retire reason, or the optional second argument of a save call.
    pub reason: Option<String>,
    /// Root's void/retire date when the call started. Only unvoid/unretire
    /// use it to match children voided in the same transition.
    pub origin_date: Option<EpochMillis>,
}

impl InvocationContext {
    pub fn new(category: LifecycleCategory, user: UserId, timestamp: EpochMillis) -> Self {
        Self {
            category,
            user,
            timestamp,
            reason: None,
            origin_date: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_string);
        self
    }

    pub fn with_origin_date(mut self, origin_date: Option<EpochMillis>) -> Self {
        self.origin_date = origin_date;
        self
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns whether the reason is absent or whitespace only.
    pub fn has_blank_reason(&self) -> bool {
        self.reason().map_or(true, |reason| reason.trim().is_empty())
    }
}

fn system_now_millis() -> EpochMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
