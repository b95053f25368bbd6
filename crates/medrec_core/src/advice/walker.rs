//! Recursive lifecycle walk over an object graph.
//!
//! # Responsibility
//! - Build one `InvocationContext` per top-level call from the ambient
//!   session.
//! - Apply resolved handlers to the root, then descend through declared
//!   child fields, applying the same context to every reachable node.
//!
//! # Invariants
//! - Each node is handled at most once per top-level call, keyed by the
//!   node's allocation; shared and cyclic references terminate.
//! - The first handler error aborts the whole walk and is returned as-is.
//! - A node's borrow is released before its children are visited.
//! - Handlers never write to storage. Records they reach are queued as
//!   `PendingWrite`s and returned only when the whole walk succeeds.
//!
//! # See also
//! - `advice::registry` for handler resolution order.

use crate::advice::category::LifecycleCategory;
use crate::advice::context::{InvocationContext, SessionContext};
use crate::advice::error::{AdviceError, AdviceResult};
use crate::advice::registry::HandlerRegistry;
use crate::model::capability::{DomainObject, EpochMillis, ObjectRef, UserId};
use crate::repo::PendingWrite;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

/// Identity set of nodes already handled in one top-level call.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<usize>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `node` visited; returns false if it already was.
    pub fn insert(&mut self, node: &ObjectRef) -> bool {
        self.seen.insert(node_identity(node))
    }

    pub fn contains(&self, node: &ObjectRef) -> bool {
        self.seen.contains(&node_identity(node))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn node_identity(node: &ObjectRef) -> usize {
    Rc::as_ptr(node) as *const () as usize
}

/// Per-call walk state: nodes handled so far and writes queued by handlers.
#[derive(Debug, Default)]
struct WalkState {
    visited: VisitedSet,
    pending: Vec<PendingWrite>,
}

/// What a handler sees of the walk it runs in.
///
/// Exposes the shared context, plus `cascade` and `defer_write` for handlers
/// that must carry the transition to objects they load themselves.
pub struct HandlerCall<'a> {
    advice: &'a LifecycleAdvice,
    context: &'a InvocationContext,
    state: &'a mut WalkState,
}

impl HandlerCall<'_> {
    pub fn context(&self) -> &InvocationContext {
        self.context
    }

    pub fn category(&self) -> LifecycleCategory {
        self.context.category
    }

    pub fn user(&self) -> UserId {
        self.context.user
    }

    pub fn timestamp(&self) -> EpochMillis {
        self.context.timestamp
    }

    pub fn reason(&self) -> Option<&str> {
        self.context.reason()
    }

    pub fn origin_date(&self) -> Option<EpochMillis> {
        self.context.origin_date
    }

    /// Applies the current transition to `node` and its graph, sharing this
    /// call's context and visited set.
    pub fn cascade(&mut self, node: &ObjectRef) -> AdviceResult<()> {
        self.advice.walk_node(node, self.context, self.state, "cascade", true)
    }

    /// Queues `write` for the caller; it is dropped if the walk fails.
    pub fn defer_write(&mut self, write: PendingWrite) {
        self.state.pending.push(write);
    }
}

/// Lifecycle advice engine bound to a handler registry and a session.
#[derive(Clone)]
pub struct LifecycleAdvice {
    registry: Arc<HandlerRegistry>,
    session: Arc<dyn SessionContext>,
}

impl LifecycleAdvice {
    pub fn new(registry: Arc<HandlerRegistry>, session: Arc<dyn SessionContext>) -> Self {
        Self { registry, session }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn session(&self) -> &dyn SessionContext {
        self.session.as_ref()
    }

    /// Authenticated user of the ambient session.
    pub fn current_user(&self) -> AdviceResult<UserId> {
        self.session
            .authenticated_user()
            .ok_or(AdviceError::NoAuthenticatedUser)
    }

    /// Runs save handlers over `root`'s graph.
    ///
    /// `other` is the optional second argument of the save call and is
    /// forwarded as the context reason.
    pub fn save(
        &self,
        root: &ObjectRef,
        other: Option<&str>,
    ) -> AdviceResult<Vec<PendingWrite>> {
        let context = InvocationContext::new(
            LifecycleCategory::Save,
            self.current_user()?,
            self.session.now(),
        )
        .with_reason(other);
        self.apply(root, &context)
    }

    /// Runs save handlers over each element as if `save` were called once
    /// per element: every element gets its own context and timestamp.
    ///
    /// Stops at the first failing element; earlier elements keep their
    /// in-memory changes but their queued writes are dropped.
    pub fn save_all(
        &self,
        roots: &[ObjectRef],
        other: Option<&str>,
    ) -> AdviceResult<Vec<PendingWrite>> {
        let mut pending = Vec::new();
        for root in roots {
            pending.extend(self.save(root, other)?);
        }
        Ok(pending)
    }

    /// Voids `root` and everything it owns with one timestamp and reason.
    ///
    /// An already-set `date_voided` on the root is reused as the timestamp.
    pub fn void(&self, root: &ObjectRef, reason: &str) -> AdviceResult<Vec<PendingWrite>> {
        let existing = read_root(root, |object| {
            object.as_voidable().and_then(|v| v.void_info().date_voided)
        })?;
        let context = InvocationContext::new(
            LifecycleCategory::Void,
            self.current_user()?,
            existing.unwrap_or_else(|| self.session.now()),
        )
        .with_reason(Some(reason));
        self.apply(root, &context)
    }

    /// Unvoids `root` and the children voided in the same transition.
    pub fn unvoid(&self, root: &ObjectRef) -> AdviceResult<Vec<PendingWrite>> {
        let origin = read_root(root, |object| {
            object.as_voidable().and_then(|v| v.void_info().date_voided)
        })?;
        let context = InvocationContext::new(
            LifecycleCategory::Unvoid,
            self.current_user()?,
            self.session.now(),
        )
        .with_origin_date(origin);
        self.apply(root, &context)
    }

    pub fn retire(&self, root: &ObjectRef, reason: &str) -> AdviceResult<Vec<PendingWrite>> {
        let existing = read_root(root, |object| {
            object
                .as_retireable()
                .and_then(|r| r.retire_info().date_retired)
        })?;
        let context = InvocationContext::new(
            LifecycleCategory::Retire,
            self.current_user()?,
            existing.unwrap_or_else(|| self.session.now()),
        )
        .with_reason(Some(reason));
        self.apply(root, &context)
    }

    pub fn unretire(&self, root: &ObjectRef) -> AdviceResult<Vec<PendingWrite>> {
        let origin = read_root(root, |object| {
            object
                .as_retireable()
                .and_then(|r| r.retire_info().date_retired)
        })?;
        let context = InvocationContext::new(
            LifecycleCategory::Unretire,
            self.current_user()?,
            self.session.now(),
        )
        .with_origin_date(origin);
        self.apply(root, &context)
    }

    /// Walks `root` with a caller-built context and a fresh visited set.
    ///
    /// Returns the writes handlers queued during the walk. The caller
    /// persists them after the root; on error they are discarded.
    pub fn apply(
        &self,
        root: &ObjectRef,
        context: &InvocationContext,
    ) -> AdviceResult<Vec<PendingWrite>> {
        let mut state = WalkState::default();
        let result = self.walk_node(root, context, &mut state, "root", true);
        match &result {
            Ok(()) => log::debug!(
                "event=lifecycle_walk module=advice status=ok category={} nodes={} deferred={}",
                context.category,
                state.visited.len(),
                state.pending.len()
            ),
            Err(err) if err.is_rejection() => log::warn!(
                "event=lifecycle_walk module=advice status=rejected category={} error={}",
                context.category,
                err
            ),
            Err(err) => log::error!(
                "event=lifecycle_walk module=advice status=error category={} error={}",
                context.category,
                err
            ),
        }
        result.map(|()| state.pending)
    }

    fn walk_node(
        &self,
        node: &ObjectRef,
        context: &InvocationContext,
        state: &mut WalkState,
        field: &'static str,
        is_root: bool,
    ) -> AdviceResult<()> {
        if state.visited.contains(node) {
            return Ok(());
        }

        let children = {
            let mut target = node
                .try_borrow_mut()
                .map_err(|_| AdviceError::ObjectBusy { field })?;
            if !is_root && !context.category.accepts(&*target) {
                return Ok(());
            }
            state.visited.insert(node);

            let handlers = self.registry.resolve(context.category, &*target);
            log::trace!(
                "event=lifecycle_node module=advice status=start category={} type={} field={} handlers={}",
                context.category,
                target.type_name(),
                field,
                handlers.len()
            );

            let mut call = HandlerCall {
                advice: self,
                context,
                state: &mut *state,
            };
            for entry in handlers {
                entry.handler.handle(&mut *target, &mut call)?;
            }

            collect_children(&*target, context.category)
        };

        for (child_field, child) in children {
            self.walk_node(&child, context, state, child_field, false)?;
        }
        Ok(())
    }
}

fn read_root<T>(
    root: &ObjectRef,
    read: impl FnOnce(&dyn DomainObject) -> Option<T>,
) -> AdviceResult<Option<T>> {
    let object = root
        .try_borrow()
        .map_err(|_| AdviceError::ObjectBusy { field: "root" })?;
    Ok(read(&*object))
}

fn collect_children(
    target: &dyn DomainObject,
    category: LifecycleCategory,
) -> Vec<(&'static str, ObjectRef)> {
    target
        .child_fields()
        .into_iter()
        .filter(|field| field.policy.allows(category))
        .flat_map(|field| {
            let name = field.name;
            field.members.into_iter().map(move |member| (name, member))
        })
        .collect()
}
