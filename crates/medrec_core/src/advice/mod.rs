//! Lifecycle advice: cross-cutting save/void/retire behaviour applied to
//! whole object graphs.
//!
//! # Responsibility
//! - Classify transitions (`category`).
//! - Hold ordered handlers per category (`registry`).
//! - Walk an object graph applying one shared context (`walker`).
//!
//! # See also
//! - `handlers` for the built-in handler set.

pub mod category;
pub mod context;
pub mod error;
pub mod registry;
pub mod walker;

pub use category::{method_targets, LifecycleCategory};
pub use context::{FixedSession, InvocationContext, SessionContext, StaticSession};
pub use error::{AdviceError, AdviceResult, RejectReason, ValidationFailure};
pub use registry::{
    HandlerEntry, HandlerRegistry, LifecycleHandler, RegistryError, TypeFilter,
    DEFAULT_HANDLER_ORDER,
};
pub use walker::{HandlerCall, LifecycleAdvice, VisitedSet};
