//! Handler contracts and the per-category handler registry.
//!
//! # Responsibility
//! - Hold `(category, type filter, order, handler)` registrations.
//! - Resolve, for one object, the ordered handlers that apply to it.
//!
//! # Invariants
//! - Handlers of one category run in ascending `order`; ties keep
//!   registration order.
//! - The registry is populated at startup and shared read-only afterwards
//!   (`Arc<HandlerRegistry>`).
//! - A registration whose filter can never satisfy the category's required
//!   capability is refused.

use crate::advice::category::LifecycleCategory;
use crate::advice::error::AdviceResult;
use crate::advice::walker::HandlerCall;
use crate::model::capability::{Capability, DomainObject};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Order assigned to handlers that do not opt into an explicit one.
pub const DEFAULT_HANDLER_ORDER: i32 = 1000;

/// Unit of lifecycle behaviour applied to one object at a time.
///
/// Handlers are stateless with respect to the walk: everything they know
/// about the transition comes from `call`.
pub trait LifecycleHandler: Send + Sync {
    /// Stable handler name, used in logs and registry diagnostics.
    fn name(&self) -> &'static str;

    fn handle(&self, target: &mut dyn DomainObject, call: &mut HandlerCall<'_>)
        -> AdviceResult<()>;
}

/// Which objects a registration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every object that passes the category's capability gate.
    Any,
    /// Objects of this type or a subtype (by lineage).
    Type(&'static str),
    /// Objects of any of these types.
    Types(&'static [&'static str]),
    /// Objects exposing this capability.
    Capability(Capability),
}

impl TypeFilter {
    pub fn matches(&self, object: &dyn DomainObject) -> bool {
        match self {
            Self::Any => true,
            Self::Type(type_name) => object.is_a(type_name),
            Self::Types(type_names) => type_names.iter().any(|name| object.is_a(name)),
            Self::Capability(capability) => object.supports(*capability),
        }
    }

    /// Void and retire capabilities never co-occur on one type, so a
    /// capability filter naming the other axis can never match.
    fn can_satisfy(&self, required: Option<Capability>) -> bool {
        match (self, required) {
            (Self::Capability(declared), Some(required)) => {
                !matches!(
                    (declared, required),
                    (Capability::Voidable, Capability::Retireable)
                        | (Capability::Retireable, Capability::Voidable)
                )
            }
            _ => true,
        }
    }
}

impl Display for TypeFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Type(type_name) => write!(f, "{type_name}"),
            Self::Types(type_names) => write!(f, "{}", type_names.join("|")),
            Self::Capability(capability) => write!(f, "<{}>", capability.as_str()),
        }
    }
}

/// One registration held by the registry.
#[derive(Clone)]
pub struct HandlerEntry {
    pub category: LifecycleCategory,
    pub filter: TypeFilter,
    pub order: i32,
    pub handler: Arc<dyn LifecycleHandler>,
}

impl Debug for HandlerEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("category", &self.category)
            .field("filter", &self.filter)
            .field("order", &self.order)
            .field("handler", &self.handler.name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Handler name is empty.
    BlankHandlerName,
    /// Same handler name registered twice for one category.
    DuplicateHandler {
        category: LifecycleCategory,
        name: &'static str,
    },
    /// Filter can never match an object the category accepts.
    UnsatisfiableFilter {
        category: LifecycleCategory,
        name: &'static str,
        filter: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankHandlerName => write!(f, "handler name must not be blank"),
            Self::DuplicateHandler { category, name } => {
                write!(f, "handler `{name}` already registered for {category}")
            }
            Self::UnsatisfiableFilter {
                category,
                name,
                filter,
            } => write!(
                f,
                "handler `{name}` filter {filter} can never match a {category} target"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Startup-time table of lifecycle handlers, grouped by category.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: BTreeMap<LifecycleCategory, Vec<HandlerEntry>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` with the default order.
    pub fn register(
        &mut self,
        category: LifecycleCategory,
        filter: TypeFilter,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Result<(), RegistryError> {
        self.register_ordered(category, filter, DEFAULT_HANDLER_ORDER, handler)
    }

    /// Registers `handler` with an explicit order; lower runs first.
    pub fn register_ordered(
        &mut self,
        category: LifecycleCategory,
        filter: TypeFilter,
        order: i32,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Result<(), RegistryError> {
        let name = handler.name();
        if name.trim().is_empty() {
            return Err(RegistryError::BlankHandlerName);
        }
        if !filter.can_satisfy(category.required_capability()) {
            return Err(RegistryError::UnsatisfiableFilter {
                category,
                name,
                filter: filter.to_string(),
            });
        }

        let bucket = self.entries.entry(category).or_default();
        if bucket.iter().any(|entry| entry.handler.name() == name) {
            return Err(RegistryError::DuplicateHandler { category, name });
        }

        // Insert after every entry with order <= `order` to keep ties stable.
        let position = bucket.partition_point(|entry| entry.order <= order);
        bucket.insert(
            position,
            HandlerEntry {
                category,
                filter,
                order,
                handler,
            },
        );
        Ok(())
    }

    /// Returns the handlers that apply to `object` for `category`, in run order.
    ///
    /// Objects lacking the category's capability resolve to nothing.
    pub fn resolve(
        &self,
        category: LifecycleCategory,
        object: &dyn DomainObject,
    ) -> Vec<&HandlerEntry> {
        if !category.accepts(object) {
            return vec![];
        }
        let Some(bucket) = self.entries.get(&category) else {
            return vec![];
        };
        bucket
            .iter()
            .filter(|entry| entry.filter.matches(object))
            .collect()
    }

    pub fn entries(&self, category: LifecycleCategory) -> &[HandlerEntry] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Handler names for `category`, in run order.
    pub fn handler_names(&self, category: LifecycleCategory) -> Vec<&'static str> {
        self.entries(category)
            .iter()
            .map(|entry| entry.handler.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
