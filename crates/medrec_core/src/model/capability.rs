//! Capability markers and the object-safe graph node contract.
//!
//! # Responsibility
//! - Declare the audit, void and retire capabilities as plain traits.
//! - Describe, per type, which fields lead to other graph nodes.
//!
//! # Invariants
//! - `AuditInfo.creator`/`date_created` are written once, at first save.
//! - `VoidInfo.voided_by`/`date_voided` are set iff `voided` is true once a
//!   void has routed through the lifecycle advice.
//! - Field descriptors are declared explicitly by each type; nothing is
//!   discovered at runtime.

use crate::advice::category::LifecycleCategory;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

/// Unix epoch milliseconds.
pub type EpochMillis = i64;

/// Surrogate id assigned by storage. Unset for objects never persisted.
pub type RecordId = i64;

/// Shared, mutable handle to one typed graph node.
pub type Shared<T> = Rc<RefCell<T>>;

/// Type-erased graph node handle used by the walker.
pub type ObjectRef = Rc<RefCell<dyn DomainObject>>;

/// Wraps a value into a fresh graph node.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Stable identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

/// Named capability a domain object may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Auditable,
    Voidable,
    Retireable,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auditable => "auditable",
            Self::Voidable => "voidable",
            Self::Retireable => "retireable",
        }
    }
}

/// Audit trail fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub creator: Option<UserId>,
    pub date_created: Option<EpochMillis>,
    pub changed_by: Option<UserId>,
    pub date_changed: Option<EpochMillis>,
}

/// Void state for clinical data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidInfo {
    pub voided: bool,
    pub voided_by: Option<UserId>,
    pub date_voided: Option<EpochMillis>,
    pub void_reason: Option<String>,
}

impl VoidInfo {
    /// Resets every void field to the unset state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Retire state for catalog metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireInfo {
    pub retired: bool,
    pub retired_by: Option<UserId>,
    pub date_retired: Option<EpochMillis>,
    pub retire_reason: Option<String>,
}

impl RetireInfo {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub trait Auditable {
    fn audit(&self) -> &AuditInfo;
    fn audit_mut(&mut self) -> &mut AuditInfo;
}

pub trait Voidable {
    fn void_info(&self) -> &VoidInfo;
    fn void_info_mut(&mut self) -> &mut VoidInfo;

    fn is_voided(&self) -> bool {
        self.void_info().voided
    }
}

pub trait Retireable {
    fn retire_info(&self) -> &RetireInfo;
    fn retire_info_mut(&mut self) -> &mut RetireInfo;

    fn is_retired(&self) -> bool {
        self.retire_info().retired
    }
}

/// Shape of a field that leads to other graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single optional reference.
    Reference,
    /// Ordered or unordered collection.
    Collection,
}

/// Traversal policy attached to a field descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Never traversed, whatever the category.
    pub independent: bool,
    /// Categories for which this field is skipped.
    pub disabled_for: &'static [LifecycleCategory],
}

impl FieldPolicy {
    pub const OWNED: Self = Self {
        independent: false,
        disabled_for: &[],
    };

    pub const INDEPENDENT: Self = Self {
        independent: true,
        disabled_for: &[],
    };

    pub const fn disabled_for(categories: &'static [LifecycleCategory]) -> Self {
        Self {
            independent: false,
            disabled_for: categories,
        }
    }

    /// Returns whether the walker may descend into this field for `category`.
    pub fn allows(&self, category: LifecycleCategory) -> bool {
        !self.independent && !self.disabled_for.contains(&category)
    }
}

/// One explicitly declared child field and its current members.
pub struct ChildField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub policy: FieldPolicy,
    pub members: Vec<ObjectRef>,
}

impl ChildField {
    pub fn reference<T: DomainObject>(
        name: &'static str,
        policy: FieldPolicy,
        value: Option<&Shared<T>>,
    ) -> Self {
        Self {
            name,
            kind: FieldKind::Reference,
            policy,
            members: value.map(erase).into_iter().collect(),
        }
    }

    pub fn collection<T: DomainObject>(
        name: &'static str,
        policy: FieldPolicy,
        values: &[Shared<T>],
    ) -> Self {
        Self {
            name,
            kind: FieldKind::Collection,
            policy,
            members: values.iter().map(erase).collect(),
        }
    }
}

/// Converts a typed node handle into the walker's erased handle.
pub fn erase<T: DomainObject>(value: &Shared<T>) -> ObjectRef {
    let erased: ObjectRef = value.clone();
    erased
}

/// Object-safe contract every node of a lifecycle graph implements.
///
/// Capability exposure defaults to "not supported"; types opt in by
/// overriding the matching accessor.
pub trait DomainObject: Any + 'static {
    /// Concrete type name, e.g. `Patient`.
    fn type_name(&self) -> &'static str;

    /// Type names this object answers to, most specific first.
    fn type_lineage(&self) -> &'static [&'static str];

    fn id(&self) -> Option<RecordId>;

    fn uuid(&self) -> Option<Uuid>;

    fn set_uuid(&mut self, uuid: Uuid);

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    fn as_voidable(&self) -> Option<&dyn Voidable> {
        None
    }

    fn as_voidable_mut(&mut self) -> Option<&mut dyn Voidable> {
        None
    }

    fn as_retireable(&self) -> Option<&dyn Retireable> {
        None
    }

    fn as_retireable_mut(&mut self) -> Option<&mut dyn Retireable> {
        None
    }

    /// Optional free-text fields subject to empty-string normalization.
    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        Vec::new()
    }

    fn child_fields(&self) -> Vec<ChildField> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns whether this object exposes `capability`.
    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Auditable => self.as_auditable().is_some(),
            Capability::Voidable => self.as_voidable().is_some(),
            Capability::Retireable => self.as_retireable().is_some(),
        }
    }

    /// Returns whether `type_name` is this object's type or one of its supertypes.
    fn is_a(&self, type_name: &str) -> bool {
        self.type_lineage().contains(&type_name)
    }
}

impl dyn DomainObject {
    pub fn downcast_mut<T: DomainObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
