//! Domain model for clinical data and catalog metadata.
//!
//! # Responsibility
//! - Define the capability markers objects may expose.
//! - Define the clinical (voidable) and catalog (retireable) types that the
//!   lifecycle advice walks.
//!
//! # Invariants
//! - Owned children are graph nodes (`Shared<T>`); links to owners are plain
//!   record ids, never object references.
//! - Retirement applies to catalog types only, voiding to clinical types only.

/// Implements `Auditable` over a struct's `audit` field.
macro_rules! impl_auditable {
    ($ty:ty) => {
        impl $crate::model::capability::Auditable for $ty {
            fn audit(&self) -> &$crate::model::capability::AuditInfo {
                &self.audit
            }

            fn audit_mut(&mut self) -> &mut $crate::model::capability::AuditInfo {
                &mut self.audit
            }
        }
    };
}

/// Implements `Voidable` over a struct's `void` field.
macro_rules! impl_voidable {
    ($ty:ty) => {
        impl $crate::model::capability::Voidable for $ty {
            fn void_info(&self) -> &$crate::model::capability::VoidInfo {
                &self.void
            }

            fn void_info_mut(&mut self) -> &mut $crate::model::capability::VoidInfo {
                &mut self.void
            }
        }
    };
}

/// Implements `Retireable` over a struct's `retire` field.
macro_rules! impl_retireable {
    ($ty:ty) => {
        impl $crate::model::capability::Retireable for $ty {
            fn retire_info(&self) -> &$crate::model::capability::RetireInfo {
                &self.retire
            }

            fn retire_info_mut(&mut self) -> &mut $crate::model::capability::RetireInfo {
                &mut self.retire
            }
        }
    };
}

/// Expands the identity and downcast members shared by every domain type.
///
/// Expects `id: Option<RecordId>` and `uuid: Option<Uuid>` fields.
macro_rules! domain_object_identity {
    ($name:literal, [$($lineage:literal),+]) => {
        fn type_name(&self) -> &'static str {
            $name
        }

        fn type_lineage(&self) -> &'static [&'static str] {
            &[$($lineage),+]
        }

        fn id(&self) -> Option<$crate::model::capability::RecordId> {
            self.id
        }

        fn uuid(&self) -> Option<::uuid::Uuid> {
            self.uuid
        }

        fn set_uuid(&mut self, uuid: ::uuid::Uuid) {
            self.uuid = Some(uuid);
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Expands capability accessors for an auditable + voidable type.
macro_rules! clinical_capabilities {
    () => {
        fn as_auditable(&self) -> Option<&dyn $crate::model::capability::Auditable> {
            Some(self)
        }

        fn as_auditable_mut(&mut self) -> Option<&mut dyn $crate::model::capability::Auditable> {
            Some(self)
        }

        fn as_voidable(&self) -> Option<&dyn $crate::model::capability::Voidable> {
            Some(self)
        }

        fn as_voidable_mut(&mut self) -> Option<&mut dyn $crate::model::capability::Voidable> {
            Some(self)
        }
    };
}

/// Expands capability accessors for an auditable + retireable type.
macro_rules! catalog_capabilities {
    () => {
        fn as_auditable(&self) -> Option<&dyn $crate::model::capability::Auditable> {
            Some(self)
        }

        fn as_auditable_mut(&mut self) -> Option<&mut dyn $crate::model::capability::Auditable> {
            Some(self)
        }

        fn as_retireable(&self) -> Option<&dyn $crate::model::capability::Retireable> {
            Some(self)
        }

        fn as_retireable_mut(
            &mut self,
        ) -> Option<&mut dyn $crate::model::capability::Retireable> {
            Some(self)
        }
    };
}

pub mod capability;
pub mod catalog;
pub mod clinical;
