//! Error taxonomy for lifecycle advice.
//!
//! # Invariants
//! - A validation failure is always `AdviceError::Rejected` and is never
//!   swallowed by the walker.
//! - Every rejection names the offending object's type.

use crate::handlers::sequence::SequenceError;
use crate::model::capability::DomainObject;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AdviceResult<T> = Result<T, AdviceError>;

/// Why a handler rejected the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A void was requested without a non-blank reason.
    VoidReasonRequired,
    /// Object is saved as voided but carries no void reason.
    VoidedWithoutReason,
    /// Host-specific rule supplied by a custom handler.
    Invalid(String),
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VoidReasonRequired => write!(f, "a void reason is required"),
            Self::VoidedWithoutReason => {
                write!(f, "a voided object must carry a void reason")
            }
            Self::Invalid(message) => write!(f, "{message}"),
        }
    }
}

/// Rejected operation, carrying enough context to build a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub object_type: &'static str,
    pub object_uuid: Option<Uuid>,
    pub reason: RejectReason,
}

impl ValidationFailure {
    pub fn for_object(object: &dyn DomainObject, reason: RejectReason) -> Self {
        Self {
            object_type: object.type_name(),
            object_uuid: object.uuid(),
            reason,
        }
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.object_uuid {
            Some(uuid) => write!(f, "{} {uuid} rejected: {}", self.object_type, self.reason),
            None => write!(f, "{} (unsaved) rejected: {}", self.object_type, self.reason),
        }
    }
}

impl Error for ValidationFailure {}

#[derive(Debug)]
pub enum AdviceError {
    /// A handler rejected the operation; nothing may be persisted.
    Rejected(ValidationFailure),
    /// The ambient session has no authenticated user.
    NoAuthenticatedUser,
    /// A node was already borrowed elsewhere while the walk reached it.
    ObjectBusy { field: &'static str },
    /// Persistence collaborator failed inside a cascade handler.
    Repo(RepoError),
    /// Sequence generator could not produce a value.
    Sequence(SequenceError),
}

impl AdviceError {
    pub fn rejected(object: &dyn DomainObject, reason: RejectReason) -> Self {
        Self::Rejected(ValidationFailure::for_object(object, reason))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Rejected(failure) => Some(failure),
            _ => None,
        }
    }
}

impl Display for AdviceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(failure) => write!(f, "{failure}"),
            Self::NoAuthenticatedUser => write!(f, "no authenticated user in session"),
            Self::ObjectBusy { field } => {
                write!(f, "object reached through `{field}` is already borrowed")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::Sequence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AdviceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(failure) => Some(failure),
            Self::Repo(err) => Some(err),
            Self::Sequence(err) => Some(err),
            Self::NoAuthenticatedUser | Self::ObjectBusy { .. } => None,
        }
    }
}

impl From<ValidationFailure> for AdviceError {
    fn from(value: ValidationFailure) -> Self {
        Self::Rejected(value)
    }
}

impl From<RepoError> for AdviceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SequenceError> for AdviceError {
    fn from(value: SequenceError) -> Self {
        Self::Sequence(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{AdviceError, RejectReason};
    use crate::model::clinical::Patient;

    #[test]
    fn rejection_names_type_of_unsaved_object() {
        let patient = Patient::new();
        let err = AdviceError::rejected(&patient, RejectReason::VoidReasonRequired);

        assert!(err.is_rejection());
        let failure = err.rejection().expect("rejection payload");
        assert_eq!(failure.object_type, "Patient");
        assert_eq!(failure.object_uuid, None);
        assert_eq!(
            err.to_string(),
            "Patient (unsaved) rejected: a void reason is required"
        );
    }

    #[test]
    fn infrastructure_errors_are_not_rejections() {
        assert!(!AdviceError::NoAuthenticatedUser.is_rejection());
        assert!(AdviceError::ObjectBusy { field: "root" }.rejection().is_none());
    }
}
