//! Lifecycle categories and service-method name classification.

use crate::model::capability::{Capability, DomainObject};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static LIFECYCLE_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(unretire|unvoid|retire|void|save|create)([A-Z][A-Za-z0-9]*)$")
        .expect("valid lifecycle method regex")
});

/// Kind of transition applied to an object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleCategory {
    Save,
    Void,
    Unvoid,
    Retire,
    Unretire,
}

impl LifecycleCategory {
    pub const ALL: [LifecycleCategory; 5] = [
        Self::Save,
        Self::Void,
        Self::Unvoid,
        Self::Retire,
        Self::Unretire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Void => "void",
            Self::Unvoid => "unvoid",
            Self::Retire => "retire",
            Self::Unretire => "unretire",
        }
    }

    /// Capability an object must expose to take part in this category.
    ///
    /// `None` means every domain object participates.
    pub fn required_capability(self) -> Option<Capability> {
        match self {
            Self::Save => None,
            Self::Void | Self::Unvoid => Some(Capability::Voidable),
            Self::Retire | Self::Unretire => Some(Capability::Retireable),
        }
    }

    /// Returns whether `object` can take part in this category.
    pub fn accepts(self, object: &dyn DomainObject) -> bool {
        self.required_capability()
            .map_or(true, |capability| object.supports(capability))
    }

    /// Classifies a service method by its lifecycle naming convention.
    ///
    /// `saveX`/`createX` map to save; `voidX`, `unvoidX`, `retireX` and
    /// `unretireX` map to their category. Anything else is not
    /// lifecycle-bearing.
    pub fn from_method_name(method_name: &str) -> Option<Self> {
        let captures = LIFECYCLE_METHOD_RE.captures(method_name)?;
        match captures.get(1)?.as_str() {
            "save" | "create" => Some(Self::Save),
            "void" => Some(Self::Void),
            "unvoid" => Some(Self::Unvoid),
            "retire" => Some(Self::Retire),
            "unretire" => Some(Self::Unretire),
            _ => None,
        }
    }
}

impl Display for LifecycleCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns whether `method_name` is a lifecycle method acting on `object`.
///
/// The name must follow the lifecycle convention and end with the object's
/// type name or one of its supertypes (`voidPerson` targets a Patient).
pub fn method_targets(method_name: &str, object: &dyn DomainObject) -> bool {
    let Some(captures) = LIFECYCLE_METHOD_RE.captures(method_name) else {
        return false;
    };
    captures
        .get(2)
        .is_some_and(|subject| object.is_a(subject.as_str()))
}

#[cfg(test)]
mod tests {
    use super::LifecycleCategory;
    use crate::model::capability::Capability;

    #[test]
    fn classifies_lifecycle_method_names() {
        assert_eq!(
            LifecycleCategory::from_method_name("savePatient"),
            Some(LifecycleCategory::Save)
        );
        assert_eq!(
            LifecycleCategory::from_method_name("createEncounter"),
            Some(LifecycleCategory::Save)
        );
        assert_eq!(
            LifecycleCategory::from_method_name("voidObs"),
            Some(LifecycleCategory::Void)
        );
        assert_eq!(
            LifecycleCategory::from_method_name("unvoidPatient"),
            Some(LifecycleCategory::Unvoid)
        );
        assert_eq!(
            LifecycleCategory::from_method_name("retireConcept"),
            Some(LifecycleCategory::Retire)
        );
        assert_eq!(
            LifecycleCategory::from_method_name("unretireLocation"),
            Some(LifecycleCategory::Unretire)
        );
    }

    #[test]
    fn ignores_names_outside_the_convention() {
        assert_eq!(LifecycleCategory::from_method_name("getPatient"), None);
        assert_eq!(LifecycleCategory::from_method_name("save"), None);
        assert_eq!(LifecycleCategory::from_method_name("savepatient"), None);
        assert_eq!(LifecycleCategory::from_method_name("updateConceptWord"), None);
    }

    #[test]
    fn maps_categories_to_required_capabilities() {
        assert_eq!(LifecycleCategory::Save.required_capability(), None);
        assert_eq!(
            LifecycleCategory::Unvoid.required_capability(),
            Some(Capability::Voidable)
        );
        assert_eq!(
            LifecycleCategory::Unretire.required_capability(),
            Some(Capability::Retireable)
        );
    }
}
