//! Catalog metadata: concepts, concept names, locations.
//!
//! Catalog entries are retired, never voided. Concept names are the one
//! voidable exception, so retiring a concept leaves its names untouched.

use crate::model::capability::{
    shared, AuditInfo, ChildField, DomainObject, FieldPolicy, RecordId, RetireInfo, Shared,
    VoidInfo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dictionary concept. `code` is assigned from the concept code sequence on
/// first save when unset.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Concept {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    pub code: Option<String>,
    pub datatype: Option<String>,
    pub concept_class: Option<String>,
    pub audit: AuditInfo,
    pub retire: RetireInfo,
    #[serde(skip)]
    pub names: Vec<Shared<ConceptName>>,
}

impl Concept {
    pub fn new(datatype: impl Into<String>, concept_class: impl Into<String>) -> Self {
        Self {
            datatype: Some(datatype.into()),
            concept_class: Some(concept_class.into()),
            ..Self::default()
        }
    }

    pub fn add_name(&mut self, mut name: ConceptName) -> Shared<ConceptName> {
        name.concept_id = self.id;
        let node = shared(name);
        self.names.push(node.clone());
        node
    }
}

impl_auditable!(Concept);
impl_retireable!(Concept);

impl DomainObject for Concept {
    domain_object_identity!("Concept", ["Concept"]);
    catalog_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.code, &mut self.datatype, &mut self.concept_class]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![ChildField::collection(
            "names",
            FieldPolicy::OWNED,
            &self.names,
        )]
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConceptName {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub concept_id: Option<RecordId>,
    pub name: Option<String>,
    pub locale: Option<String>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
}

impl ConceptName {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            locale: Some(locale.into()),
            ..Self::default()
        }
    }
}

impl_auditable!(ConceptName);
impl_voidable!(ConceptName);

impl DomainObject for ConceptName {
    domain_object_identity!("ConceptName", ["ConceptName"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.name, &mut self.locale]
    }
}

/// Care location; retiring a location cascades to its child locations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub parent_location_id: Option<RecordId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub audit: AuditInfo,
    pub retire: RetireInfo,
    #[serde(skip)]
    pub child_locations: Vec<Shared<Location>>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn add_child(&mut self, mut child: Location) -> Shared<Location> {
        child.parent_location_id = self.id;
        let node = shared(child);
        self.child_locations.push(node.clone());
        node
    }
}

impl_auditable!(Location);
impl_retireable!(Location);

impl DomainObject for Location {
    domain_object_identity!("Location", ["Location"]);
    catalog_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.name, &mut self.description]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![ChildField::collection(
            "child_locations",
            FieldPolicy::OWNED,
            &self.child_locations,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::{Concept, ConceptName, Location};
    use crate::model::capability::{Capability, DomainObject};

    #[test]
    fn concept_is_retireable_but_its_names_are_voidable() {
        let mut concept = Concept::new("Numeric", "Test");
        let name = concept.add_name(ConceptName::new("WEIGHT (KG)", "en"));

        let object: &dyn DomainObject = &concept;
        assert!(object.supports(Capability::Retireable));
        assert!(!object.supports(Capability::Voidable));

        let name_ref = name.borrow();
        let name_object: &dyn DomainObject = &*name_ref;
        assert!(name_object.supports(Capability::Voidable));
        assert!(!name_object.supports(Capability::Retireable));
    }

    #[test]
    fn child_locations_inherit_parent_link() {
        let mut ward = Location::new("Inpatient Ward");
        ward.id = Some(3);
        let bed = ward.add_child(Location::new("Bed 12"));

        assert_eq!(bed.borrow().parent_location_id, Some(3));
        assert_eq!(ward.child_fields()[0].members.len(), 1);
    }
}
