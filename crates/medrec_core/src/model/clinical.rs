//! Clinical data types: patients, visits, encounters, observations, orders.
//!
//! # Invariants
//! - Every clinical type is auditable and voidable, never retireable.
//! - `Patient.preferred_name`, when set, is one of `Patient.names`.
//! - `Patient.encounters` and `Visit.encounters` are loaded views; they are
//!   walked for void/unvoid but saved by the encounter service, not by their
//!   owner.

use crate::advice::category::LifecycleCategory;
use crate::model::capability::{
    shared, AuditInfo, ChildField, DomainObject, EpochMillis, FieldPolicy, RecordId, Shared,
    VoidInfo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SAVED_ELSEWHERE: FieldPolicy = FieldPolicy::disabled_for(&[LifecycleCategory::Save]);

/// Patient record. Answers to both `Patient` and `Person` type filters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    pub gender: Option<String>,
    /// ISO-8601 date (`YYYY-MM-DD`).
    pub birthdate: Option<String>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
    #[serde(skip)]
    pub names: Vec<Shared<PersonName>>,
    #[serde(skip)]
    pub preferred_name: Option<Shared<PersonName>>,
    #[serde(skip)]
    pub identifiers: Vec<Shared<PatientIdentifier>>,
    #[serde(skip)]
    pub encounters: Vec<Shared<Encounter>>,
}

impl Patient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name; the first name added becomes the preferred one.
    pub fn add_name(&mut self, mut name: PersonName) -> Shared<PersonName> {
        let node = if self.preferred_name.is_none() {
            name.preferred = true;
            let node = shared(name);
            self.preferred_name = Some(node.clone());
            node
        } else {
            shared(name)
        };
        self.names.push(node.clone());
        node
    }

    pub fn add_identifier(&mut self, identifier: PatientIdentifier) -> Shared<PatientIdentifier> {
        let node = shared(identifier);
        self.identifiers.push(node.clone());
        node
    }

    pub fn add_encounter(&mut self, mut encounter: Encounter) -> Shared<Encounter> {
        encounter.patient_id = self.id;
        let node = shared(encounter);
        self.encounters.push(node.clone());
        node
    }
}

impl_auditable!(Patient);
impl_voidable!(Patient);

impl DomainObject for Patient {
    domain_object_identity!("Patient", ["Patient", "Person"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.gender, &mut self.birthdate]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![
            ChildField::collection("names", FieldPolicy::OWNED, &self.names),
            ChildField::reference(
                "preferred_name",
                FieldPolicy::OWNED,
                self.preferred_name.as_ref(),
            ),
            ChildField::collection("identifiers", FieldPolicy::OWNED, &self.identifiers),
            ChildField::collection("encounters", SAVED_ELSEWHERE, &self.encounters),
        ]
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub person_id: Option<RecordId>,
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred: bool,
    pub audit: AuditInfo,
    pub void: VoidInfo,
}

impl PersonName {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: Some(given_name.into()),
            family_name: Some(family_name.into()),
            ..Self::default()
        }
    }
}

impl_auditable!(PersonName);
impl_voidable!(PersonName);

impl DomainObject for PersonName {
    domain_object_identity!("PersonName", ["PersonName"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![
            &mut self.given_name,
            &mut self.middle_name,
            &mut self.family_name,
        ]
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatientIdentifier {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub patient_id: Option<RecordId>,
    pub identifier: Option<String>,
    pub identifier_type: Option<String>,
    pub preferred: bool,
    pub audit: AuditInfo,
    pub void: VoidInfo,
}

impl PatientIdentifier {
    pub fn new(identifier: impl Into<String>, identifier_type: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            identifier_type: Some(identifier_type.into()),
            ..Self::default()
        }
    }
}

impl_auditable!(PatientIdentifier);
impl_voidable!(PatientIdentifier);

impl DomainObject for PatientIdentifier {
    domain_object_identity!("PatientIdentifier", ["PatientIdentifier"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.identifier, &mut self.identifier_type]
    }
}

/// A period of care grouping several encounters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Visit {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub patient_id: Option<RecordId>,
    pub visit_type: Option<String>,
    pub start_datetime: Option<EpochMillis>,
    pub stop_datetime: Option<EpochMillis>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
    #[serde(skip)]
    pub encounters: Vec<Shared<Encounter>>,
}

impl Visit {
    pub fn new(patient_id: RecordId, visit_type: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id),
            visit_type: Some(visit_type.into()),
            ..Self::default()
        }
    }

    pub fn add_encounter(&mut self, mut encounter: Encounter) -> Shared<Encounter> {
        encounter.visit_id = self.id;
        if encounter.patient_id.is_none() {
            encounter.patient_id = self.patient_id;
        }
        let node = shared(encounter);
        self.encounters.push(node.clone());
        node
    }
}

impl_auditable!(Visit);
impl_voidable!(Visit);

impl DomainObject for Visit {
    domain_object_identity!("Visit", ["Visit"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.visit_type]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![ChildField::collection(
            "encounters",
            SAVED_ELSEWHERE,
            &self.encounters,
        )]
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub patient_id: Option<RecordId>,
    #[serde(skip)]
    pub visit_id: Option<RecordId>,
    pub encounter_type: Option<String>,
    pub encounter_datetime: Option<EpochMillis>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
    #[serde(skip)]
    pub obs: Vec<Shared<Obs>>,
    #[serde(skip)]
    pub orders: Vec<Shared<Order>>,
}

impl Encounter {
    pub fn new(encounter_type: impl Into<String>) -> Self {
        Self {
            encounter_type: Some(encounter_type.into()),
            ..Self::default()
        }
    }

    pub fn for_patient(patient_id: RecordId, encounter_type: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::new(encounter_type)
        }
    }

    pub fn add_obs(&mut self, mut obs: Obs) -> Shared<Obs> {
        obs.encounter_id = self.id;
        obs.person_id = self.patient_id;
        let node = shared(obs);
        self.obs.push(node.clone());
        node
    }

    pub fn add_order(&mut self, mut order: Order) -> Shared<Order> {
        order.encounter_id = self.id;
        order.patient_id = self.patient_id;
        let node = shared(order);
        self.orders.push(node.clone());
        node
    }
}

impl_auditable!(Encounter);
impl_voidable!(Encounter);

impl DomainObject for Encounter {
    domain_object_identity!("Encounter", ["Encounter"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.encounter_type]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![
            ChildField::collection("obs", FieldPolicy::OWNED, &self.obs),
            ChildField::collection("orders", FieldPolicy::OWNED, &self.orders),
        ]
    }
}

/// Payload of a complex observation awaiting format-specific storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexData {
    pub title: String,
    pub data: Vec<u8>,
}

/// Single clinical observation, optionally grouping member observations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Obs {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub person_id: Option<RecordId>,
    #[serde(skip)]
    pub encounter_id: Option<RecordId>,
    #[serde(skip)]
    pub obs_group_id: Option<RecordId>,
    pub concept_id: Option<RecordId>,
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    /// Storage reference written by the complex-observation handler.
    pub value_complex: Option<String>,
    /// Name of the complex storage handler for this observation's concept.
    pub complex_handler: Option<String>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
    #[serde(skip)]
    pub complex_data: Option<ComplexData>,
    /// Last complex storage failure recorded during save.
    #[serde(skip)]
    pub complex_storage_error: Option<String>,
    #[serde(skip)]
    pub group_members: Vec<Shared<Obs>>,
}

impl Obs {
    pub fn text(concept_id: RecordId, value: impl Into<String>) -> Self {
        Self {
            concept_id: Some(concept_id),
            value_text: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn numeric(concept_id: RecordId, value: f64) -> Self {
        Self {
            concept_id: Some(concept_id),
            value_numeric: Some(value),
            ..Self::default()
        }
    }

    pub fn complex(
        concept_id: RecordId,
        handler: impl Into<String>,
        title: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            concept_id: Some(concept_id),
            complex_handler: Some(handler.into()),
            complex_data: Some(ComplexData {
                title: title.into(),
                data,
            }),
            ..Self::default()
        }
    }

    pub fn is_complex(&self) -> bool {
        self.complex_handler.is_some()
    }

    pub fn add_group_member(&mut self, mut member: Obs) -> Shared<Obs> {
        member.obs_group_id = self.id;
        member.encounter_id = self.encounter_id;
        member.person_id = self.person_id;
        let node = shared(member);
        self.group_members.push(node.clone());
        node
    }
}

impl_auditable!(Obs);
impl_voidable!(Obs);

impl DomainObject for Obs {
    domain_object_identity!("Obs", ["Obs"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![
            &mut self.value_text,
            &mut self.value_complex,
            &mut self.complex_handler,
        ]
    }

    fn child_fields(&self) -> Vec<ChildField> {
        vec![ChildField::collection(
            "group_members",
            FieldPolicy::OWNED,
            &self.group_members,
        )]
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub id: Option<RecordId>,
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub patient_id: Option<RecordId>,
    #[serde(skip)]
    pub encounter_id: Option<RecordId>,
    pub concept_id: Option<RecordId>,
    pub order_number: Option<String>,
    pub instructions: Option<String>,
    pub audit: AuditInfo,
    pub void: VoidInfo,
}

impl Order {
    pub fn new(concept_id: RecordId, instructions: impl Into<String>) -> Self {
        Self {
            concept_id: Some(concept_id),
            instructions: Some(instructions.into()),
            ..Self::default()
        }
    }
}

impl_auditable!(Order);
impl_voidable!(Order);

impl DomainObject for Order {
    domain_object_identity!("Order", ["Order"]);
    clinical_capabilities!();

    fn string_fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.order_number, &mut self.instructions]
    }
}
