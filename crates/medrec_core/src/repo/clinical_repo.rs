//! Clinical record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist domain objects and their owned children as `records` rows.
//! - Load object graphs back for services and cascade handlers.
//!
//! # Invariants
//! - Saving an object without an id inserts it and assigns the id; saving
//!   one with an id updates it, and a missing row is `NotFound`.
//! - A graph is written inside one transaction, and so is a whole
//!   `save_batch`.
//! - The connection lock is taken per call and never held by callers.

use crate::db::SharedConnection;
use crate::model::capability::{shared, DomainObject, RecordId, Shared};
use crate::model::catalog::{Concept, ConceptName, Location};
use crate::model::clinical::{
    Encounter, Obs, Order, Patient, PatientIdentifier, PersonName, Visit,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefMut;
use std::rc::Rc;
use std::sync::MutexGuard;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    visit_id,
    encounter_id,
    parent_id,
    body
FROM records";

/// Discriminator stored in `records.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Patient,
    PersonName,
    PatientIdentifier,
    Visit,
    Encounter,
    Obs,
    Order,
    Concept,
    ConceptName,
    Location,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::PersonName => "person_name",
            Self::PatientIdentifier => "patient_identifier",
            Self::Visit => "visit",
            Self::Encounter => "encounter",
            Self::Obs => "obs",
            Self::Order => "order",
            Self::Concept => "concept",
            Self::ConceptName => "concept_name",
            Self::Location => "location",
        }
    }
}

/// A graph node queued for a batched write.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Patient(Shared<Patient>),
    Visit(Shared<Visit>),
    Encounter(Shared<Encounter>),
    Order(Shared<Order>),
    Concept(Shared<Concept>),
    Location(Shared<Location>),
}

impl PendingWrite {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Patient(_) => RecordKind::Patient,
            Self::Visit(_) => RecordKind::Visit,
            Self::Encounter(_) => RecordKind::Encounter,
            Self::Order(_) => RecordKind::Order,
            Self::Concept(_) => RecordKind::Concept,
            Self::Location(_) => RecordKind::Location,
        }
    }
}

/// Persistence collaborator for services and cascade handlers.
pub trait ClinicalRepository: Send + Sync {
    /// Saves the patient with its names and identifiers.
    fn save_patient(&self, patient: &mut Patient) -> RepoResult<RecordId>;
    fn get_patient(&self, id: RecordId) -> RepoResult<Option<Patient>>;

    /// Saves the visit row only; its encounters are saved on their own.
    fn save_visit(&self, visit: &mut Visit) -> RepoResult<RecordId>;
    fn get_visit(&self, id: RecordId) -> RepoResult<Option<Visit>>;

    /// Saves the encounter with its observation tree and orders.
    fn save_encounter(&self, encounter: &mut Encounter) -> RepoResult<RecordId>;
    fn get_encounter(&self, id: RecordId) -> RepoResult<Option<Encounter>>;
    fn encounters_for_patient(
        &self,
        patient_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Encounter>>;
    fn encounters_for_visit(
        &self,
        visit_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Encounter>>;

    fn save_order(&self, order: &mut Order) -> RepoResult<RecordId>;
    fn orders_for_patient(
        &self,
        patient_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Order>>;

    /// Saves the concept with its names.
    fn save_concept(&self, concept: &mut Concept) -> RepoResult<RecordId>;
    fn get_concept(&self, id: RecordId) -> RepoResult<Option<Concept>>;
    /// Highest numeric suffix among concept codes starting with `prefix`.
    fn max_concept_code_suffix(&self, prefix: &str) -> RepoResult<Option<i64>>;

    /// Saves the location with its child locations, recursively.
    fn save_location(&self, location: &mut Location) -> RepoResult<RecordId>;
    fn get_location(&self, id: RecordId) -> RepoResult<Option<Location>>;

    /// Writes every node in `writes`, in order, inside one transaction.
    /// Returns the id of each node; on error nothing is written.
    fn save_batch(&self, writes: &[PendingWrite]) -> RepoResult<Vec<RecordId>>;
}

/// SQLite-backed clinical repository over a shared connection.
#[derive(Debug, Clone)]
pub struct SqliteClinicalRepository {
    conn: SharedConnection,
}

impl SqliteClinicalRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::ConnectionPoisoned)
    }
}

impl ClinicalRepository for SqliteClinicalRepository {
    fn save_patient(&self, patient: &mut Patient) -> RepoResult<RecordId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = write_patient(&tx, patient)?;
        tx.commit()?;
        Ok(id)
    }

    fn get_patient(&self, id: RecordId) -> RepoResult<Option<Patient>> {
        let conn = self.lock()?;
        let Some(record) = find_record(&conn, RecordKind::Patient, id)? else {
            return Ok(None);
        };

        let mut patient: Patient = record.decode()?;
        patient.id = Some(record.id);

        let name_records =
            list_records(&conn, RecordKind::PersonName, "patient_id = ?2", params![id])?;
        for name_record in name_records {
            let mut name: PersonName = name_record.decode()?;
            name.id = Some(name_record.id);
            name.person_id = Some(id);
            let preferred = name.preferred;
            let node = shared(name);
            if preferred && patient.preferred_name.is_none() {
                patient.preferred_name = Some(node.clone());
            }
            patient.names.push(node);
        }

        for identifier_record in
            list_records(&conn, RecordKind::PatientIdentifier, "patient_id = ?2", params![id])?
        {
            let mut identifier: PatientIdentifier = identifier_record.decode()?;
            identifier.id = Some(identifier_record.id);
            identifier.patient_id = Some(id);
            patient.identifiers.push(shared(identifier));
        }

        Ok(Some(patient))
    }

    fn save_visit(&self, visit: &mut Visit) -> RepoResult<RecordId> {
        let conn = self.lock()?;
        write_visit(&conn, visit)
    }

    fn get_visit(&self, id: RecordId) -> RepoResult<Option<Visit>> {
        let conn = self.lock()?;
        let Some(record) = find_record(&conn, RecordKind::Visit, id)? else {
            return Ok(None);
        };
        let mut visit: Visit = record.decode()?;
        visit.id = Some(record.id);
        visit.patient_id = record.patient_id;
        Ok(Some(visit))
    }

    fn save_encounter(&self, encounter: &mut Encounter) -> RepoResult<RecordId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = write_encounter(&tx, encounter)?;
        tx.commit()?;
        Ok(id)
    }

    fn get_encounter(&self, id: RecordId) -> RepoResult<Option<Encounter>> {
        let conn = self.lock()?;
        find_record(&conn, RecordKind::Encounter, id)?
            .map(|record| load_encounter(&conn, record))
            .transpose()
    }

    fn encounters_for_patient(
        &self,
        patient_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Encounter>> {
        let conn = self.lock()?;
        list_records(
            &conn,
            RecordKind::Encounter,
            "patient_id = ?2 AND (?3 = 1 OR voided = 0)",
            params![patient_id, bool_to_int(include_voided)],
        )?
        .into_iter()
        .map(|record| load_encounter(&conn, record))
        .collect()
    }

    fn encounters_for_visit(
        &self,
        visit_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Encounter>> {
        let conn = self.lock()?;
        list_records(
            &conn,
            RecordKind::Encounter,
            "visit_id = ?2 AND (?3 = 1 OR voided = 0)",
            params![visit_id, bool_to_int(include_voided)],
        )?
        .into_iter()
        .map(|record| load_encounter(&conn, record))
        .collect()
    }

    fn save_order(&self, order: &mut Order) -> RepoResult<RecordId> {
        let conn = self.lock()?;
        write_order(&conn, order)
    }

    fn orders_for_patient(
        &self,
        patient_id: RecordId,
        include_voided: bool,
    ) -> RepoResult<Vec<Order>> {
        let conn = self.lock()?;
        list_records(
            &conn,
            RecordKind::Order,
            "patient_id = ?2 AND (?3 = 1 OR voided = 0)",
            params![patient_id, bool_to_int(include_voided)],
        )?
        .into_iter()
        .map(decode_order)
        .collect()
    }

    fn save_concept(&self, concept: &mut Concept) -> RepoResult<RecordId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = write_concept(&tx, concept)?;
        tx.commit()?;
        Ok(id)
    }

    fn get_concept(&self, id: RecordId) -> RepoResult<Option<Concept>> {
        let conn = self.lock()?;
        let Some(record) = find_record(&conn, RecordKind::Concept, id)? else {
            return Ok(None);
        };
        let mut concept: Concept = record.decode()?;
        concept.id = Some(record.id);

        let name_records =
            list_records(&conn, RecordKind::ConceptName, "parent_id = ?2", params![id])?;
        for name_record in name_records {
            let mut name: ConceptName = name_record.decode()?;
            name.id = Some(name_record.id);
            name.concept_id = Some(id);
            concept.names.push(shared(name));
        }
        Ok(Some(concept))
    }

    fn max_concept_code_suffix(&self, prefix: &str) -> RepoResult<Option<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT code FROM records
             WHERE kind = ?1
               AND code IS NOT NULL
               AND substr(code, 1, length(?2)) = ?2;",
        )?;
        let codes = stmt
            .query_map(params![RecordKind::Concept.as_str(), prefix], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(codes
            .iter()
            .filter_map(|code| code.strip_prefix(prefix)?.parse::<i64>().ok())
            .max())
    }

    fn save_location(&self, location: &mut Location) -> RepoResult<RecordId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = write_location(&tx, location)?;
        tx.commit()?;
        Ok(id)
    }

    fn get_location(&self, id: RecordId) -> RepoResult<Option<Location>> {
        let conn = self.lock()?;
        find_record(&conn, RecordKind::Location, id)?
            .map(|record| load_location(&conn, record))
            .transpose()
    }

    fn save_batch(&self, writes: &[PendingWrite]) -> RepoResult<Vec<RecordId>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = writes
            .iter()
            .map(|write| write_pending(&tx, write))
            .collect::<RepoResult<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
    }
}

/// Link and index columns written next to a record body.
#[derive(Debug, Clone, Default)]
struct Links {
    patient_id: Option<RecordId>,
    visit_id: Option<RecordId>,
    encounter_id: Option<RecordId>,
    parent_id: Option<RecordId>,
    code: Option<String>,
}

impl Links {
    fn patient(patient_id: RecordId) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    fn parent(parent_id: RecordId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }
}

struct StoredRecord {
    id: RecordId,
    patient_id: Option<RecordId>,
    visit_id: Option<RecordId>,
    encounter_id: Option<RecordId>,
    parent_id: Option<RecordId>,
    body: String,
}

impl StoredRecord {
    fn decode<T: DeserializeOwned>(&self) -> RepoResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn write_record<T: Serialize + DomainObject>(
    conn: &Connection,
    kind: RecordKind,
    object: &T,
    links: &Links,
) -> RepoResult<RecordId> {
    let body = serde_json::to_string(object)?;
    let uuid = object.uuid().map(|uuid| uuid.to_string());
    let voided = object.as_voidable().is_some_and(|v| v.is_voided());
    let retired = object.as_retireable().is_some_and(|r| r.is_retired());

    let Some(id) = object.id() else {
        conn.execute(
            "INSERT INTO records (
                uuid,
                kind,
                patient_id,
                visit_id,
                encounter_id,
                parent_id,
                voided,
                retired,
                code,
                body
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                uuid,
                kind.as_str(),
                links.patient_id,
                links.visit_id,
                links.encounter_id,
                links.parent_id,
                bool_to_int(voided),
                bool_to_int(retired),
                links.code.as_deref(),
                body,
            ],
        )?;
        return Ok(conn.last_insert_rowid());
    };

    let changed = conn.execute(
        "UPDATE records
         SET
            uuid = ?1,
            patient_id = ?2,
            visit_id = ?3,
            encounter_id = ?4,
            parent_id = ?5,
            voided = ?6,
            retired = ?7,
            code = ?8,
            body = ?9,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?10 AND kind = ?11;",
        params![
            uuid,
            links.patient_id,
            links.visit_id,
            links.encounter_id,
            links.parent_id,
            bool_to_int(voided),
            bool_to_int(retired),
            links.code.as_deref(),
            body,
            id,
            kind.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound { kind, id });
    }
    Ok(id)
}

fn find_record(
    conn: &Connection,
    kind: RecordKind,
    id: RecordId,
) -> RepoResult<Option<StoredRecord>> {
    let record = conn
        .query_row(
            &format!("{RECORD_SELECT_SQL} WHERE kind = ?1 AND id = ?2;"),
            params![kind.as_str(), id],
            parse_record_row,
        )
        .optional()?;
    Ok(record)
}

/// Lists records of `kind` matching `condition`, whose placeholders start
/// at `?2` (`?1` is the kind).
fn list_records(
    conn: &Connection,
    kind: RecordKind,
    condition: &str,
    bind: &[&dyn ToSql],
) -> RepoResult<Vec<StoredRecord>> {
    let kind_name = kind.as_str();
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(bind.len() + 1);
    values.push(&kind_name);
    values.extend_from_slice(bind);

    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT_SQL} WHERE kind = ?1 AND {condition} ORDER BY id ASC;"
    ))?;
    let records = stmt
        .query_map(values.as_slice(), parse_record_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn parse_record_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_id: row.get(2)?,
        encounter_id: row.get(3)?,
        parent_id: row.get(4)?,
        body: row.get(5)?,
    })
}

fn node_mut<T>(node: &Shared<T>, kind: RecordKind) -> RepoResult<RefMut<'_, T>> {
    node.try_borrow_mut().map_err(|_| {
        RepoError::InvalidData(format!("{} node is borrowed during save", kind.as_str()))
    })
}

fn write_pending(conn: &Connection, write: &PendingWrite) -> RepoResult<RecordId> {
    let kind = write.kind();
    match write {
        PendingWrite::Patient(node) => write_patient(conn, &mut *node_mut(node, kind)?),
        PendingWrite::Visit(node) => write_visit(conn, &mut *node_mut(node, kind)?),
        PendingWrite::Encounter(node) => write_encounter(conn, &mut *node_mut(node, kind)?),
        PendingWrite::Order(node) => write_order(conn, &mut *node_mut(node, kind)?),
        PendingWrite::Concept(node) => write_concept(conn, &mut *node_mut(node, kind)?),
        PendingWrite::Location(node) => write_location(conn, &mut *node_mut(node, kind)?),
    }
}

fn write_patient(conn: &Connection, patient: &mut Patient) -> RepoResult<RecordId> {
    let id = write_record(conn, RecordKind::Patient, &*patient, &Links::default())?;
    patient.id = Some(id);

    // The preferred name is normally one of `names`; save it separately
    // only when a caller attached a detached node.
    let detached_preferred = patient
        .preferred_name
        .as_ref()
        .filter(|preferred| {
            !patient
                .names
                .iter()
                .any(|name| Rc::ptr_eq(name, *preferred))
        })
        .cloned();
    for node in patient.names.iter().chain(detached_preferred.iter()) {
        let mut name = node_mut(node, RecordKind::PersonName)?;
        name.person_id = Some(id);
        let name_id = write_record(conn, RecordKind::PersonName, &*name, &Links::patient(id))?;
        name.id = Some(name_id);
    }

    for node in &patient.identifiers {
        let mut identifier = node_mut(node, RecordKind::PatientIdentifier)?;
        identifier.patient_id = Some(id);
        let identifier_id = write_record(
            conn,
            RecordKind::PatientIdentifier,
            &*identifier,
            &Links::patient(id),
        )?;
        identifier.id = Some(identifier_id);
    }
    Ok(id)
}

fn write_visit(conn: &Connection, visit: &mut Visit) -> RepoResult<RecordId> {
    let links = Links {
        patient_id: visit.patient_id,
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Visit, &*visit, &links)?;
    visit.id = Some(id);
    Ok(id)
}

fn write_concept(conn: &Connection, concept: &mut Concept) -> RepoResult<RecordId> {
    let links = Links {
        code: concept.code.clone(),
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Concept, &*concept, &links)?;
    concept.id = Some(id);

    for node in &concept.names {
        let mut name = node_mut(node, RecordKind::ConceptName)?;
        name.concept_id = Some(id);
        let name_id = write_record(conn, RecordKind::ConceptName, &*name, &Links::parent(id))?;
        name.id = Some(name_id);
    }
    Ok(id)
}

fn write_encounter(conn: &Connection, encounter: &mut Encounter) -> RepoResult<RecordId> {
    let links = Links {
        patient_id: encounter.patient_id,
        visit_id: encounter.visit_id,
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Encounter, &*encounter, &links)?;
    encounter.id = Some(id);

    for node in &encounter.obs {
        let mut obs = node_mut(node, RecordKind::Obs)?;
        write_obs(conn, &mut obs, Some(id), encounter.patient_id, None)?;
    }
    for node in &encounter.orders {
        let mut order = node_mut(node, RecordKind::Order)?;
        order.encounter_id = Some(id);
        order.patient_id = encounter.patient_id;
        write_order(conn, &mut order)?;
    }
    Ok(id)
}

fn write_obs(
    conn: &Connection,
    obs: &mut Obs,
    encounter_id: Option<RecordId>,
    person_id: Option<RecordId>,
    group_id: Option<RecordId>,
) -> RepoResult<RecordId> {
    obs.encounter_id = encounter_id;
    obs.person_id = person_id;
    obs.obs_group_id = group_id;
    let links = Links {
        patient_id: person_id,
        encounter_id,
        parent_id: group_id,
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Obs, &*obs, &links)?;
    obs.id = Some(id);

    for node in &obs.group_members {
        let mut member = node_mut(node, RecordKind::Obs)?;
        write_obs(conn, &mut member, encounter_id, person_id, Some(id))?;
    }
    Ok(id)
}

fn write_order(conn: &Connection, order: &mut Order) -> RepoResult<RecordId> {
    let links = Links {
        patient_id: order.patient_id,
        encounter_id: order.encounter_id,
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Order, &*order, &links)?;
    order.id = Some(id);
    Ok(id)
}

fn write_location(conn: &Connection, location: &mut Location) -> RepoResult<RecordId> {
    let links = Links {
        parent_id: location.parent_location_id,
        ..Links::default()
    };
    let id = write_record(conn, RecordKind::Location, &*location, &links)?;
    location.id = Some(id);

    for node in &location.child_locations {
        let mut child = node_mut(node, RecordKind::Location)?;
        child.parent_location_id = Some(id);
        write_location(conn, &mut child)?;
    }
    Ok(id)
}

fn load_encounter(conn: &Connection, record: StoredRecord) -> RepoResult<Encounter> {
    let mut encounter: Encounter = record.decode()?;
    encounter.id = Some(record.id);
    encounter.patient_id = record.patient_id;
    encounter.visit_id = record.visit_id;
    encounter.obs = load_obs_level(conn, record.id, None)?;

    let order_records = list_records(
        conn,
        RecordKind::Order,
        "encounter_id = ?2",
        params![record.id],
    )?;
    for order_record in order_records {
        encounter.orders.push(shared(decode_order(order_record)?));
    }
    Ok(encounter)
}

fn load_obs_level(
    conn: &Connection,
    encounter_id: RecordId,
    group_id: Option<RecordId>,
) -> RepoResult<Vec<Shared<Obs>>> {
    list_records(
        conn,
        RecordKind::Obs,
        "encounter_id = ?2 AND parent_id IS ?3",
        params![encounter_id, group_id],
    )?
    .into_iter()
    .map(|record| {
        let mut obs: Obs = record.decode()?;
        obs.id = Some(record.id);
        obs.encounter_id = record.encounter_id;
        obs.person_id = record.patient_id;
        obs.obs_group_id = record.parent_id;
        obs.group_members = load_obs_level(conn, encounter_id, Some(record.id))?;
        Ok(shared(obs))
    })
    .collect()
}

fn decode_order(record: StoredRecord) -> RepoResult<Order> {
    let mut order: Order = record.decode()?;
    order.id = Some(record.id);
    order.patient_id = record.patient_id;
    order.encounter_id = record.encounter_id;
    Ok(order)
}

fn load_location(conn: &Connection, record: StoredRecord) -> RepoResult<Location> {
    let mut location: Location = record.decode()?;
    location.id = Some(record.id);
    location.parent_location_id = record.parent_id;

    let child_records = list_records(
        conn,
        RecordKind::Location,
        "parent_id = ?2",
        params![record.id],
    )?;
    for child_record in child_records {
        location
            .child_locations
            .push(shared(load_location(conn, child_record)?));
    }
    Ok(location)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{ClinicalRepository, PendingWrite, RecordKind, SqliteClinicalRepository};
    use crate::db::open_shared_db_in_memory;
    use crate::model::capability::shared;
    use crate::model::catalog::{Concept, ConceptName, Location};
    use crate::model::clinical::{Encounter, Obs, Order, Patient, PatientIdentifier, PersonName};
    use crate::repo::RepoError;
    use std::rc::Rc;

    fn repo() -> SqliteClinicalRepository {
        SqliteClinicalRepository::new(open_shared_db_in_memory().unwrap())
    }

    fn saved_patient(repo: &SqliteClinicalRepository) -> i64 {
        let mut patient = Patient::new();
        patient.add_name(PersonName::new("Grace", "Hopper"));
        repo.save_patient(&mut patient).unwrap()
    }

    #[test]
    fn patient_round_trip_restores_names_and_preferred_name() {
        let repo = repo();
        let mut patient = Patient::new();
        patient.gender = Some("F".to_string());
        patient.add_name(PersonName::new("Ada", "Lovelace"));
        patient.add_name(PersonName::new("Augusta", "King"));
        patient.add_identifier(PatientIdentifier::new("MRN-1", "Old Identification Number"));

        let id = repo.save_patient(&mut patient).unwrap();
        assert_eq!(patient.names[0].borrow().person_id, Some(id));

        let loaded = repo.get_patient(id).unwrap().expect("patient exists");
        assert_eq!(loaded.gender.as_deref(), Some("F"));
        assert_eq!(loaded.names.len(), 2);
        assert_eq!(loaded.identifiers.len(), 1);
        let preferred = loaded.preferred_name.as_ref().expect("preferred name");
        assert!(Rc::ptr_eq(preferred, &loaded.names[0]));
        assert_eq!(preferred.borrow().given_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn updating_a_missing_row_is_not_found() {
        let repo = repo();
        let mut order = Order::new(5, "twice daily");
        order.id = Some(999);

        let err = repo.save_order(&mut order).unwrap_err();
        assert!(matches!(
            err,
            RepoError::NotFound {
                kind: RecordKind::Order,
                id: 999
            }
        ));
    }

    #[test]
    fn encounter_round_trip_keeps_obs_groups_and_orders() {
        let repo = repo();
        let patient_id = saved_patient(&repo);

        let mut encounter = Encounter::for_patient(patient_id, "ADULTRETURN");
        let group = encounter.add_obs(Obs::text(1, "vitals"));
        group.borrow_mut().add_group_member(Obs::numeric(2, 37.2));
        encounter.add_order(Order::new(3, "paracetamol"));

        let encounter_id = repo.save_encounter(&mut encounter).unwrap();
        let loaded = repo.get_encounter(encounter_id).unwrap().expect("encounter");

        assert_eq!(loaded.patient_id, Some(patient_id));
        assert_eq!(loaded.obs.len(), 1);
        let group = loaded.obs[0].borrow();
        assert_eq!(group.group_members.len(), 1);
        assert_eq!(group.group_members[0].borrow().value_numeric, Some(37.2));
        assert_eq!(group.group_members[0].borrow().person_id, Some(patient_id));
        assert_eq!(loaded.orders.len(), 1);
        assert_eq!(loaded.orders[0].borrow().patient_id, Some(patient_id));
    }

    #[test]
    fn encounter_listing_filters_voided_unless_requested() {
        let repo = repo();
        let patient_id = saved_patient(&repo);

        let mut kept = Encounter::for_patient(patient_id, "ADULTINITIAL");
        repo.save_encounter(&mut kept).unwrap();
        let mut voided = Encounter::for_patient(patient_id, "ADULTRETURN");
        voided.void.voided = true;
        repo.save_encounter(&mut voided).unwrap();

        assert_eq!(repo.encounters_for_patient(patient_id, false).unwrap().len(), 1);
        assert_eq!(repo.encounters_for_patient(patient_id, true).unwrap().len(), 2);
    }

    #[test]
    fn concept_code_suffix_ignores_foreign_prefixes() {
        let repo = repo();
        assert_eq!(repo.max_concept_code_suffix("CPT-").unwrap(), None);

        for code in ["CPT-7", "CPT-12", "LOINC-99", "CPT-x"] {
            let mut concept = Concept::new("Text", "Misc");
            concept.code = Some(code.to_string());
            concept.add_name(ConceptName::new(code, "en"));
            repo.save_concept(&mut concept).unwrap();
        }

        assert_eq!(repo.max_concept_code_suffix("CPT-").unwrap(), Some(12));
    }

    #[test]
    fn location_tree_round_trip() {
        let repo = repo();
        let mut hospital = Location::new("Hospital");
        let ward = hospital.add_child(Location::new("Ward"));
        ward.borrow_mut().add_child(Location::new("Bed 1"));

        let id = repo.save_location(&mut hospital).unwrap();
        let loaded = repo.get_location(id).unwrap().expect("location");
        let ward = loaded.child_locations[0].borrow();
        assert_eq!(ward.parent_location_id, Some(id));
        assert_eq!(ward.child_locations.len(), 1);
    }

    #[test]
    fn batch_writes_in_order_and_returns_each_id() {
        let repo = repo();
        let patient_id = saved_patient(&repo);
        let encounter = shared(Encounter::for_patient(patient_id, "ADULTINITIAL"));
        let mut order = Order::new(4, "ibuprofen");
        order.patient_id = Some(patient_id);
        let order = shared(order);

        let ids = repo
            .save_batch(&[
                PendingWrite::Encounter(encounter.clone()),
                PendingWrite::Order(order.clone()),
            ])
            .unwrap();

        assert_eq!(ids, vec![encounter.borrow().id.unwrap(), order.borrow().id.unwrap()]);
        assert_eq!(repo.encounters_for_patient(patient_id, true).unwrap().len(), 1);
        assert_eq!(repo.orders_for_patient(patient_id, true).unwrap().len(), 1);
    }

    #[test]
    fn failed_batch_rolls_back_earlier_writes() {
        let repo = repo();
        let patient_id = saved_patient(&repo);
        let mut kept = Order::new(4, "ibuprofen");
        kept.patient_id = Some(patient_id);
        let mut missing = Order::new(5, "twice daily");
        missing.patient_id = Some(patient_id);
        missing.id = Some(999);

        let err = repo
            .save_batch(&[PendingWrite::Order(shared(kept)), PendingWrite::Order(shared(missing))])
            .unwrap_err();

        assert!(matches!(err, RepoError::NotFound { id: 999, .. }));
        assert!(repo.orders_for_patient(patient_id, true).unwrap().is_empty());
    }

    #[test]
    fn batch_reports_a_borrowed_node() {
        let repo = repo();
        let patient = shared(Patient::new());
        let _guard = patient.borrow();

        let err = repo.save_batch(&[PendingWrite::Patient(patient.clone())]).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
