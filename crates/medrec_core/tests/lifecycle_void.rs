use medrec_core::model::clinical::{Encounter, Obs, Order, Patient, PersonName, Visit};
use medrec_core::{
    erase, open_shared_db_in_memory, shared, AdviceConfig, FixedSession, InvocationContext,
    LifecycleCategory, RejectReason, ServiceContext, UserId,
};
use std::sync::Arc;

const CLERK: UserId = UserId(7);
const T0: i64 = 1_700_000_000_000;

fn services_at(now: i64) -> (ServiceContext, Arc<FixedSession>) {
    let session = Arc::new(FixedSession::new(CLERK, now));
    let conn = open_shared_db_in_memory().unwrap();
    let services = ServiceContext::new(conn, session.clone(), AdviceConfig::default()).unwrap();
    (services, session)
}

#[test]
fn voiding_a_patient_voids_its_encounters_and_unvoid_restores_them() {
    let (services, _session) = services_at(T0);
    let patient = shared(Patient::new());
    let first = patient
        .borrow_mut()
        .add_encounter(Encounter::new("intake"));
    let second = patient
        .borrow_mut()
        .add_encounter(Encounter::new("follow-up"));

    services.advice.void(&erase(&patient), "duplicate").unwrap();

    {
        let patient = patient.borrow();
        assert!(patient.void.voided);
        assert_eq!(patient.void.voided_by, Some(CLERK));
        assert_eq!(patient.void.date_voided, Some(T0));
        assert_eq!(patient.void.void_reason.as_deref(), Some("duplicate"));
    }
    for encounter in [&first, &second] {
        let encounter = encounter.borrow();
        assert!(encounter.void.voided);
        assert_eq!(encounter.void.date_voided, Some(T0));
        assert_eq!(encounter.void.void_reason.as_deref(), Some("duplicate"));
    }

    services.advice.unvoid(&erase(&patient)).unwrap();

    assert_eq!(patient.borrow().void, Default::default());
    assert_eq!(first.borrow().void, Default::default());
    assert_eq!(second.borrow().void, Default::default());
}

#[test]
fn unvoid_leaves_children_voided_in_another_transition() {
    let (services, session) = services_at(T0);
    let patient = shared(Patient::new());
    let (first, second, third) = {
        let mut patient = patient.borrow_mut();
        (
            patient.add_name(PersonName::new("Ada", "Lovelace")),
            patient.add_name(PersonName::new("Ada", "Byron")),
            patient.add_name(PersonName::new("Augusta", "King")),
        )
    };

    services.advice.void(&erase(&third), "typo").unwrap();
    let t1 = session.advance(60_000);
    services.advice.void(&erase(&patient), "duplicate").unwrap();

    assert_eq!(first.borrow().void.date_voided, Some(t1));
    assert_eq!(second.borrow().void.date_voided, Some(t1));
    assert_eq!(third.borrow().void.date_voided, Some(T0));
    assert_eq!(third.borrow().void.void_reason.as_deref(), Some("typo"));

    session.advance(60_000);
    services.advice.unvoid(&erase(&patient)).unwrap();

    assert!(!patient.borrow().void.voided);
    assert!(!first.borrow().void.voided);
    assert!(!second.borrow().void.voided);
    assert!(third.borrow().void.voided);
    assert_eq!(third.borrow().void.date_voided, Some(T0));
}

#[test]
fn unvoid_with_a_different_origin_date_is_a_no_op() {
    let (services, _session) = services_at(T0);
    let patient = shared(Patient::new());
    services.advice.void(&erase(&patient), "duplicate").unwrap();

    let context = InvocationContext::new(LifecycleCategory::Unvoid, CLERK, T0 + 1)
        .with_origin_date(Some(T0 + 1));
    services.advice.apply(&erase(&patient), &context).unwrap();

    let patient = patient.borrow();
    assert!(patient.void.voided);
    assert_eq!(patient.void.date_voided, Some(T0));
}

#[test]
fn revoiding_keeps_the_original_void_stamp() {
    let (services, session) = services_at(T0);
    let patient = shared(Patient::new());
    services.advice.void(&erase(&patient), "duplicate").unwrap();

    session.advance(1_000);
    services.advice.void(&erase(&patient), "again").unwrap();

    let patient = patient.borrow();
    assert_eq!(patient.void.date_voided, Some(T0));
    assert_eq!(patient.void.void_reason.as_deref(), Some("duplicate"));
}

#[test]
fn blank_reason_aborts_before_any_field_is_written() {
    let (services, _session) = services_at(T0);
    let patient = shared(Patient::new());
    let name = patient
        .borrow_mut()
        .add_name(PersonName::new("Ada", "Lovelace"));
    services.patients.save_patient(&patient).unwrap();

    for reason in ["", "   "] {
        let err = services.patients.void_patient(&patient, reason).unwrap_err();
        assert!(err.is_rejection());
    }

    assert!(!patient.borrow().void.voided);
    assert_eq!(patient.borrow().void.voided_by, None);
    assert!(!name.borrow().void.voided);
    let id = patient.borrow().id.unwrap();
    let stored = services.patients.get_patient(id).unwrap().unwrap();
    assert!(!stored.borrow().void.voided);
}

#[test]
fn reason_is_only_mandatory_for_configured_types() {
    let (services, _session) = services_at(T0);
    let name = shared(PersonName::new("Ada", "Lovelace"));

    services.advice.void(&erase(&name), "").unwrap();
    assert!(name.borrow().void.voided);

    let encounter = shared(Encounter::new("intake"));
    let err = services.advice.void(&erase(&encounter), "").unwrap_err();
    let failure = err.rejection().expect("validation failure");
    assert_eq!(failure.object_type, "Encounter");
    assert_eq!(failure.reason, RejectReason::VoidReasonRequired);
    assert!(!encounter.borrow().void.voided);
}

#[test]
fn patient_void_reaches_persisted_encounters_and_orders() {
    let (services, session) = services_at(T0);
    let patient = shared(Patient::new());
    let patient_id = services.patients.save_patient(&patient).unwrap();

    let mut encounter_ids = Vec::new();
    for encounter_type in ["intake", "follow-up"] {
        let mut encounter = Encounter::for_patient(patient_id, encounter_type);
        encounter.add_obs(Obs::text(1, "fever"));
        let encounter = shared(encounter);
        encounter_ids.push(services.encounters.save_encounter(&encounter).unwrap());
    }
    let mut order = Order::new(2, "paracetamol 500mg");
    order.patient_id = Some(patient_id);
    let order = shared(order);
    services.encounters.save_order(&order).unwrap();

    let separately_voided = shared(Encounter::for_patient(patient_id, "lab"));
    services
        .encounters
        .save_encounter(&separately_voided)
        .unwrap();
    services
        .encounters
        .void_encounter(&separately_voided, "entered in error")
        .unwrap();

    let voided_at = session.advance(60_000);
    services.patients.void_patient(&patient, "duplicate").unwrap();

    assert!(services
        .encounters
        .encounters_for_patient(patient_id, false)
        .unwrap()
        .is_empty());
    for id in &encounter_ids {
        let encounter = services.encounters.get_encounter(*id).unwrap().unwrap();
        let encounter = encounter.borrow();
        assert_eq!(encounter.void.date_voided, Some(voided_at));
        assert_eq!(encounter.void.void_reason.as_deref(), Some("duplicate"));
        assert!(encounter.obs.iter().all(|obs| obs.borrow().void.voided));
    }
    let orders = services
        .repository
        .orders_for_patient(patient_id, true)
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].void.date_voided, Some(voided_at));

    session.advance(60_000);
    services.patients.unvoid_patient(&patient).unwrap();

    let active = services
        .encounters
        .encounters_for_patient(patient_id, false)
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(active
        .iter()
        .all(|encounter| encounter.borrow().obs.iter().all(|obs| !obs.borrow().void.voided)));
    assert_eq!(
        services
            .repository
            .orders_for_patient(patient_id, false)
            .unwrap()
            .len(),
        1
    );
    let lab_id = separately_voided.borrow().id.unwrap();
    let lab = services.encounters.get_encounter(lab_id).unwrap().unwrap();
    assert!(lab.borrow().void.voided);
    assert_eq!(lab.borrow().void.date_voided, Some(T0));
}

#[test]
fn visit_void_reaches_its_encounters_only() {
    let (services, _session) = services_at(T0);
    let patient = shared(Patient::new());
    let patient_id = services.patients.save_patient(&patient).unwrap();
    let visit = shared(Visit::new(patient_id, "outpatient"));
    let visit_id = services.encounters.save_visit(&visit).unwrap();

    let mut in_visit = Encounter::for_patient(patient_id, "triage");
    in_visit.visit_id = Some(visit_id);
    let in_visit = shared(in_visit);
    services.encounters.save_encounter(&in_visit).unwrap();
    let outside = shared(Encounter::for_patient(patient_id, "phone call"));
    services.encounters.save_encounter(&outside).unwrap();

    services.encounters.void_visit(&visit, "cancelled").unwrap();

    let active = services
        .encounters
        .encounters_for_patient(patient_id, false)
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(
        active[0].borrow().encounter_type.as_deref(),
        Some("phone call")
    );

    services.encounters.unvoid_visit(&visit).unwrap();
    let stored = services.encounters.get_visit(visit_id).unwrap().unwrap();
    assert!(!stored.borrow().void.voided);
    assert_eq!(
        services
            .encounters
            .encounters_for_patient(patient_id, false)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn rejected_cascade_leaves_persisted_children_untouched() {
    let conn = open_shared_db_in_memory().unwrap();
    let config = AdviceConfig {
        void_reason_required_types: vec!["Order".to_string()],
        ..AdviceConfig::default()
    };
    let services =
        ServiceContext::new(conn, Arc::new(FixedSession::new(CLERK, T0)), config).unwrap();

    let patient = shared(Patient::new());
    let patient_id = services.patients.save_patient(&patient).unwrap();
    let encounter = shared(Encounter::for_patient(patient_id, "intake"));
    let encounter_id = services.encounters.save_encounter(&encounter).unwrap();
    let mut order = Order::new(2, "paracetamol 500mg");
    order.patient_id = Some(patient_id);
    services.encounters.save_order(&shared(order)).unwrap();

    let err = services.patients.void_patient(&patient, "").unwrap_err();

    let failure = err.rejection().expect("validation failure");
    assert_eq!(failure.object_type, "Order");
    let stored = services.patients.get_patient(patient_id).unwrap().unwrap();
    assert!(!stored.borrow().void.voided);
    let stored = services
        .encounters
        .get_encounter(encounter_id)
        .unwrap()
        .unwrap();
    assert!(!stored.borrow().void.voided);
    let orders = services
        .repository
        .orders_for_patient(patient_id, true)
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert!(!orders[0].void.voided);
}

#[test]
fn configured_supertype_requires_a_reason_for_subtypes() {
    let conn = open_shared_db_in_memory().unwrap();
    let config = AdviceConfig {
        void_reason_required_types: vec!["Person".to_string()],
        ..AdviceConfig::default()
    };
    let services =
        ServiceContext::new(conn, Arc::new(FixedSession::new(CLERK, T0)), config).unwrap();
    let patient = shared(Patient::new());
    services.patients.save_patient(&patient).unwrap();

    let err = services.patients.void_patient(&patient, " ").unwrap_err();

    assert_eq!(err.rejection().expect("validation failure").object_type, "Patient");
    assert!(!patient.borrow().void.voided);
}
