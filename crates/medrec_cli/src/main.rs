//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire `medrec_core` against an in-memory database and run one
//!   save/void/unvoid round trip.
//! - Keep output deterministic for quick local sanity checks.

use medrec_core::model::clinical::{Encounter, Patient, PersonName};
use medrec_core::{
    core_version, default_log_level, init_logging, open_shared_db_in_memory, shared,
    AdviceConfig, FixedSession, ServiceContext, UserId,
};
use std::process::ExitCode;
use std::sync::Arc;

const DEMO_USER: UserId = UserId(1);
const DEMO_CLOCK_START: i64 = 1_700_000_000_000;

fn main() -> ExitCode {
    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("medrec_cli logging disabled: {err}");
    }
    println!("medrec_core version={}", core_version());

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_demo module=cli status=error error={err}");
            eprintln!("medrec_cli demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_shared_db_in_memory()?;
    let session = Arc::new(FixedSession::new(DEMO_USER, DEMO_CLOCK_START));
    let services = ServiceContext::new(conn, session.clone(), AdviceConfig::default())?;

    let patient = shared(Patient::new());
    patient
        .borrow_mut()
        .add_name(PersonName::new("Ada", "Lovelace"));
    let patient_id = services.patients.save_patient(&patient)?;

    let encounter = shared(Encounter::for_patient(patient_id, "intake"));
    let encounter_id = services.encounters.save_encounter(&encounter)?;
    println!("saved patient_id={patient_id} encounter_id={encounter_id}");

    session.advance(1_000);
    services.patients.void_patient(&patient, "duplicate record")?;
    let active = services.encounters.encounters_for_patient(patient_id, false)?;
    println!(
        "voided patient={} active_encounters={}",
        patient.borrow().void.voided,
        active.len()
    );

    session.advance(1_000);
    services.patients.unvoid_patient(&patient)?;
    let active = services.encounters.encounters_for_patient(patient_id, false)?;
    println!(
        "unvoided patient={} active_encounters={}",
        !patient.borrow().void.voided,
        active.len()
    );
    Ok(())
}
