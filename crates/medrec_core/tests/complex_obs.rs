use medrec_core::handlers::complex_obs::FILE_STORAGE_NAME;
use medrec_core::model::clinical::{Encounter, Obs, Patient};
use medrec_core::{
    open_shared_db_in_memory, shared, AdviceConfig, FixedSession, ServiceContext, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

const NURSE: UserId = UserId(5);
const T0: i64 = 1_700_000_000_000;

fn services_with_store(dir: Option<PathBuf>) -> ServiceContext {
    let config = AdviceConfig {
        complex_obs_dir: dir,
        ..AdviceConfig::default()
    };
    ServiceContext::new(
        open_shared_db_in_memory().unwrap(),
        Arc::new(FixedSession::new(NURSE, T0)),
        config,
    )
    .unwrap()
}

fn encounter_for_new_patient(services: &ServiceContext) -> Encounter {
    let patient = shared(Patient::new());
    let patient_id = services.patients.save_patient(&patient).unwrap();
    Encounter::for_patient(patient_id, "radiology")
}

#[test]
fn complex_payload_is_written_to_the_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let services = services_with_store(Some(dir.path().to_path_buf()));
    let mut encounter = encounter_for_new_patient(&services);
    let obs = encounter.add_obs(Obs::complex(
        3,
        FILE_STORAGE_NAME,
        "chest x-ray.png",
        vec![0x89, 0x50, 0x4e, 0x47],
    ));
    let encounter = shared(encounter);

    let encounter_id = services.encounters.save_encounter(&encounter).unwrap();

    let obs = obs.borrow();
    let uuid = obs.uuid.expect("uuid assigned on save");
    let file_name = format!("{uuid}_chest_x-ray.png");
    assert_eq!(
        obs.value_complex.as_deref(),
        Some(format!("chest x-ray.png|{file_name}").as_str())
    );
    assert!(obs.complex_data.is_none());
    assert!(obs.complex_storage_error.is_none());
    assert_eq!(
        std::fs::read(dir.path().join(&file_name)).unwrap(),
        vec![0x89, 0x50, 0x4e, 0x47]
    );

    let stored = services
        .encounters
        .get_encounter(encounter_id)
        .unwrap()
        .unwrap();
    let stored_obs = stored.borrow().obs[0].clone();
    assert_eq!(stored_obs.borrow().value_complex, obs.value_complex);
}

#[test]
fn storage_failure_is_recorded_and_the_save_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"occupied").unwrap();

    let services = services_with_store(Some(blocker));
    let mut encounter = encounter_for_new_patient(&services);
    let obs = encounter.add_obs(Obs::complex(3, FILE_STORAGE_NAME, "scan.pdf", vec![1, 2, 3]));
    let encounter = shared(encounter);

    let encounter_id = services.encounters.save_encounter(&encounter).unwrap();

    let obs = obs.borrow();
    assert!(obs.id.is_some());
    assert!(obs.value_complex.is_none());
    assert!(obs.complex_data.is_some());
    assert!(obs.complex_storage_error.is_some());
    assert!(services
        .encounters
        .get_encounter(encounter_id)
        .unwrap()
        .is_some());
}

#[test]
fn unknown_storage_is_tolerated() {
    let services = services_with_store(None);
    let mut encounter = encounter_for_new_patient(&services);
    let obs = encounter.add_obs(Obs::complex(3, "pacs", "study", vec![9]));
    let encounter = shared(encounter);

    services.encounters.save_encounter(&encounter).unwrap();

    let obs = obs.borrow();
    assert!(obs.id.is_some());
    assert!(obs
        .complex_storage_error
        .as_deref()
        .is_some_and(|message| message.contains("pacs")));
}
