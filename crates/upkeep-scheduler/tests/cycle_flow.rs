//! End-to-end scheduler behaviour against a real SQLite store.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};

use chrono::{DateTime, TimeZone, Utc};
use upkeep_scheduler::{ensure_cycle, run_once};
use upkeep_store::{Company, Frequency, InstanceStatus, MaintenanceStore};

fn mem_store() -> MaintenanceStore {
    MaintenanceStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap()
}

fn company_with_tasks(store: &MaintenanceStore, name: &str, task_count: usize) -> Company {
    let company = store.create_company(name, None, None, None).unwrap();
    for i in 0..task_count {
        let task = store
            .create_task(&format!("{name} task {i}"), None, None, None)
            .unwrap();
        store.assign_task(&company.id, &task.id).unwrap();
    }
    company
}

fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap()
}

#[test]
fn fan_out_creates_one_pending_instance_per_assignment() {
    let store = mem_store();
    let company = company_with_tasks(&store, "Acme", 3);

    let outcome = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    assert!(outcome.created);

    let instances = store.instances_for_cycle(&outcome.cycle.id).unwrap();
    assert_eq!(instances.len(), 3);

    let assignment_ids: HashSet<_> = instances.iter().map(|i| i.assignment_id.clone()).collect();
    assert_eq!(assignment_ids.len(), 3, "each instance references a distinct assignment");
    for instance in &instances {
        assert_eq!(instance.cycle_id, outcome.cycle.id);
        assert_eq!(instance.status, InstanceStatus::Pending);
    }
}

#[test]
fn find_or_create_is_idempotent() {
    let store = mem_store();
    let company = company_with_tasks(&store, "Acme", 2);

    let first = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    let second = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.cycle.id, second.cycle.id);
    assert_eq!(store.instances_for_cycle(&first.cycle.id).unwrap().len(), 2);
    assert_eq!(store.cycles_for_company(&company.id).unwrap().len(), 1);
}

#[test]
fn any_reference_in_the_period_resolves_to_the_same_cycle() {
    let store = mem_store();
    let company = company_with_tasks(&store, "Acme", 1);

    let early = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 10, 31, 23, 59, 59).unwrap();
    let a = ensure_cycle(&store, &company, Frequency::Monthly, early).unwrap();
    let b = ensure_cycle(&store, &company, Frequency::Monthly, late).unwrap();
    assert_eq!(a.cycle.id, b.cycle.id);
}

#[test]
fn zero_assignment_company_gets_an_empty_cycle() {
    let store = mem_store();
    let company = store.create_company("Idle Ltd", None, None, None).unwrap();

    let outcome = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    assert!(outcome.created);
    assert!(store.instances_for_cycle(&outcome.cycle.id).unwrap().is_empty());
}

#[test]
fn assignments_added_after_the_cycle_are_not_retroactive() {
    let store = mem_store();
    let company = company_with_tasks(&store, "Acme", 1);

    let outcome = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    assert_eq!(store.instances_for_cycle(&outcome.cycle.id).unwrap().len(), 1);

    let task = store.create_task("New obligation", None, None, None).unwrap();
    store.assign_task(&company.id, &task.id).unwrap();

    // Materialisation happens only at cycle-creation time.
    let again = ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    assert!(!again.created);
    assert_eq!(store.instances_for_cycle(&again.cycle.id).unwrap().len(), 1);
}

#[test]
fn run_once_covers_every_company_with_one_shared_period() {
    let store = mem_store();
    let acme = company_with_tasks(&store, "Acme", 2);
    let globex = company_with_tasks(&store, "Globex", 1);
    store.create_company("Idle Ltd", None, None, None).unwrap();

    let report = run_once(&store, reference()).unwrap();
    assert_eq!(report.companies, 3);
    assert_eq!(report.created, 3);
    assert!(report.failures.is_empty());

    let acme_cycles = store.cycles_for_company(&acme.id).unwrap();
    let globex_cycles = store.cycles_for_company(&globex.id).unwrap();
    assert_eq!(acme_cycles.len(), 1);
    assert_eq!(globex_cycles.len(), 1);
    assert_eq!(acme_cycles[0].start, globex_cycles[0].start);
    assert_eq!(acme_cycles[0].end, globex_cycles[0].end);

    // Re-running in the same period is a no-op.
    let rerun = run_once(&store, reference()).unwrap();
    assert_eq!(rerun.created, 0);
    assert!(rerun.failures.is_empty());
}

#[test]
fn a_new_period_gets_a_new_cycle() {
    let store = mem_store();
    let company = company_with_tasks(&store, "Acme", 1);

    ensure_cycle(&store, &company, Frequency::Monthly, reference()).unwrap();
    let november = Utc.with_ymd_and_hms(2025, 11, 2, 8, 0, 0).unwrap();
    let next = ensure_cycle(&store, &company, Frequency::Monthly, november).unwrap();

    assert!(next.created);
    assert_eq!(store.cycles_for_company(&company.id).unwrap().len(), 2);
}

#[test]
fn one_failing_company_does_not_abort_the_run() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();

    let store = MaintenanceStore::new(rusqlite::Connection::open(&path).unwrap()).unwrap();
    let acme = company_with_tasks(&store, "Acme", 1);
    let broken = company_with_tasks(&store, "Broken Pipe Ltd", 1);
    let globex = company_with_tasks(&store, "Globex", 2);

    // Reject cycle writes for one company only, standing in for a
    // store that fails mid-run. Companies are visited in name order,
    // so the rejected one sits between two healthy ones.
    let admin = rusqlite::Connection::open(&path).unwrap();
    admin
        .execute_batch(&format!(
            "CREATE TRIGGER reject_one_company
             BEFORE INSERT ON maintenance_cycles
             WHEN NEW.company_id = '{}'
             BEGIN SELECT RAISE(ABORT, 'write rejected'); END;",
            broken.id
        ))
        .unwrap();

    let report = run_once(&store, reference()).unwrap();
    assert_eq!(report.companies, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, broken.id);

    assert_eq!(store.cycles_for_company(&acme.id).unwrap().len(), 1);
    assert_eq!(store.cycles_for_company(&globex.id).unwrap().len(), 1);
    assert!(store.cycles_for_company(&broken.id).unwrap().is_empty());
}

#[test]
fn concurrent_callers_converge_on_one_cycle() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();

    let setup = MaintenanceStore::new(rusqlite::Connection::open(&path).unwrap()).unwrap();
    let company = company_with_tasks(&setup, "Acme", 2);
    drop(setup);

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let path = path.clone();
        let company = company.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            let store = MaintenanceStore::new(rusqlite::Connection::open(&path).unwrap()).unwrap();
            barrier.wait();
            ensure_cycle(&store, &company, Frequency::Monthly, reference())
                .unwrap()
                .cycle
                .id
        }));
    }
    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids[0], ids[1], "both callers observe the same cycle");

    let store = MaintenanceStore::new(rusqlite::Connection::open(&path).unwrap()).unwrap();
    assert_eq!(store.cycles_for_company(&company.id).unwrap().len(), 1);
    assert_eq!(store.instances_for_cycle(&ids[0]).unwrap().len(), 2);
}
