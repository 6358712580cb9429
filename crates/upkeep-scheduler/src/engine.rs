use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};
use upkeep_store::{Company, Frequency, MaintenanceCycle, MaintenanceStore, StoreError};

use crate::error::{Result, SchedulerError};
use crate::period::cycle_bounds;

/// Every company is currently scheduled monthly. Per-company cadence
/// would need a frequency column on companies threaded through
/// [`run_once`]; it is deliberately not invented here.
const RUN_FREQUENCY: Frequency = Frequency::Monthly;

/// Result of one find-or-create: the cycle for the period, and whether
/// this call created it.
#[derive(Debug)]
pub struct CycleOutcome {
    pub cycle: MaintenanceCycle,
    pub created: bool,
}

/// Find or create the cycle for (company, frequency, period containing
/// `reference`).
///
/// On creation, one pending task instance is fanned out per assignment
/// persisted at that moment, atomically with the cycle. A company with
/// zero assignments gets a cycle with zero instances. Losing a creation
/// race to a concurrent caller is recovered by re-fetching the winning
/// row, so both callers observe the same cycle.
pub fn ensure_cycle(
    store: &MaintenanceStore,
    company: &Company,
    frequency: Frequency,
    reference: DateTime<Utc>,
) -> Result<CycleOutcome> {
    let (start, end) = cycle_bounds(frequency, reference)?;

    if let Some(existing) = store.find_cycle(&company.id, frequency, start, end)? {
        debug!(company_id = %company.id, cycle_id = %existing.id, "cycle already present");
        return Ok(CycleOutcome {
            cycle: existing,
            created: false,
        });
    }

    let assignments = store.assignments_for_company(&company.id)?;
    match store.create_cycle_with_instances(&company.id, frequency, start, end, &assignments) {
        Ok((cycle, instances)) => {
            info!(
                company_id = %company.id,
                cycle_id = %cycle.id,
                %frequency,
                start = %cycle.start,
                instances = instances.len(),
                "cycle created"
            );
            Ok(CycleOutcome {
                cycle,
                created: true,
            })
        }
        Err(StoreError::CycleExists { .. }) => {
            // Lost the insert race; the winner's row is committed now.
            debug!(company_id = %company.id, "lost cycle creation race, re-fetching winner");
            let cycle = store
                .find_cycle(&company.id, frequency, start, end)?
                .ok_or(StoreError::NotFound {
                    entity: "cycle",
                    id: company.id.clone(),
                })?;
            Ok(CycleOutcome {
                cycle,
                created: false,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Outcome of one full scheduler run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Companies visited.
    pub companies: usize,
    /// Cycles created by this run (as opposed to found).
    pub created: usize,
    /// Companies whose cycle could not be ensured, with the cause.
    pub failures: Vec<(String, SchedulerError)>,
}

/// Ensure the current cycle for every company in the store.
///
/// One shared `reference` for the whole run, so all companies land in
/// the same period. A failing company is recorded and logged but never
/// aborts the remaining ones.
pub fn run_once(store: &MaintenanceStore, reference: DateTime<Utc>) -> Result<RunReport> {
    let companies = store.list_companies()?;
    let mut report = RunReport {
        companies: companies.len(),
        ..RunReport::default()
    };

    for company in &companies {
        match ensure_cycle(store, company, RUN_FREQUENCY, reference) {
            Ok(outcome) if outcome.created => report.created += 1,
            Ok(_) => {}
            Err(e) => {
                error!(company_id = %company.id, name = %company.name, "cycle creation failed: {e}");
                report.failures.push((company.id.clone(), e));
            }
        }
    }
    Ok(report)
}

/// Drives [`run_once`] in a background task: immediately at startup,
/// then on every tick of the configured interval.
pub struct SchedulerEngine {
    store: Arc<MaintenanceStore>,
    tick: std::time::Duration,
}

impl SchedulerEngine {
    pub fn new(store: Arc<MaintenanceStore>, tick_secs: u64) -> Self {
        Self {
            store,
            tick: std::time::Duration::from_secs(tick_secs),
        }
    }

    /// Main loop. The first interval tick completes immediately, which
    /// gives the on-startup run; subsequent ticks re-ensure cycles so a
    /// long-lived process rolls into new periods on its own. Runs until
    /// `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick.as_secs(), "cycle scheduler started");
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick_once(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cycle scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn tick_once(&self) {
        match run_once(&self.store, Utc::now()) {
            Ok(report) => info!(
                companies = report.companies,
                created = report.created,
                failed = report.failures.len(),
                "scheduler run complete"
            ),
            Err(e) => error!("scheduler run failed: {e}"),
        }
    }
}
