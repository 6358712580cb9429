//! `upkeep-scheduler` — generation of calendar-aligned maintenance cycles.
//!
//! # Overview
//!
//! Given a company's task assignments and a cadence, the scheduler
//! computes the period containing a reference instant, finds or creates
//! the [`upkeep_store::MaintenanceCycle`] for it, and fans out one
//! pending task instance per assignment. Everything is idempotent: the
//! period bounds are a pure function of (frequency, reference), so
//! re-running never duplicates cycles or instances.
//!
//! # Period boundaries (UTC)
//!
//! | Frequency   | Start                      | End                            |
//! |-------------|----------------------------|--------------------------------|
//! | `monthly`   | first instant of the month | next month start − 1 s         |
//! | `quarterly` | first instant of the quarter | next quarter start − 1 s     |
//! | `yearly`    | Jan 1 00:00:00             | Dec 31 23:59:59.999999         |
//!
//! [`SchedulerEngine`] wraps the run in a tokio loop: once at startup,
//! then on every tick of a configurable interval.

pub mod engine;
pub mod error;
pub mod period;

pub use engine::{ensure_cycle, run_once, CycleOutcome, RunReport, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use period::cycle_bounds;
