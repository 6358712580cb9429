//! `upkeep-store` — SQLite-backed persistence for the maintenance tracker.
//!
//! Holds the entity types (companies, tasks, assignments, maintenance
//! cycles, task instances) and [`store::MaintenanceStore`], the typed
//! handle every other crate reads and writes through. The scheduler never
//! touches SQL directly; it calls the store operations defined here.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::MaintenanceStore;
pub use types::{
    Assignment, Company, Frequency, InstanceStatus, MaintenanceCycle, Task, TaskInstance,
};
