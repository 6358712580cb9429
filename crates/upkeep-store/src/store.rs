use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::*;

/// Typed handle over the maintenance tracker database.
///
/// Thread-safe: wraps the SQLite connection in a Mutex. Constructed
/// explicitly by the surrounding service and passed to the scheduler —
/// there is no process-wide connection state.
pub struct MaintenanceStore {
    db: Mutex<Connection>,
}

impl MaintenanceStore {
    /// Wrap a connection, initialising the schema if needed.
    ///
    /// Sets a busy timeout so a writer racing another connection on the
    /// same file waits for the lock instead of failing immediately.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // --- companies ----------------------------------------------------

    pub fn create_company(
        &self,
        name: &str,
        address: Option<&str>,
        point_of_contact: Option<&str>,
        updated_by: Option<&str>,
    ) -> Result<Company> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        db.execute(
            "INSERT INTO companies
             (id, name, address, point_of_contact, last_updated, last_updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, name, address, point_of_contact, now, updated_by],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateName {
                    entity: "company",
                    name: name.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        debug!(company_id = %id, %name, "company created");
        Ok(Company {
            id,
            name: name.to_string(),
            address: address.map(String::from),
            point_of_contact: point_of_contact.map(String::from),
            last_updated: now,
            last_updated_by: updated_by.map(String::from),
        })
    }

    /// All companies, ordered by name.
    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, address, point_of_contact, last_updated, last_updated_by
             FROM companies ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_company)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_company(&self, id: &str) -> Result<Company> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, name, address, point_of_contact, last_updated, last_updated_by
             FROM companies WHERE id = ?1",
            [id],
            row_to_company,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "company",
            id: id.to_string(),
        })
    }

    /// Delete a company. Cascades to its assignments, cycles, and their
    /// task instances.
    pub fn delete_company(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM companies WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "company",
                id: id.to_string(),
            });
        }
        debug!(company_id = %id, "company deleted");
        Ok(())
    }

    // --- tasks ----------------------------------------------------------

    pub fn create_task(
        &self,
        name: &str,
        description: Option<&str>,
        documentation_link: Option<&str>,
        updated_by: Option<&str>,
    ) -> Result<Task> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        db.execute(
            "INSERT INTO tasks
             (id, name, description, documentation_link, last_updated, last_updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, name, description, documentation_link, now, updated_by],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateName {
                    entity: "task",
                    name: name.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        debug!(task_id = %id, %name, "task created");
        Ok(Task {
            id,
            name: name.to_string(),
            description: description.map(String::from),
            documentation_link: documentation_link.map(String::from),
            last_updated: now,
            last_updated_by: updated_by.map(String::from),
        })
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, description, documentation_link, last_updated, last_updated_by
             FROM tasks ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, name, description, documentation_link, last_updated, last_updated_by
             FROM tasks WHERE id = ?1",
            [id],
            row_to_task,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "task",
            id: id.to_string(),
        })
    }

    // --- assignments ------------------------------------------------------

    /// Link a task to a company. From the next cycle creation on, the
    /// company gets one task instance per cycle for it.
    pub fn assign_task(&self, company_id: &str, task_id: &str) -> Result<Assignment> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        db.execute(
            "INSERT INTO company_task_assignments (id, company_id, task_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, company_id, task_id, now],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateAssignment {
                    company_id: company_id.to_string(),
                    task_id: task_id.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        debug!(assignment_id = %id, %company_id, %task_id, "task assigned");
        Ok(Assignment {
            id,
            company_id: company_id.to_string(),
            task_id: task_id.to_string(),
            created_at: now,
        })
    }

    /// Currently persisted assignments for a company, oldest first.
    pub fn assignments_for_company(&self, company_id: &str) -> Result<Vec<Assignment>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, company_id, task_id, created_at
             FROM company_task_assignments
             WHERE company_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([company_id], row_to_assignment)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Remove an assignment. Existing task instances cascade away with it.
    pub fn remove_assignment(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM company_task_assignments WHERE id = ?1",
            [id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "assignment",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // --- cycles ----------------------------------------------------------

    /// Look up the cycle for (company, frequency, start, end) — equality
    /// on all four fields, the deduplication key of the scheduler.
    pub fn find_cycle(
        &self,
        company_id: &str,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<MaintenanceCycle>> {
        let db = self.db.lock().unwrap();
        let cycle = db
            .query_row(
                "SELECT id, company_id, start_date, end_date, frequency
                 FROM maintenance_cycles
                 WHERE company_id = ?1 AND frequency = ?2
                   AND start_date = ?3 AND end_date = ?4",
                rusqlite::params![
                    company_id,
                    frequency.to_string(),
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ],
                row_to_cycle,
            )
            .optional()?;
        Ok(cycle)
    }

    /// Create a cycle plus one pending task instance per assignment, as a
    /// single transaction: either the cycle and all its instances become
    /// visible together, or nothing does.
    ///
    /// Returns [`StoreError::CycleExists`] when another caller already
    /// persisted a cycle for the same (company, frequency, start, end).
    pub fn create_cycle_with_instances(
        &self,
        company_id: &str,
        frequency: Frequency,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        assignments: &[Assignment],
    ) -> Result<(MaintenanceCycle, Vec<TaskInstance>)> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let now = Utc::now().to_rfc3339();

        let cycle = MaintenanceCycle {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            start,
            end,
            frequency,
        };
        tx.execute(
            "INSERT INTO maintenance_cycles (id, company_id, start_date, end_date, frequency)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                cycle.id,
                cycle.company_id,
                start.to_rfc3339(),
                end.to_rfc3339(),
                frequency.to_string()
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::CycleExists {
                    company_id: company_id.to_string(),
                }
            } else {
                e.into()
            }
        })?;

        let mut instances = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let instance = TaskInstance {
                id: Uuid::new_v4().to_string(),
                assignment_id: assignment.id.clone(),
                cycle_id: cycle.id.clone(),
                task_id: assignment.task_id.clone(),
                status: InstanceStatus::Pending,
                notes: None,
                completed_at: None,
                skipped_at: None,
                last_updated: now.clone(),
                last_updated_by: None,
            };
            tx.execute(
                "INSERT INTO task_instances
                 (id, assignment_id, cycle_id, task_id, status, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    instance.id,
                    instance.assignment_id,
                    instance.cycle_id,
                    instance.task_id,
                    instance.status.to_string(),
                    instance.last_updated
                ],
            )?;
            instances.push(instance);
        }

        // Dropping the transaction without this rolls everything back,
        // so a failure mid fan-out never leaves a half-populated cycle.
        tx.commit()?;
        Ok((cycle, instances))
    }

    /// All cycles for a company, earliest period first.
    pub fn cycles_for_company(&self, company_id: &str) -> Result<Vec<MaintenanceCycle>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, company_id, start_date, end_date, frequency
             FROM maintenance_cycles
             WHERE company_id = ?1
             ORDER BY start_date",
        )?;
        let rows = stmt.query_map([company_id], row_to_cycle)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // --- task instances ---------------------------------------------------

    pub fn instances_for_cycle(&self, cycle_id: &str) -> Result<Vec<TaskInstance>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, assignment_id, cycle_id, task_id, status, notes,
                    completed_at, skipped_at, last_updated, last_updated_by
             FROM task_instances
             WHERE cycle_id = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([cycle_id], row_to_instance)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_instance(&self, id: &str) -> Result<TaskInstance> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, assignment_id, cycle_id, task_id, status, notes,
                    completed_at, skipped_at, last_updated, last_updated_by
             FROM task_instances WHERE id = ?1",
            [id],
            row_to_instance,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "task instance",
            id: id.to_string(),
        })
    }

    /// Transition an instance's status. Completing stamps `completed_at`,
    /// skipping stamps `skipped_at`, returning to pending clears both.
    /// Notes are updated when `notes` is `Some`, left alone otherwise.
    pub fn set_instance_status(
        &self,
        id: &str,
        status: InstanceStatus,
        notes: Option<&str>,
        updated_by: Option<&str>,
    ) -> Result<TaskInstance> {
        let now = Utc::now().to_rfc3339();
        let (completed_at, skipped_at) = match status {
            InstanceStatus::Completed => (Some(now.as_str()), None),
            InstanceStatus::Skipped => (None, Some(now.as_str())),
            InstanceStatus::Pending => (None, None),
        };
        {
            let db = self.db.lock().unwrap();
            let n = db.execute(
                "UPDATE task_instances
                 SET status = ?1, notes = COALESCE(?2, notes),
                     completed_at = ?3, skipped_at = ?4,
                     last_updated = ?5, last_updated_by = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    status.to_string(),
                    notes,
                    completed_at,
                    skipped_at,
                    now,
                    updated_by,
                    id
                ],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound {
                    entity: "task instance",
                    id: id.to_string(),
                });
            }
        }
        self.get_instance(id)
    }
}

/// SQLITE_CONSTRAINT_UNIQUE specifically — a foreign-key violation is a
/// caller bug and must not be mistaken for "row already exists".
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// --- row mappers -----------------------------------------------------------
// Centralised here so every query in this crate stays consistent.

fn row_to_company(row: &rusqlite::Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        point_of_contact: row.get(3)?,
        last_updated: row.get(4)?,
        last_updated_by: row.get(5)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        documentation_link: row.get(3)?,
        last_updated: row.get(4)?,
        last_updated_by: row.get(5)?,
    })
}

fn row_to_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        company_id: row.get(1)?,
        task_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_cycle(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaintenanceCycle> {
    Ok(MaintenanceCycle {
        id: row.get(0)?,
        company_id: row.get(1)?,
        start: parse_utc(2, &row.get::<_, String>(2)?)?,
        end: parse_utc(3, &row.get::<_, String>(3)?)?,
        frequency: parse_column(4, &row.get::<_, String>(4)?)?,
    })
}

fn row_to_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskInstance> {
    Ok(TaskInstance {
        id: row.get(0)?,
        assignment_id: row.get(1)?,
        cycle_id: row.get(2)?,
        task_id: row.get(3)?,
        status: parse_column(4, &row.get::<_, String>(4)?)?,
        notes: row.get(5)?,
        completed_at: row.get(6)?,
        skipped_at: row.get(7)?,
        last_updated: row.get(8)?,
        last_updated_by: row.get(9)?,
    })
}

fn parse_utc(col: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_column<T>(col: usize, s: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    s.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, e.into())
    })
}
