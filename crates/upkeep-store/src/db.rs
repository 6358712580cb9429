use rusqlite::{Connection, Result};

/// Initialise all tables for the maintenance tracker. Safe to call on
/// every startup — CREATE IF NOT EXISTS means it's idempotent.
///
/// Foreign keys are enabled here because the pragma is per-connection
/// and the cascade rules below depend on it.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_companies_table(conn)?;
    create_tasks_table(conn)?;
    create_assignments_table(conn)?;
    create_cycles_table(conn)?;
    create_instances_table(conn)?;
    Ok(())
}

fn create_companies_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS companies (
            id                  TEXT PRIMARY KEY NOT NULL,
            name                TEXT NOT NULL UNIQUE,
            address             TEXT,
            point_of_contact    TEXT,
            last_updated        TEXT NOT NULL,
            last_updated_by     TEXT
        );",
    )
}

fn create_tasks_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT PRIMARY KEY NOT NULL,
            name                TEXT NOT NULL UNIQUE,
            description         TEXT,
            documentation_link  TEXT,
            last_updated        TEXT NOT NULL,
            last_updated_by     TEXT
        );",
    )
}

fn create_assignments_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS company_task_assignments (
            id          TEXT PRIMARY KEY NOT NULL,
            company_id  TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            UNIQUE(company_id, task_id)
        );
        CREATE INDEX IF NOT EXISTS idx_assignments_company
            ON company_task_assignments(company_id);",
    )
}

/// The UNIQUE constraint on (company_id, frequency, start_date, end_date)
/// is what turns a concurrent find-then-create race into one winner and
/// one constraint violation instead of two cycles.
fn create_cycles_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS maintenance_cycles (
            id          TEXT PRIMARY KEY NOT NULL,
            company_id  TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            start_date  TEXT NOT NULL,   -- ISO-8601, UTC
            end_date    TEXT NOT NULL,   -- ISO-8601, UTC
            frequency   TEXT NOT NULL,   -- monthly | quarterly | yearly
            UNIQUE(company_id, frequency, start_date, end_date)
        );
        CREATE INDEX IF NOT EXISTS idx_cycles_company
            ON maintenance_cycles(company_id);",
    )
}

fn create_instances_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS task_instances (
            id              TEXT PRIMARY KEY NOT NULL,
            assignment_id   TEXT NOT NULL REFERENCES company_task_assignments(id) ON DELETE CASCADE,
            cycle_id        TEXT NOT NULL REFERENCES maintenance_cycles(id) ON DELETE CASCADE,
            task_id         TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            notes           TEXT,
            completed_at    TEXT,
            skipped_at      TEXT,
            last_updated    TEXT NOT NULL,
            last_updated_by TEXT,
            UNIQUE(assignment_id, cycle_id)
        );
        CREATE INDEX IF NOT EXISTS idx_instances_cycle
            ON task_instances(cycle_id);",
    )
}
