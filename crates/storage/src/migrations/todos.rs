#![forbid(unsafe_code)]

use crate::{MigrationStep, StoreError};
use rusqlite::Connection;

pub const REVISION: &str = "84b29e2ae377";

pub fn step() -> MigrationStep {
    MigrationStep {
        revision: REVISION,
        down_revision: None,
        branch_labels: &[],
        depends_on: &[],
        title: "create todos table",
        up: upgrade,
        down: downgrade,
    }
}

// Deliberately no IF NOT EXISTS / IF EXISTS guards: re-running either
// direction surfaces the underlying SQLite error unchanged.
fn upgrade(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE todos (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT,
          completed BOOLEAN NOT NULL DEFAULT FALSE
        );
        "#,
    )?;
    Ok(())
}

fn downgrade(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("DROP TABLE todos;")?;
    Ok(())
}
