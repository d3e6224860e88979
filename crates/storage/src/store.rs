#![forbid(unsafe_code)]

use crate::step::Registry;
use crate::StoreError;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedStep {
    pub revision: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRow {
    pub revision: String,
    pub applied_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub current: Option<String>,
    pub head: Option<String>,
    pub pending: usize,
}

/// Applies registered steps against a SQLite database and records which
/// revisions have been applied. Each step runs inside its own transaction
/// together with its bookkeeping row, so a failed step leaves no trace.
#[derive(Debug)]
pub struct MigrationStore {
    conn: Connection,
}

impl MigrationStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.ensure_bookkeeping()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_bookkeeping()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_bookkeeping(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS ladder_revisions (
              seq INTEGER PRIMARY KEY AUTOINCREMENT,
              revision TEXT NOT NULL UNIQUE,
              applied_at_ms INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Applied revision ids in application order.
    pub fn applied(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT revision FROM ladder_revisions ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The newest applied revision, if any.
    pub fn current(&self) -> Result<Option<String>, StoreError> {
        Ok(self.applied()?.pop())
    }

    pub fn history(&self) -> Result<Vec<HistoryRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT revision, applied_at_ms FROM ladder_revisions ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryRow {
                revision: row.get(0)?,
                applied_at_ms: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn status(&self, registry: &Registry) -> Result<Status, StoreError> {
        let graph = registry.graph()?;
        let current = self.current()?;
        let head = graph.head()?.map(|node| node.id.as_str().to_string());
        let pending = graph.upgrade_plan(current.as_deref(), None)?.len();
        Ok(Status {
            current,
            head,
            pending,
        })
    }

    /// Applies every step between the newest applied revision and `target`
    /// (`None` = head), oldest first. Stops at the first failure; steps
    /// already committed stay applied.
    pub fn upgrade(
        &mut self,
        registry: &Registry,
        target: Option<&str>,
    ) -> Result<Vec<AppliedStep>, StoreError> {
        let graph = registry.graph()?;
        let mut applied_set: BTreeSet<String> = self.applied()?.into_iter().collect();
        let current = self.current()?;
        let plan: Vec<String> = graph
            .upgrade_plan(current.as_deref(), target)?
            .iter()
            .map(|node| node.id.as_str().to_string())
            .collect();

        let mut report = Vec::with_capacity(plan.len());
        for revision in plan {
            let step = registry
                .get(&revision)
                .copied()
                .ok_or_else(|| StoreError::UnknownRevision(revision.clone()))?;
            for dependency in step.depends_on {
                if !applied_set.contains(*dependency) {
                    return Err(StoreError::DependencyNotApplied {
                        revision,
                        dependency: dependency.to_string(),
                    });
                }
            }

            let tx = self.conn.transaction()?;
            (step.up)(&tx)?;
            tx.execute(
                "INSERT INTO ladder_revisions(revision, applied_at_ms) VALUES (?1, ?2)",
                params![step.revision, now_ms()],
            )?;
            tx.commit()?;

            applied_set.insert(revision.clone());
            report.push(AppliedStep {
                revision,
                title: step.title.to_string(),
            });
        }
        Ok(report)
    }

    /// Reverts steps newest first until `target` is the newest applied
    /// revision (`None` = revert everything).
    pub fn downgrade(
        &mut self,
        registry: &Registry,
        target: Option<&str>,
    ) -> Result<Vec<AppliedStep>, StoreError> {
        let current = self
            .current()?
            .ok_or(StoreError::InvalidInput("no revisions are applied"))?;
        let graph = registry.graph()?;
        let plan: Vec<String> = graph
            .downgrade_plan(&current, target)?
            .iter()
            .map(|node| node.id.as_str().to_string())
            .collect();
        self.revert(registry, plan)
    }

    /// Reverts at most `steps` revisions, newest first.
    pub fn downgrade_steps(
        &mut self,
        registry: &Registry,
        steps: usize,
    ) -> Result<Vec<AppliedStep>, StoreError> {
        let current = self
            .current()?
            .ok_or(StoreError::InvalidInput("no revisions are applied"))?;
        let graph = registry.graph()?;
        let mut plan: Vec<String> = graph
            .downgrade_plan(&current, None)?
            .iter()
            .map(|node| node.id.as_str().to_string())
            .collect();
        plan.truncate(steps);
        self.revert(registry, plan)
    }

    fn revert(
        &mut self,
        registry: &Registry,
        plan: Vec<String>,
    ) -> Result<Vec<AppliedStep>, StoreError> {
        let mut report = Vec::with_capacity(plan.len());
        for revision in plan {
            let step = registry
                .get(&revision)
                .copied()
                .ok_or_else(|| StoreError::UnknownRevision(revision.clone()))?;

            let tx = self.conn.transaction()?;
            (step.down)(&tx)?;
            tx.execute(
                "DELETE FROM ladder_revisions WHERE revision = ?1",
                params![step.revision],
            )?;
            tx.commit()?;

            report.push(AppliedStep {
                revision,
                title: step.title.to_string(),
            });
        }
        Ok(report)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(i64::MAX as u128) as i64
}
