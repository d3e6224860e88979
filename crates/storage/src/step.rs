#![forbid(unsafe_code)]

use crate::StoreError;
use ladder_core::chain::{ChainError, Revision, RevisionGraph};
use ladder_core::ids::RevisionId;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// One schema-change action. Steps issue their statements on the connection
/// they are handed and propagate any failure unchanged.
pub type StepFn = fn(&Connection) -> Result<(), StoreError>;

/// A registered revision: identity, chain position, and the two actions.
#[derive(Clone, Copy, Debug)]
pub struct MigrationStep {
    pub revision: &'static str,
    /// The revision this one revises; `None` marks the chain root.
    pub down_revision: Option<&'static str>,
    pub branch_labels: &'static [&'static str],
    pub depends_on: &'static [&'static str],
    pub title: &'static str,
    pub up: StepFn,
    pub down: StepFn,
}

/// Explicit revision-id → step mapping. Steps are registered one by one and
/// handed to the store; nothing is discovered by scanning.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    steps: BTreeMap<String, MigrationStep>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, revision: &str) -> Option<&MigrationStep> {
        self.steps.get(revision)
    }

    pub fn register(&mut self, step: MigrationStep) -> Result<(), StoreError> {
        if self.steps.contains_key(step.revision) {
            return Err(StoreError::Chain(ChainError::DuplicateRevision {
                id: step.revision.to_string(),
            }));
        }
        self.steps.insert(step.revision.to_string(), step);
        Ok(())
    }

    /// Projects the registered steps into a validated revision graph.
    pub fn graph(&self) -> Result<RevisionGraph, StoreError> {
        let mut graph = RevisionGraph::new();
        for step in self.steps.values() {
            graph.insert(Revision {
                id: revision_id(step.revision)?,
                parent_id: step
                    .down_revision
                    .map(revision_id)
                    .transpose()?,
                branch_labels: step
                    .branch_labels
                    .iter()
                    .map(|label| label.to_string())
                    .collect(),
                depends_on: step
                    .depends_on
                    .iter()
                    .copied()
                    .map(revision_id)
                    .collect::<Result<_, _>>()?,
                title: step.title.to_string(),
            })?;
        }
        graph.validate()?;
        Ok(graph)
    }
}

fn revision_id(value: &str) -> Result<RevisionId, StoreError> {
    RevisionId::try_new(value).map_err(|err| StoreError::InvalidInput(err.message()))
}
