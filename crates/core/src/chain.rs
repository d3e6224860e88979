#![forbid(unsafe_code)]

use crate::ids::RevisionId;
use std::collections::{BTreeMap, BTreeSet};

/// A single schema-change unit: an upgrade/downgrade pair identified by an
/// opaque token, pointing at the revision it revises (`parent_id`, `None`
/// for the chain root).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub id: RevisionId,
    pub parent_id: Option<RevisionId>,
    pub branch_labels: BTreeSet<String>,
    pub depends_on: BTreeSet<RevisionId>,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainError {
    DuplicateRevision { id: String },
    UnknownParent { id: String, parent: String },
    UnknownDependency { id: String, dependency: String },
    SelfDependency { id: String },
    Cycle { id: String },
    NoRoot,
    MultipleRoots { first: String, second: String },
    Branched { parent: String, first: String, second: String },
    UnknownRevision { id: String },
    TargetNotAhead { current: String, target: String },
    TargetNotBehind { current: String, target: String },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateRevision { id } => write!(f, "duplicate revision '{id}'"),
            Self::UnknownParent { id, parent } => {
                write!(f, "revision '{id}' revises unknown revision '{parent}'")
            }
            Self::UnknownDependency { id, dependency } => {
                write!(f, "revision '{id}' depends on unknown revision '{dependency}'")
            }
            Self::SelfDependency { id } => write!(f, "revision '{id}' depends on itself"),
            Self::Cycle { id } => write!(f, "revision chain has a cycle through '{id}'"),
            Self::NoRoot => write!(f, "revision chain has no root"),
            Self::MultipleRoots { first, second } => {
                write!(f, "revision chain has multiple roots ('{first}', '{second}')")
            }
            Self::Branched {
                parent,
                first,
                second,
            } => write!(
                f,
                "revision '{parent}' is revised by both '{first}' and '{second}'"
            ),
            Self::UnknownRevision { id } => write!(f, "unknown revision '{id}'"),
            Self::TargetNotAhead { current, target } => write!(
                f,
                "target revision '{target}' is not ahead of current '{current}'"
            ),
            Self::TargetNotBehind { current, target } => write!(
                f,
                "target revision '{target}' is not behind current '{current}'"
            ),
        }
    }
}

impl std::error::Error for ChainError {}

/// Revisions keyed by id. Ordering comes from the `parent_id` links, never
/// from insertion order.
#[derive(Clone, Debug, Default)]
pub struct RevisionGraph {
    nodes: BTreeMap<String, Revision>,
}

impl RevisionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.nodes.get(id)
    }

    pub fn insert(&mut self, revision: Revision) -> Result<(), ChainError> {
        let id = revision.id.as_str().to_string();
        if self.nodes.contains_key(&id) {
            return Err(ChainError::DuplicateRevision { id });
        }
        self.nodes.insert(id, revision);
        Ok(())
    }

    /// Checks the spec'd invariants: every reference resolves, parent links
    /// are acyclic, exactly one root, and the chain is linear (no revision
    /// is revised twice).
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.nodes.is_empty() {
            return Ok(());
        }

        let mut root: Option<&str> = None;
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for node in self.nodes.values() {
            match &node.parent_id {
                None => match root {
                    None => root = Some(node.id.as_str()),
                    Some(first) => {
                        return Err(ChainError::MultipleRoots {
                            first: first.to_string(),
                            second: node.id.as_str().to_string(),
                        });
                    }
                },
                Some(parent) => {
                    if !self.nodes.contains_key(parent.as_str()) {
                        return Err(ChainError::UnknownParent {
                            id: node.id.as_str().to_string(),
                            parent: parent.as_str().to_string(),
                        });
                    }
                    children
                        .entry(parent.as_str())
                        .or_default()
                        .push(node.id.as_str());
                }
            }
            for dependency in &node.depends_on {
                if dependency == &node.id {
                    return Err(ChainError::SelfDependency {
                        id: node.id.as_str().to_string(),
                    });
                }
                if !self.nodes.contains_key(dependency.as_str()) {
                    return Err(ChainError::UnknownDependency {
                        id: node.id.as_str().to_string(),
                        dependency: dependency.as_str().to_string(),
                    });
                }
            }
        }

        if root.is_none() {
            return Err(ChainError::NoRoot);
        }
        for (parent, kids) in &children {
            if kids.len() > 1 {
                return Err(ChainError::Branched {
                    parent: parent.to_string(),
                    first: kids[0].to_string(),
                    second: kids[1].to_string(),
                });
            }
        }

        // Walk up the parent links from every node; with resolved parents a
        // revisit means a cycle.
        for node in self.nodes.values() {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            let mut cursor = node;
            loop {
                if !seen.insert(cursor.id.as_str()) {
                    return Err(ChainError::Cycle {
                        id: cursor.id.as_str().to_string(),
                    });
                }
                match &cursor.parent_id {
                    None => break,
                    Some(parent) => match self.nodes.get(parent.as_str()) {
                        Some(next) => cursor = next,
                        None => break,
                    },
                }
            }
        }

        Ok(())
    }

    /// Root → head ordering along the parent links.
    pub fn linearize(&self) -> Result<Vec<&Revision>, ChainError> {
        self.validate()?;
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut next_of: BTreeMap<&str, &Revision> = BTreeMap::new();
        let mut root: Option<&Revision> = None;
        for node in self.nodes.values() {
            match &node.parent_id {
                None => root = Some(node),
                Some(parent) => {
                    next_of.insert(parent.as_str(), node);
                }
            }
        }

        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut cursor = root;
        while let Some(node) = cursor {
            ordered.push(node);
            cursor = next_of.get(node.id.as_str()).copied();
        }
        Ok(ordered)
    }

    /// The revision no other revision revises, if the chain is non-empty.
    pub fn head(&self) -> Result<Option<&Revision>, ChainError> {
        Ok(self.linearize()?.last().copied())
    }

    /// Revisions to apply, oldest first, to move from `current` (`None` =
    /// nothing applied) to `target` (`None` = head). Empty when already
    /// there.
    pub fn upgrade_plan(
        &self,
        current: Option<&str>,
        target: Option<&str>,
    ) -> Result<Vec<&Revision>, ChainError> {
        let ordered = self.linearize()?;
        let start = match current {
            None => 0,
            Some(id) => self.position_of(&ordered, id)? + 1,
        };
        let end = match target {
            None => ordered.len(),
            Some(id) => {
                let index = self.position_of(&ordered, id)?;
                if index + 1 < start {
                    return Err(ChainError::TargetNotAhead {
                        current: current.unwrap_or_default().to_string(),
                        target: id.to_string(),
                    });
                }
                index + 1
            }
        };
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(ordered[start..end].to_vec())
    }

    /// Revisions to revert, newest first, to move from `current` back to
    /// `target` (`None` = base, i.e. revert everything applied).
    pub fn downgrade_plan(
        &self,
        current: &str,
        target: Option<&str>,
    ) -> Result<Vec<&Revision>, ChainError> {
        let ordered = self.linearize()?;
        let current_index = self.position_of(&ordered, current)?;
        let keep = match target {
            None => 0,
            Some(id) => {
                let index = self.position_of(&ordered, id)?;
                if index > current_index {
                    return Err(ChainError::TargetNotBehind {
                        current: current.to_string(),
                        target: id.to_string(),
                    });
                }
                index + 1
            }
        };
        let mut plan: Vec<&Revision> = ordered[keep..=current_index].to_vec();
        plan.reverse();
        Ok(plan)
    }

    fn position_of(&self, ordered: &[&Revision], id: &str) -> Result<usize, ChainError> {
        ordered
            .iter()
            .position(|node| node.id.as_str() == id)
            .ok_or_else(|| ChainError::UnknownRevision { id: id.to_string() })
    }
}
