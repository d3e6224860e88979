#![forbid(unsafe_code)]

pub mod migrations;
mod step;
mod store;

pub use step::{MigrationStep, Registry, StepFn};
pub use store::{AppliedStep, HistoryRow, MigrationStore, Status};

use ladder_core::chain::ChainError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Chain(ChainError),
    InvalidInput(&'static str),
    UnknownRevision(String),
    DependencyNotApplied {
        revision: String,
        dependency: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Chain(err) => write!(f, "revision chain: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownRevision(id) => write!(f, "unknown revision '{id}'"),
            Self::DependencyNotApplied {
                revision,
                dependency,
            } => write!(
                f,
                "revision '{revision}' requires '{dependency}' to be applied first"
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<ChainError> for StoreError {
    fn from(value: ChainError) -> Self {
        Self::Chain(value)
    }
}
