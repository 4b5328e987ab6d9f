//! Error types for the simulation engine.

use grandline_logic::ids::TaskId;
use grandline_logic::movement::MovementError;
use thiserror::Error;

/// A keyed lookup that came back empty, or a table that ran out of ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{collection} #{id} not found")]
    Missing { collection: &'static str, id: u32 },
    #[error("no ids left to allocate in {collection}")]
    IdsExhausted { collection: &'static str },
}

#[derive(Debug, Error)]
pub enum SimError {
    /// The world references something that must exist but does not.
    #[error("data integrity violation: {0}")]
    Integrity(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("movement rejected: {0}")]
    Movement(#[from] MovementError),
    #[error("task {0} is not finished yet")]
    TaskNotFinished(TaskId),
}

impl SimError {
    pub fn integrity(message: impl Into<String>) -> Self {
        SimError::Integrity(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        SimError::InvalidState(message.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
