//! Errors raised by encounter operations.
//!
//! Misses, resisted effects, refused casts and the like are ordinary outcomes
//! and travel through `Ok(..)`. Only genuine misuse of the API ends up here.

use crate::dice::DiceError;
use crate::params::ParameterError;
use crate::world::UnitId;
use thiserror::Error;

/// Errors from Encounter operations.
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    #[error("Unit {0} is down")]
    UnitDown(UnitId),

    #[error("Encounter has already started")]
    AlreadyStarted,

    #[error("Encounter is over")]
    EncounterOver,

    #[error("{0} requires a target")]
    TargetRequired(String),

    #[error("Unit {0} has no noble phantasm")]
    NoNoblePhantasm(UnitId),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
