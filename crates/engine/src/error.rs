//! The module contains the error the engine can throw.
//!
//! The errors a caller is expected to handle are:
//!
//! - [`SplitMismatch`] thrown when the splits of an expense do not add up to
//!   its amount.
//! - [`InvalidParticipantReference`] thrown when an expense names a
//!   participant that is not on the trip.
//! - [`KeyNotFound`] thrown when an item is not found.
//!
//!  [`SplitMismatch`]: EngineError::SplitMismatch
//!  [`InvalidParticipantReference`]: EngineError::InvalidParticipantReference
//!  [`KeyNotFound`]: EngineError::KeyNotFound
use sea_orm::DbErr;
use thiserror::Error;

use crate::Money;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Splits total ({actual}) must equal expense amount ({expected})")]
    SplitMismatch { expected: Money, actual: Money },
    #[error("Participant {0} is not part of this trip")]
    InvalidParticipantReference(String),
    #[error("Participant in use: {0}")]
    ParticipantInUse(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (
                Self::SplitMismatch {
                    expected: e1,
                    actual: a1,
                },
                Self::SplitMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (Self::InvalidParticipantReference(a), Self::InvalidParticipantReference(b)) => {
                a == b
            }
            (Self::ParticipantInUse(a), Self::ParticipantInUse(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
