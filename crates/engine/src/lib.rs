//! Budget engine of TravelMind: trip participants, expenses with their
//! splits, and the per-participant settlement view.
//!
//! The pure parts ([`split`], [`summary`]) work on in-memory values; the
//! [`Engine`] reads and writes them through sea-orm.

pub use category::ExpenseCategory;
pub use commands::{
    EqualSplitCmd, ExpenseCmd, ExpenseUpdateCmd, ParticipantCmd, ParticipantUpdateCmd,
};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::Expense;
pub use money::Money;
pub use ops::{Engine, EngineBuilder};
pub use participants::{Participant, ParticipantRemoval};
pub use split::{
    MAX_SPLIT_SHARES, SPLIT_TOLERANCE_MINOR, Split, equal_split, equal_splits, validate_splits,
};
pub use summary::{BudgetSummary, ParticipantBalance, compute_summary};
pub use trips::Trip;

mod category;
mod commands;
mod currency;
mod error;
mod expense_splits;
mod expenses;
mod money;
mod ops;
mod participants;
pub mod split;
pub mod summary;
mod trips;

type ResultEngine<T> = Result<T, EngineError>;
