//! Command structs for engine operations.
//!
//! These types group parameters for write operations on participants and
//! expenses, keeping call sites readable and avoiding long argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Currency, ExpenseCategory, Split};

/// Add a participant to a trip.
#[derive(Clone, Debug)]
pub struct ParticipantCmd {
    pub trip_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl ParticipantCmd {
    #[must_use]
    pub fn new(trip_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            trip_id,
            name: name.into(),
            email: None,
            role: None,
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Partial update of a participant.
///
/// `None` leaves a field untouched; for optional text fields an empty string
/// clears the value.
#[derive(Clone, Debug, Default)]
pub struct ParticipantUpdateCmd {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub photo_url: Option<String>,
}

/// Create an expense with explicit splits.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub trip_id: Uuid,
    pub title: String,
    pub amount_minor: i64,
    /// Defaults to the trip currency.
    pub currency: Option<Currency>,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
    pub paid_by: Uuid,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub splits: Vec<Split>,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(
        trip_id: Uuid,
        title: impl Into<String>,
        amount_minor: i64,
        date: NaiveDate,
        paid_by: Uuid,
    ) -> Self {
        Self {
            trip_id,
            title: title.into(),
            amount_minor,
            currency: None,
            category: ExpenseCategory::Other,
            date,
            paid_by,
            notes: None,
            receipt_url: None,
            splits: Vec::new(),
        }
    }

    #[must_use]
    pub fn category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn splits(mut self, splits: Vec<Split>) -> Self {
        self.splits = splits;
        self
    }
}

/// Create an expense shared equally by every participant of the trip.
#[derive(Clone, Debug)]
pub struct EqualSplitCmd {
    pub trip_id: Uuid,
    pub title: String,
    pub amount_minor: i64,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
    pub paid_by: Uuid,
}

/// Partial update of an expense. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct ExpenseUpdateCmd {
    pub title: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<Currency>,
    pub category: Option<ExpenseCategory>,
    pub date: Option<NaiveDate>,
    pub paid_by: Option<Uuid>,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub splits: Option<Vec<Split>>,
}
