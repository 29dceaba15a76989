use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Chf,
}

pub mod trip {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripNew {
        pub title: String,
        pub currency: Option<Currency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripView {
        pub id: Uuid,
        pub title: String,
        pub currency: Currency,
        pub created_at: DateTime<Utc>,
    }
}

pub mod participant {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantNew {
        pub name: String,
        pub email: Option<String>,
        /// Free-form label, e.g. "friend" or "family".
        pub role: Option<String>,
    }

    /// Partial update: absent fields are left untouched, an empty string
    /// clears an optional field.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ParticipantUpdate {
        pub name: Option<String>,
        pub email: Option<String>,
        pub role: Option<String>,
        pub photo_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantView {
        pub id: Uuid,
        pub trip_id: Uuid,
        pub name: String,
        pub email: Option<String>,
        pub role: Option<String>,
        pub photo_url: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantListResponse {
        pub participants: Vec<ParticipantView>,
    }
}

pub mod expense {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SplitNew {
        pub participant_id: Uuid,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub title: String,
        /// Must be > 0.
        pub amount_minor: i64,
        /// Defaults to the trip currency.
        pub currency: Option<Currency>,
        /// One of `food`, `transport`, `accommodation`, `activities`,
        /// `shopping`, `other` (default).
        pub category: Option<String>,
        pub date: NaiveDate,
        pub paid_by: Uuid,
        pub notes: Option<String>,
        pub receipt_url: Option<String>,
        pub splits: Vec<SplitNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseSplitEqually {
        pub title: String,
        pub amount_minor: i64,
        pub category: Option<String>,
        pub date: NaiveDate,
        pub paid_by: Uuid,
    }

    /// Partial update of an expense. When `splits` is absent a new amount is
    /// checked against the stored splits.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub title: Option<String>,
        pub amount_minor: Option<i64>,
        pub currency: Option<Currency>,
        pub category: Option<String>,
        pub date: Option<NaiveDate>,
        pub paid_by: Option<Uuid>,
        pub notes: Option<String>,
        pub receipt_url: Option<String>,
        pub splits: Option<Vec<SplitNew>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitView {
        pub participant_id: Uuid,
        /// `None` once the participant has left the trip.
        pub participant_name: Option<String>,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub trip_id: Uuid,
        pub title: String,
        pub amount_minor: i64,
        pub currency: Currency,
        pub category: String,
        pub date: NaiveDate,
        pub paid_by: Uuid,
        pub paid_by_name: Option<String>,
        pub notes: Option<String>,
        pub receipt_url: Option<String>,
        pub created_at: DateTime<Utc>,
        pub splits: Vec<SplitView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
    }
}

pub mod budget {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantBalanceView {
        pub participant_id: Uuid,
        pub name: String,
        pub paid_minor: i64,
        pub owes_minor: i64,
        pub balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetSummaryView {
        pub currency: Currency,
        pub total_minor: i64,
        /// Spent per category, keyed by category name.
        pub by_category: BTreeMap<String, i64>,
        pub by_participant: Vec<ParticipantBalanceView>,
        pub unbalanced_expenses: Vec<Uuid>,
    }

    /// Stateless equal-split preview.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EqualSplitRequest {
        /// Decimal amount, `.` or `,` as separator, at most two decimals.
        pub amount: String,
        pub count: usize,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EqualSplitResponse {
        pub total_minor: i64,
        pub shares_minor: Vec<i64>,
        /// The same shares formatted with two decimals.
        pub shares: Vec<String>,
    }

    /// Stateless split validation against an explicit participant set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ValidateSplitsRequest {
        pub amount_minor: i64,
        pub participants: Vec<Uuid>,
        pub splits: Vec<super::expense::SplitNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ValidateSplitsResponse {
        pub valid: bool,
        pub total_minor: i64,
        pub splits_total_minor: i64,
    }
}
