//! Expense primitives.
//!
//! An `Expense` is a single spend event on a trip, paid by one participant and
//! shared between participants through its `Split`s (see
//! [`expense_splits`](crate::expense_splits) for the storage side).

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ExpenseCategory, ResultEngine, Split};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub amount_minor: i64,
    pub currency: Currency,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
    pub paid_by: Uuid,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub splits: Vec<Split>,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trip_id: Uuid,
        title: String,
        amount_minor: i64,
        currency: Currency,
        category: ExpenseCategory,
        date: NaiveDate,
        paid_by: Uuid,
        splits: Vec<Split>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            trip_id,
            title,
            amount_minor,
            currency,
            category,
            date,
            paid_by,
            notes: None,
            receipt_url: None,
            created_at: Utc::now(),
            splits,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub amount_minor: i64,
    pub currency: String,
    pub category: String,
    pub date: Date,
    pub paid_by: Uuid,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trips::Entity",
        from = "Column::TripId",
        to = "super::trips::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Trips,
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    ExpenseSplits,
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseSplits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            trip_id: ActiveValue::Set(expense.trip_id),
            title: ActiveValue::Set(expense.title.clone()),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            currency: ActiveValue::Set(expense.currency.code().to_string()),
            category: ActiveValue::Set(expense.category.as_str().to_string()),
            date: ActiveValue::Set(expense.date),
            paid_by: ActiveValue::Set(expense.paid_by),
            notes: ActiveValue::Set(expense.notes.clone()),
            receipt_url: ActiveValue::Set(expense.receipt_url.clone()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<(Model, Vec<Split>)> for Expense {
    type Error = EngineError;

    fn try_from((model, splits): (Model, Vec<Split>)) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            trip_id: model.trip_id,
            title: model.title,
            amount_minor: model.amount_minor,
            currency: Currency::try_from(model.currency.as_str())?,
            category: ExpenseCategory::try_from(model.category.as_str())?,
            date: model.date,
            paid_by: model.paid_by,
            notes: model.notes,
            receipt_url: model.receipt_url,
            created_at: model.created_at,
            splits,
        })
    }
}
