//! Storage of expense splits.
//!
//! One row per (expense, participant). `position` keeps the order the splits
//! were submitted in, which matters for equal splits where the last share
//! absorbs the rounding remainder.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::Split;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub participant_id: Uuid,
    pub amount_minor: i64,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_split(expense_id: Uuid, position: usize, split: &Split) -> Self {
        Self {
            expense_id: ActiveValue::Set(expense_id),
            participant_id: ActiveValue::Set(split.participant_id),
            amount_minor: ActiveValue::Set(split.amount_minor),
            position: ActiveValue::Set(i32::try_from(position).unwrap_or(i32::MAX)),
        }
    }
}

impl From<Model> for Split {
    fn from(model: Model) -> Self {
        Split::new(model.participant_id, model.amount_minor)
    }
}
