use std::collections::HashMap;

use sea_orm::{ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{EngineError, Expense, ParticipantRemoval, ResultEngine, Split, expense_splits};

mod budget;
mod expenses;
mod participants;
mod trips;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    participant_removal: ParticipantRemoval,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Policy applied by [`Engine::delete_participant`].
    pub fn participant_removal(&self) -> ParticipantRemoval {
        self.participant_removal
    }
}

fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

async fn require_trip<C: ConnectionTrait>(
    db: &C,
    trip_id: Uuid,
) -> ResultEngine<crate::trips::Model> {
    crate::trips::Entity::find_by_id(trip_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("trip not exists".to_string()))
}

async fn require_participant<C: ConnectionTrait>(
    db: &C,
    participant_id: Uuid,
) -> ResultEngine<crate::participants::Model> {
    crate::participants::Entity::find_by_id(participant_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("participant not exists".to_string()))
}

async fn require_expense<C: ConnectionTrait>(
    db: &C,
    expense_id: Uuid,
) -> ResultEngine<crate::expenses::Model> {
    crate::expenses::Entity::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
}

/// Participants of a trip in the order they were added.
async fn trip_participants<C: ConnectionTrait>(
    db: &C,
    trip_id: Uuid,
) -> ResultEngine<Vec<crate::participants::Model>> {
    use crate::participants::{Column, Entity};

    Entity::find()
        .filter(Column::TripId.eq(trip_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads the splits of `expense_ids`, grouped by expense and in submission order.
async fn load_splits<C: ConnectionTrait>(
    db: &C,
    expense_ids: Vec<Uuid>,
) -> ResultEngine<HashMap<Uuid, Vec<Split>>> {
    let mut grouped: HashMap<Uuid, Vec<Split>> = HashMap::new();
    if expense_ids.is_empty() {
        return Ok(grouped);
    }
    let rows = expense_splits::Entity::find()
        .filter(expense_splits::Column::ExpenseId.is_in(expense_ids))
        .order_by_asc(expense_splits::Column::ExpenseId)
        .order_by_asc(expense_splits::Column::Position)
        .all(db)
        .await?;
    for row in rows {
        grouped.entry(row.expense_id).or_default().push(row.into());
    }
    Ok(grouped)
}

/// Expenses of a trip with their splits, newest date first.
async fn trip_expenses<C: ConnectionTrait>(db: &C, trip_id: Uuid) -> ResultEngine<Vec<Expense>> {
    use crate::expenses::{Column, Entity};

    let models = Entity::find()
        .filter(Column::TripId.eq(trip_id))
        .order_by_desc(Column::Date)
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?;
    let mut splits = load_splits(db, models.iter().map(|m| m.id).collect()).await?;
    models
        .into_iter()
        .map(|model| {
            let rows = splits.remove(&model.id).unwrap_or_default();
            Expense::try_from((model, rows))
        })
        .collect()
}

async fn replace_splits<C: ConnectionTrait>(
    db: &C,
    expense_id: Uuid,
    splits: &[Split],
) -> ResultEngine<()> {
    expense_splits::Entity::delete_many()
        .filter(expense_splits::Column::ExpenseId.eq(expense_id))
        .exec(db)
        .await?;
    if splits.is_empty() {
        return Ok(());
    }
    let rows = splits
        .iter()
        .enumerate()
        .map(|(position, split)| {
            expense_splits::ActiveModel::from_split(expense_id, position, split)
        });
    expense_splits::Entity::insert_many(rows).exec(db).await?;
    Ok(())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    participant_removal: ParticipantRemoval,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Choose what deleting a participant does to their expense history.
    pub fn participant_removal(mut self, policy: ParticipantRemoval) -> EngineBuilder {
        self.participant_removal = policy;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            participant_removal: self.participant_removal,
        })
    }
}
