use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{BudgetSummary, Participant, ResultEngine, Trip, summary::compute_summary};

use super::{Engine, require_trip, trip_expenses, trip_participants, with_tx};

impl Engine {
    /// Computes the budget summary of a trip from its current participants
    /// and expenses.
    ///
    /// Both lists are read inside one DB transaction so the summary is built
    /// from a single snapshot; nothing is written.
    pub async fn budget_summary(&self, trip_id: Uuid) -> ResultEngine<BudgetSummary> {
        with_tx!(self, |db_tx| {
            let trip = Trip::try_from(require_trip(&db_tx, trip_id).await?)?;
            let participants: Vec<Participant> = trip_participants(&db_tx, trip_id)
                .await?
                .into_iter()
                .map(Participant::from)
                .collect();
            let expenses = trip_expenses(&db_tx, trip_id).await?;
            compute_summary(trip.currency, &participants, &expenses)
        })
    }
}
