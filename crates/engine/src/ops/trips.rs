use sea_orm::{ActiveModelTrait, TransactionTrait};
use uuid::Uuid;

use crate::{Currency, ResultEngine, Trip, trips};

use super::{Engine, normalize_required_text, require_trip, with_tx};

impl Engine {
    /// Creates the trip row a ledger hangs off.
    pub async fn new_trip(&self, title: &str, currency: Currency) -> ResultEngine<Trip> {
        let title = normalize_required_text(title, "trip title")?;
        let trip = Trip::new(title, currency);
        with_tx!(self, |db_tx| {
            trips::ActiveModel::from(&trip).insert(&db_tx).await?;
            Ok(trip)
        })
    }

    /// Returns a trip.
    pub async fn trip(&self, trip_id: Uuid) -> ResultEngine<Trip> {
        let model = require_trip(&self.database, trip_id).await?;
        Trip::try_from(model)
    }
}
