//! The trip a ledger belongs to.
//!
//! Trips are managed elsewhere in TravelMind; the engine only keeps the row
//! its participants and expenses hang off, together with the ledger currency.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub title: String,
    /// Currency every expense of the trip must use.
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(title: String, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            currency,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub currency: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Trip> for ActiveModel {
    fn from(trip: &Trip) -> Self {
        Self {
            id: ActiveValue::Set(trip.id),
            title: ActiveValue::Set(trip.title.clone()),
            currency: ActiveValue::Set(trip.currency.code().to_string()),
            created_at: ActiveValue::Set(trip.created_at),
        }
    }
}

impl TryFrom<Model> for Trip {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            title: model.title,
            currency: Currency::try_from(model.currency.as_str())?,
            created_at: model.created_at,
        })
    }
}
