//! Trip participants.
//!
//! A participant is a person on a trip, not necessarily a registered user.
//! Expenses reference participants as payer and in their splits.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happens to the expense history of a participant being removed.
///
/// - `Block`: refuse while the participant paid for or shares in any expense.
/// - `CascadeSplits`: drop the participant's splits (the affected expenses
///   stop adding up until edited); still refuse while they are a payer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRemoval {
    #[default]
    Block,
    CascadeSplits,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    /// Free-form label, e.g. "friend" or "family".
    pub role: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(
        trip_id: Uuid,
        name: String,
        email: Option<String>,
        role: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            name,
            email,
            role,
            photo_url: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
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
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Participant> for ActiveModel {
    fn from(participant: &Participant) -> Self {
        Self {
            id: ActiveValue::Set(participant.id),
            trip_id: ActiveValue::Set(participant.trip_id),
            name: ActiveValue::Set(participant.name.clone()),
            email: ActiveValue::Set(participant.email.clone()),
            role: ActiveValue::Set(participant.role.clone()),
            photo_url: ActiveValue::Set(participant.photo_url.clone()),
            created_at: ActiveValue::Set(participant.created_at),
            updated_at: ActiveValue::Set(participant.updated_at),
        }
    }
}

impl From<Model> for Participant {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            trip_id: model.trip_id,
            name: model.name,
            email: model.email,
            role: model.role,
            photo_url: model.photo_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
