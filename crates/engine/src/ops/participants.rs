use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Participant, ParticipantCmd, ParticipantRemoval, ParticipantUpdateCmd,
    ResultEngine, expense_splits, expenses, participants,
};

use super::{
    Engine, normalize_optional_text, normalize_required_text, require_participant, require_trip,
    trip_participants, with_tx,
};

impl Engine {
    /// Adds a participant to a trip.
    pub async fn new_participant(&self, cmd: ParticipantCmd) -> ResultEngine<Participant> {
        let name = normalize_required_text(&cmd.name, "participant name")?;
        with_tx!(self, |db_tx| {
            require_trip(&db_tx, cmd.trip_id).await?;
            let participant = Participant::new(
                cmd.trip_id,
                name,
                normalize_optional_text(cmd.email.as_deref()),
                normalize_optional_text(cmd.role.as_deref()),
            );
            participants::ActiveModel::from(&participant)
                .insert(&db_tx)
                .await?;
            Ok(participant)
        })
    }

    /// Lists the participants of a trip in the order they were added.
    pub async fn list_participants(&self, trip_id: Uuid) -> ResultEngine<Vec<Participant>> {
        require_trip(&self.database, trip_id).await?;
        let models = trip_participants(&self.database, trip_id).await?;
        Ok(models.into_iter().map(Participant::from).collect())
    }

    /// Returns a participant.
    pub async fn participant(&self, participant_id: Uuid) -> ResultEngine<Participant> {
        require_participant(&self.database, participant_id)
            .await
            .map(Participant::from)
    }

    /// Updates the provided fields of a participant.
    pub async fn update_participant(
        &self,
        participant_id: Uuid,
        cmd: ParticipantUpdateCmd,
    ) -> ResultEngine<Participant> {
        let name = cmd
            .name
            .as_deref()
            .map(|name| normalize_required_text(name, "participant name"))
            .transpose()?;
        with_tx!(self, |db_tx| {
            let model = require_participant(&db_tx, participant_id).await?;
            let mut active: participants::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(email) = cmd.email.as_deref() {
                active.email = ActiveValue::Set(normalize_optional_text(Some(email)));
            }
            if let Some(role) = cmd.role.as_deref() {
                active.role = ActiveValue::Set(normalize_optional_text(Some(role)));
            }
            if let Some(photo_url) = cmd.photo_url.as_deref() {
                active.photo_url = ActiveValue::Set(normalize_optional_text(Some(photo_url)));
            }
            active.updated_at = ActiveValue::Set(Some(Utc::now()));
            let updated = active.update(&db_tx).await?;
            Ok(Participant::from(updated))
        })
    }

    /// Removes a participant, applying the configured [`ParticipantRemoval`]
    /// policy to their expense history.
    pub async fn delete_participant(&self, participant_id: Uuid) -> ResultEngine<()> {
        let policy = self.participant_removal;
        with_tx!(self, |db_tx| {
            let participant = require_participant(&db_tx, participant_id).await?;

            let paid = expenses::Entity::find()
                .filter(expenses::Column::PaidBy.eq(participant_id))
                .count(&db_tx)
                .await?;
            if paid > 0 {
                return Err(EngineError::ParticipantInUse(format!(
                    "{} paid for {paid} expense(s)",
                    participant.name
                )));
            }

            let shares = expense_splits::Entity::find()
                .filter(expense_splits::Column::ParticipantId.eq(participant_id))
                .count(&db_tx)
                .await?;
            if shares > 0 {
                match policy {
                    ParticipantRemoval::Block => {
                        return Err(EngineError::ParticipantInUse(format!(
                            "{} shares in {shares} expense(s)",
                            participant.name
                        )));
                    }
                    ParticipantRemoval::CascadeSplits => {
                        expense_splits::Entity::delete_many()
                            .filter(expense_splits::Column::ParticipantId.eq(participant_id))
                            .exec(&db_tx)
                            .await?;
                    }
                }
            }

            participants::Entity::delete_by_id(participant_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
