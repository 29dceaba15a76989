use std::collections::HashSet;

use sea_orm::{ActiveModelTrait, ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, EqualSplitCmd, Expense, ExpenseCmd, ExpenseUpdateCmd, ResultEngine,
    Split, Trip, currency::ensure_trip_currency, equal_splits, expense_splits, expenses,
    split::validate_splits,
};

use super::{
    Engine, load_splits, normalize_optional_text, normalize_required_text, replace_splits,
    require_expense, require_trip, trip_expenses, trip_participants, with_tx,
};

/// Checks payer and splits of an expense against the current participants of
/// its trip.
fn validate_expense(
    trip: &Trip,
    participant_ids: &HashSet<Uuid>,
    amount_minor: i64,
    currency: Currency,
    paid_by: Uuid,
    splits: &[Split],
) -> ResultEngine<()> {
    ensure_trip_currency(trip.currency, currency)?;
    if !participant_ids.contains(&paid_by) {
        return Err(EngineError::InvalidParticipantReference(paid_by.to_string()));
    }
    validate_splits(amount_minor, splits, participant_ids)
}

impl Engine {
    /// Creates an expense with explicit splits.
    ///
    /// The payer and every split participant must be on the trip, and the
    /// splits must add up to the amount; otherwise nothing is stored.
    pub async fn new_expense(&self, cmd: ExpenseCmd) -> ResultEngine<Expense> {
        let title = normalize_required_text(&cmd.title, "expense title")?;
        with_tx!(self, |db_tx| {
            let trip = Trip::try_from(require_trip(&db_tx, cmd.trip_id).await?)?;
            let participant_ids: HashSet<Uuid> = trip_participants(&db_tx, trip.id)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();

            let currency = cmd.currency.unwrap_or(trip.currency);
            validate_expense(
                &trip,
                &participant_ids,
                cmd.amount_minor,
                currency,
                cmd.paid_by,
                &cmd.splits,
            )?;

            let mut expense = Expense::new(
                trip.id,
                title,
                cmd.amount_minor,
                currency,
                cmd.category,
                cmd.date,
                cmd.paid_by,
                cmd.splits,
            )?;
            expense.notes = normalize_optional_text(cmd.notes.as_deref());
            expense.receipt_url = normalize_optional_text(cmd.receipt_url.as_deref());

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            replace_splits(&db_tx, expense.id, &expense.splits).await?;
            Ok(expense)
        })
    }

    /// Creates an expense shared equally by every participant of the trip.
    ///
    /// Participants are taken in the order they were added; the last one
    /// absorbs the rounding remainder (see [`crate::equal_split`]).
    pub async fn new_expense_split_equally(&self, cmd: EqualSplitCmd) -> ResultEngine<Expense> {
        let participants = trip_participants(&self.database, cmd.trip_id).await?;
        if participants.is_empty() {
            require_trip(&self.database, cmd.trip_id).await?;
            return Err(EngineError::InvalidAmount(
                "no participants found for this trip".to_string(),
            ));
        }
        let ids: Vec<Uuid> = participants.iter().map(|p| p.id).collect();
        let splits = equal_splits(cmd.amount_minor, &ids)?;

        self.new_expense(ExpenseCmd {
            trip_id: cmd.trip_id,
            title: cmd.title,
            amount_minor: cmd.amount_minor,
            currency: None,
            category: cmd.category,
            date: cmd.date,
            paid_by: cmd.paid_by,
            notes: None,
            receipt_url: None,
            splits,
        })
        .await
    }

    /// Returns an expense with its splits.
    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        let model = require_expense(&self.database, expense_id).await?;
        let splits = load_splits(&self.database, vec![expense_id])
            .await?
            .remove(&expense_id)
            .unwrap_or_default();
        Expense::try_from((model, splits))
    }

    /// Lists the expenses of a trip, newest date first.
    pub async fn list_expenses(&self, trip_id: Uuid) -> ResultEngine<Vec<Expense>> {
        require_trip(&self.database, trip_id).await?;
        trip_expenses(&self.database, trip_id).await
    }

    /// Updates the provided fields of an expense.
    ///
    /// Amount, payer, currency and splits are re-validated as a whole against
    /// the current participants: a new amount without new splits must still
    /// match the stored splits.
    pub async fn update_expense(
        &self,
        expense_id: Uuid,
        cmd: ExpenseUpdateCmd,
    ) -> ResultEngine<Expense> {
        let title = cmd
            .title
            .as_deref()
            .map(|title| normalize_required_text(title, "expense title"))
            .transpose()?;
        with_tx!(self, |db_tx| {
            let model = require_expense(&db_tx, expense_id).await?;
            let stored_splits = load_splits(&db_tx, vec![expense_id])
                .await?
                .remove(&expense_id)
                .unwrap_or_default();
            let current = Expense::try_from((model.clone(), stored_splits))?;

            let amount_minor = cmd.amount_minor.unwrap_or(current.amount_minor);
            let currency = cmd.currency.unwrap_or(current.currency);
            let paid_by = cmd.paid_by.unwrap_or(current.paid_by);
            let splits_changed = cmd.splits.is_some();
            let splits = cmd.splits.unwrap_or(current.splits);

            if cmd.amount_minor.is_some()
                || cmd.currency.is_some()
                || cmd.paid_by.is_some()
                || splits_changed
            {
                let trip = Trip::try_from(require_trip(&db_tx, current.trip_id).await?)?;
                let participant_ids: HashSet<Uuid> = trip_participants(&db_tx, trip.id)
                    .await?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                validate_expense(
                    &trip,
                    &participant_ids,
                    amount_minor,
                    currency,
                    paid_by,
                    &splits,
                )?;
            }

            let mut active: expenses::ActiveModel = model.into();
            if let Some(title) = title {
                active.title = ActiveValue::Set(title);
            }
            if let Some(category) = cmd.category {
                active.category = ActiveValue::Set(category.as_str().to_string());
            }
            if let Some(date) = cmd.date {
                active.date = ActiveValue::Set(date);
            }
            if let Some(notes) = cmd.notes.as_deref() {
                active.notes = ActiveValue::Set(normalize_optional_text(Some(notes)));
            }
            if let Some(receipt_url) = cmd.receipt_url.as_deref() {
                active.receipt_url = ActiveValue::Set(normalize_optional_text(Some(receipt_url)));
            }
            active.amount_minor = ActiveValue::Set(amount_minor);
            active.currency = ActiveValue::Set(currency.code().to_string());
            active.paid_by = ActiveValue::Set(paid_by);
            let updated = active.update(&db_tx).await?;

            if splits_changed {
                replace_splits(&db_tx, expense_id, &splits).await?;
            }
            Expense::try_from((updated, splits))
        })
    }

    /// Deletes an expense together with its splits.
    pub async fn delete_expense(&self, expense_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_expense(&db_tx, expense_id).await?;
            expense_splits::Entity::delete_many()
                .filter(expense_splits::Column::ExpenseId.eq(expense_id))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
