//! Conversions between engine values and API types.

use std::collections::HashMap;

use api_types::{
    budget::{BudgetSummaryView, ParticipantBalanceView},
    expense::{ExpenseView, SplitNew, SplitView},
    participant::ParticipantView,
    trip::TripView,
};
use engine::{BudgetSummary, Expense, ExpenseCategory, Participant, Split, Trip};
use uuid::Uuid;

use crate::ServerError;

pub(crate) fn map_currency(currency: engine::Currency) -> api_types::Currency {
    match currency {
        engine::Currency::Eur => api_types::Currency::Eur,
        engine::Currency::Usd => api_types::Currency::Usd,
        engine::Currency::Gbp => api_types::Currency::Gbp,
        engine::Currency::Chf => api_types::Currency::Chf,
    }
}

pub(crate) fn engine_currency(currency: api_types::Currency) -> engine::Currency {
    match currency {
        api_types::Currency::Eur => engine::Currency::Eur,
        api_types::Currency::Usd => engine::Currency::Usd,
        api_types::Currency::Gbp => engine::Currency::Gbp,
        api_types::Currency::Chf => engine::Currency::Chf,
    }
}

/// Parses an optional category name; absent means `other`.
pub(crate) fn parse_category(category: Option<&str>) -> Result<ExpenseCategory, ServerError> {
    match category {
        Some(name) => Ok(ExpenseCategory::try_from(name)?),
        None => Ok(ExpenseCategory::Other),
    }
}

pub(crate) fn engine_splits(splits: Vec<SplitNew>) -> Vec<Split> {
    splits
        .into_iter()
        .map(|split| Split::new(split.participant_id, split.amount_minor))
        .collect()
}

pub(crate) fn trip_view(trip: Trip) -> TripView {
    TripView {
        id: trip.id,
        title: trip.title,
        currency: map_currency(trip.currency),
        created_at: trip.created_at,
    }
}

pub(crate) fn participant_view(participant: Participant) -> ParticipantView {
    ParticipantView {
        id: participant.id,
        trip_id: participant.trip_id,
        name: participant.name,
        email: participant.email,
        role: participant.role,
        photo_url: participant.photo_url,
        created_at: participant.created_at,
        updated_at: participant.updated_at,
    }
}

/// Builds the expense view, resolving payer and split names from `names`.
pub(crate) fn expense_view(expense: Expense, names: &HashMap<Uuid, String>) -> ExpenseView {
    let splits = expense
        .splits
        .iter()
        .map(|split| SplitView {
            participant_id: split.participant_id,
            participant_name: names.get(&split.participant_id).cloned(),
            amount_minor: split.amount_minor,
        })
        .collect();

    ExpenseView {
        id: expense.id,
        trip_id: expense.trip_id,
        title: expense.title,
        amount_minor: expense.amount_minor,
        currency: map_currency(expense.currency),
        category: expense.category.as_str().to_string(),
        date: expense.date,
        paid_by: expense.paid_by,
        paid_by_name: names.get(&expense.paid_by).cloned(),
        notes: expense.notes,
        receipt_url: expense.receipt_url,
        created_at: expense.created_at,
        splits,
    }
}

pub(crate) fn summary_view(summary: BudgetSummary) -> BudgetSummaryView {
    BudgetSummaryView {
        currency: map_currency(summary.currency),
        total_minor: summary.total_minor,
        by_category: summary
            .by_category
            .into_iter()
            .map(|(category, amount)| (category.as_str().to_string(), amount))
            .collect(),
        by_participant: summary
            .by_participant
            .into_iter()
            .map(|(participant_id, balance)| ParticipantBalanceView {
                participant_id,
                name: balance.name,
                paid_minor: balance.paid_minor,
                owes_minor: balance.owes_minor,
                balance_minor: balance.balance_minor,
            })
            .collect(),
        unbalanced_expenses: summary.unbalanced_expenses,
    }
}
