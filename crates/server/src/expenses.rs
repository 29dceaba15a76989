//! Expense API endpoints

use std::collections::HashMap;

use api_types::expense::{
    ExpenseListResponse, ExpenseNew, ExpenseSplitEqually, ExpenseUpdate, ExpenseView,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{EqualSplitCmd, Expense, ExpenseCmd, ExpenseUpdateCmd};
use uuid::Uuid;

use crate::{
    ServerError,
    server::ServerState,
    views::{engine_currency, engine_splits, expense_view, parse_category},
};

/// Participant names of a trip, for enriching expense views.
async fn participant_names(
    state: &ServerState,
    trip_id: Uuid,
) -> Result<HashMap<Uuid, String>, ServerError> {
    Ok(state
        .engine
        .list_participants(trip_id)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect())
}

async fn view(state: &ServerState, expense: Expense) -> Result<ExpenseView, ServerError> {
    let names = participant_names(state, expense.trip_id).await?;
    Ok(expense_view(expense, &names))
}

pub async fn list(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let expenses = state.engine.list_expenses(trip_id).await?;
    let names = participant_names(&state, trip_id).await?;
    Ok(Json(ExpenseListResponse {
        expenses: expenses
            .into_iter()
            .map(|expense| expense_view(expense, &names))
            .collect(),
    }))
}

pub async fn expense_new(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let category = parse_category(payload.category.as_deref())?;
    let expense = state
        .engine
        .new_expense(ExpenseCmd {
            trip_id,
            title: payload.title,
            amount_minor: payload.amount_minor,
            currency: payload.currency.map(engine_currency),
            category,
            date: payload.date,
            paid_by: payload.paid_by,
            notes: payload.notes,
            receipt_url: payload.receipt_url,
            splits: engine_splits(payload.splits),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view(&state, expense).await?)))
}

pub async fn split_equally(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<ExpenseSplitEqually>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let category = parse_category(payload.category.as_deref())?;
    let expense = state
        .engine
        .new_expense_split_equally(EqualSplitCmd {
            trip_id,
            title: payload.title,
            amount_minor: payload.amount_minor,
            category,
            date: payload.date,
            paid_by: payload.paid_by,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view(&state, expense).await?)))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(expense_id).await?;
    Ok(Json(view(&state, expense).await?))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let category = payload
        .category
        .as_deref()
        .map(|name| parse_category(Some(name)))
        .transpose()?;
    let expense = state
        .engine
        .update_expense(
            expense_id,
            ExpenseUpdateCmd {
                title: payload.title,
                amount_minor: payload.amount_minor,
                currency: payload.currency.map(engine_currency),
                category,
                date: payload.date,
                paid_by: payload.paid_by,
                notes: payload.notes,
                receipt_url: payload.receipt_url,
                splits: payload.splits.map(engine_splits),
            },
        )
        .await?;
    Ok(Json(view(&state, expense).await?))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_expense(expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
