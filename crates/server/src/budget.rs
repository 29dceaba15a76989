//! Budget summary and the stateless split helpers

use std::collections::HashSet;

use api_types::budget::{
    BudgetSummaryView, EqualSplitRequest, EqualSplitResponse, ValidateSplitsRequest,
    ValidateSplitsResponse,
};
use axum::{
    Json,
    extract::{Path, State},
};
use engine::{EngineError, MAX_SPLIT_SHARES, Money, split::split_total};
use uuid::Uuid;

use crate::{
    ServerError,
    server::ServerState,
    views::{engine_splits, summary_view},
};

pub async fn summary(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<BudgetSummaryView>, ServerError> {
    let summary = state.engine.budget_summary(trip_id).await?;
    if !summary.unbalanced_expenses.is_empty() {
        tracing::warn!(
            "trip {trip_id} has {} unbalanced expense(s)",
            summary.unbalanced_expenses.len()
        );
    }
    Ok(Json(summary_view(summary)))
}

pub async fn equal_split(
    Json(payload): Json<EqualSplitRequest>,
) -> Result<Json<EqualSplitResponse>, ServerError> {
    if payload.count > MAX_SPLIT_SHARES {
        return Err(EngineError::InvalidAmount(format!(
            "count must be at most {MAX_SPLIT_SHARES}"
        ))
        .into());
    }
    let total: Money = payload.amount.parse()?;
    let shares_minor = engine::equal_split(total.minor(), payload.count)?;
    let shares = shares_minor
        .iter()
        .map(|share| Money::new(*share).to_string())
        .collect();
    Ok(Json(EqualSplitResponse {
        total_minor: total.minor(),
        shares_minor,
        shares,
    }))
}

pub async fn validate_splits(
    Json(payload): Json<ValidateSplitsRequest>,
) -> Result<Json<ValidateSplitsResponse>, ServerError> {
    let participants: HashSet<Uuid> = payload.participants.into_iter().collect();
    let splits = engine_splits(payload.splits);
    engine::validate_splits(payload.amount_minor, &splits, &participants)?;
    Ok(Json(ValidateSplitsResponse {
        valid: true,
        total_minor: payload.amount_minor,
        splits_total_minor: split_total(&splits)?,
    }))
}
