//! Trip API endpoints

use api_types::trip::{TripNew, TripView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    server::ServerState,
    views::{engine_currency, trip_view},
};

/// Handle requests for creating the trip a ledger hangs off
pub async fn trip_new(
    State(state): State<ServerState>,
    Json(payload): Json<TripNew>,
) -> Result<(StatusCode, Json<TripView>), ServerError> {
    let currency = payload
        .currency
        .map(engine_currency)
        .unwrap_or_default();
    let trip = state.engine.new_trip(&payload.title, currency).await?;
    Ok((StatusCode::CREATED, Json(trip_view(trip))))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<TripView>, ServerError> {
    let trip = state.engine.trip(trip_id).await?;
    Ok(Json(trip_view(trip)))
}
