//! Participant API endpoints

use api_types::participant::{
    ParticipantListResponse, ParticipantNew, ParticipantUpdate, ParticipantView,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{ParticipantCmd, ParticipantUpdateCmd};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, views::participant_view};

pub async fn list(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<ParticipantListResponse>, ServerError> {
    let participants = state.engine.list_participants(trip_id).await?;
    Ok(Json(ParticipantListResponse {
        participants: participants.into_iter().map(participant_view).collect(),
    }))
}

pub async fn participant_new(
    State(state): State<ServerState>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<ParticipantNew>,
) -> Result<(StatusCode, Json<ParticipantView>), ServerError> {
    let participant = state
        .engine
        .new_participant(ParticipantCmd {
            trip_id,
            name: payload.name,
            email: payload.email,
            role: payload.role,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(participant_view(participant))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(participant_id): Path<Uuid>,
    Json(payload): Json<ParticipantUpdate>,
) -> Result<Json<ParticipantView>, ServerError> {
    let participant = state
        .engine
        .update_participant(
            participant_id,
            ParticipantUpdateCmd {
                name: payload.name,
                email: payload.email,
                role: payload.role,
                photo_url: payload.photo_url,
            },
        )
        .await?;
    Ok(Json(participant_view(participant)))
}

/// Removing a participant follows the engine's configured removal policy.
pub async fn delete(
    State(state): State<ServerState>,
    Path(participant_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_participant(participant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
