use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod budget;
mod expenses;
mod participants;
mod server;
mod trips;
mod views;

pub mod types {
    pub mod trip {
        pub use api_types::trip::{TripNew, TripView};
    }

    pub mod participant {
        pub use api_types::participant::{
            ParticipantListResponse, ParticipantNew, ParticipantUpdate, ParticipantView,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseListResponse, ExpenseNew, ExpenseSplitEqually, ExpenseUpdate, ExpenseView,
            SplitNew, SplitView,
        };
    }

    pub mod budget {
        pub use api_types::budget::{
            BudgetSummaryView, EqualSplitRequest, EqualSplitResponse, ParticipantBalanceView,
            ValidateSplitsRequest, ValidateSplitsResponse,
        };
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_minor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_minor: Option<i64>,
}

impl Error {
    fn new(error: String) -> Self {
        Self {
            error,
            expected_minor: None,
            actual_minor: None,
        }
    }
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) | EngineError::InvalidParticipantReference(_) => {
            StatusCode::NOT_FOUND
        }
        EngineError::ParticipantInUse(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::SplitMismatch { .. }
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidInput(_)
        | EngineError::InvalidCategory(_)
        | EngineError::CurrencyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn body_for_engine_error(err: EngineError) -> Error {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            Error::new("internal server error".to_string())
        }
        EngineError::SplitMismatch { expected, actual } => Error {
            error: err.to_string(),
            expected_minor: Some(expected.minor()),
            actual_minor: Some(actual.minor()),
        },
        other => Error::new(other.to_string()),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), body_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, Error::new(err)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use engine::Money;

    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_participant_maps_to_404() {
        let res = ServerError::from(EngineError::InvalidParticipantReference("x".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn participant_in_use_maps_to_409() {
        let res =
            ServerError::from(EngineError::ParticipantInUse("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::InvalidAmount("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = ServerError::from(EngineError::InvalidInput("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = ServerError::from(EngineError::SplitMismatch {
            expected: Money::new(100),
            actual: Money::new(90),
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn split_mismatch_body_carries_both_sums() {
        let body = body_for_engine_error(EngineError::SplitMismatch {
            expected: Money::new(5000),
            actual: Money::new(4000),
        });
        assert_eq!(body.expected_minor, Some(5000));
        assert_eq!(body.actual_minor, Some(4000));
        assert!(body.error.contains("50.00"));
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
