use axum::{
    Router,
    routing::{get, post},
};

use std::sync::Arc;

use crate::{budget, expenses, participants, trips};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/trips", post(trips::trip_new))
        .route("/api/trips/{trip_id}", get(trips::get))
        .route(
            "/api/trips/{trip_id}/participants",
            get(participants::list).post(participants::participant_new),
        )
        .route(
            "/api/trips/participants/{participant_id}",
            axum::routing::put(participants::update).delete(participants::delete),
        )
        .route(
            "/api/budget/{trip_id}/expenses",
            get(expenses::list).post(expenses::expense_new),
        )
        .route(
            "/api/budget/{trip_id}/expenses/split-equally",
            post(expenses::split_equally),
        )
        .route(
            "/api/budget/expenses/{expense_id}",
            get(expenses::get)
                .put(expenses::update)
                .delete(expenses::delete),
        )
        .route("/api/budget/{trip_id}/budget-summary", get(budget::summary))
        .route("/api/budget/equal-split", post(budget::equal_split))
        .route("/api/budget/validate-splits", post(budget::validate_splits))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}
