use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::engine::reservation::{self, PaymentOutcome};
use crate::error::AppError;
use crate::payment::PaymentCallback;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/return", get(payment_return))
        .route("/payments/ipn", post(payment_ipn))
}

// wallet redirect carries the signed callback as query parameters
async fn payment_return(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<PaymentCallback>,
) -> Result<Json<PaymentOutcome>, AppError> {
    let outcome = reservation::confirm_payment(state, &callback).await?;

    Ok(Json(outcome))
}

async fn payment_ipn(
    State(state): State<Arc<AppState>>,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<PaymentOutcome>, AppError> {
    let outcome = reservation::confirm_payment(state, &callback).await?;

    Ok(Json(outcome))
}
