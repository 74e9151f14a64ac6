use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::CurrentUser;
use crate::engine::matching::{self, RankedReservation};
use crate::engine::pricing;
use crate::engine::reservation::{self, CreatedReservation, NewReservation};
use crate::error::AppError;
use crate::models::reservation::Reservation;
use crate::models::service::LineItem;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/reservations",
            post(create_reservation).get(list_reservations),
        )
        .route("/reservations/price", post(quote_price))
        .route("/reservations/awaiting-driver", get(list_awaiting_driver))
        .route(
            "/reservations/awaiting-driver/:id",
            get(awaiting_driver_detail),
        )
        .route("/reservations/:id/accept", post(accept_reservation))
        .route("/reservations/:id/complete", post(complete_reservation))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub distance_km: Decimal,
    pub service_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub total_price: Decimal,
}

#[derive(Deserialize)]
pub struct ProximityQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub driver_id: Uuid,
}

#[derive(Serialize)]
pub struct ReservationWithItems {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub line_items: Vec<LineItem>,
}

async fn quote_price(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let total_price = pricing::total_price(&state.store, payload.distance_km, &payload.service_ids)?;

    Ok(Json(QuoteResponse { total_price }))
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<NewReservation>,
) -> Result<Json<CreatedReservation>, AppError> {
    let created = reservation::create(state, user.0, payload).await?;

    Ok(Json(created))
}

async fn list_reservations(State(state): State<Arc<AppState>>) -> Json<Vec<ReservationWithItems>> {
    let reservations = state
        .store
        .reservations()
        .into_iter()
        .map(|reservation| {
            let line_items = state.store.line_items_for(reservation.id);
            ReservationWithItems {
                reservation,
                line_items,
            }
        })
        .collect();

    Json(reservations)
}

async fn list_awaiting_driver(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProximityQuery>,
) -> Json<Vec<RankedReservation>> {
    let candidate = matching::candidate_point(query.lat, query.lng);
    let ranked = matching::awaiting_driver(&state.store, state.geo.as_ref(), candidate).await;

    Json(ranked)
}

async fn awaiting_driver_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProximityQuery>,
) -> Result<Json<RankedReservation>, AppError> {
    let candidate = matching::candidate_point(query.lat, query.lng);
    let ranked =
        matching::awaiting_driver_detail(&state.store, state.geo.as_ref(), id, candidate).await?;

    Ok(Json(ranked))
}

async fn accept_reservation(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<Reservation>, AppError> {
    let accepted = reservation::accept(state, caller.0, payload.driver_id, id).await?;

    Ok(Json(accepted))
}

async fn complete_reservation(
    State(state): State<Arc<AppState>>,
    caller: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let completed = reservation::complete(state, caller.0, id).await?;

    Ok(Json(completed))
}
