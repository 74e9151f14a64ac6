use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoDistance;
use crate::models::reservation::{GeoPoint, Reservation, ReservationStatus};
use crate::store::Store;

pub const HIGH_PRIORITY_RADIUS_KM: f64 = 10.0;

// high_priority is only ever true for a known distance within the radius
#[derive(Debug, Clone, Serialize)]
pub struct RankedReservation {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub driver_distance_km: Option<f64>,
    pub high_priority: bool,
}

pub fn candidate_point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    }
}

pub async fn rank_one(
    geo: &dyn GeoDistance,
    reservation: Reservation,
    candidate: Option<GeoPoint>,
) -> RankedReservation {
    let driver_distance_km = match candidate {
        Some(point) => match geo.distance_meters(point, reservation.pickup_point).await {
            Ok(meters) => Some(meters / 1000.0),
            Err(err) => {
                warn!(
                    reservation_id = %reservation.id,
                    error = %err,
                    "geo distance lookup failed; leaving distance unknown"
                );
                None
            }
        },
        None => None,
    };

    let high_priority = driver_distance_km
        .map(|km| km <= HIGH_PRIORITY_RADIUS_KM)
        .unwrap_or(false);

    RankedReservation {
        reservation,
        driver_distance_km,
        high_priority,
    }
}

// a failed lookup degrades its own entry, never the listing
pub async fn awaiting_driver(
    store: &Store,
    geo: &dyn GeoDistance,
    candidate: Option<GeoPoint>,
) -> Vec<RankedReservation> {
    let mut ranked = Vec::new();

    for reservation in store.reservations_by_status(ReservationStatus::AwaitingDriver) {
        ranked.push(rank_one(geo, reservation, candidate).await);
    }

    ranked
}

pub async fn awaiting_driver_detail(
    store: &Store,
    geo: &dyn GeoDistance,
    reservation_id: Uuid,
    candidate: Option<GeoPoint>,
) -> Result<RankedReservation, AppError> {
    let reservation = store
        .reservation(reservation_id)
        .ok_or_else(|| AppError::NotFound(format!("reservation {reservation_id} not found")))?;

    Ok(rank_one(geo, reservation, candidate).await)
}
