use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goods {
    pub name: String,
    pub weight: f64,
    pub width: f64,
    pub height: f64,
    pub length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    AwaitingPayment,
    AwaitingDriver,
    OnTheWayToPickupPoint,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (AwaitingPayment, AwaitingDriver)
                | (AwaitingPayment, Cancelled)
                | (AwaitingDriver, OnTheWayToPickupPoint)
                | (AwaitingDriver, Cancelled)
                | (OnTheWayToPickupPoint, Completed)
                | (OnTheWayToPickupPoint, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: ReservationStatus,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub send_location: String,
    pub receive_location: String,
    pub pickup_point: GeoPoint,
    pub is_now: bool,
    pub pickup_at: DateTime<FixedOffset>,
    pub distance_km: Decimal,
    pub total_price: Decimal,
    pub goods: Goods,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub reservation_id: Uuid,
    pub status: ReservationStatus,
    pub driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}
