use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::pricing;
use crate::error::AppError;
use crate::models::reservation::{
    GeoPoint, Goods, Reservation, ReservationEvent, ReservationStatus,
};
use crate::payment::{OneTimePaymentRequest, PaymentCallback, PaymentLink, RESULT_CODE_SUCCESS};
use crate::state::AppState;
use crate::store::{StoreError, TransitionError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub send_location: String,
    pub receive_location: String,
    pub pickup_point: GeoPoint,
    pub is_now: bool,
    pub pickup_at: Option<DateTime<FixedOffset>>,
    pub distance_km: Decimal,
    pub goods: Goods,
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub payment: PaymentLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Confirmed,
    Declined { result_code: i64 },
    InvalidSignature,
    Ignored { status: ReservationStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCancelOutcome {
    Cancelled,
    AlreadyProgressed(ReservationStatus),
    Missing,
}

pub async fn create(
    state: Arc<AppState>,
    user_id: Uuid,
    new: NewReservation,
) -> Result<CreatedReservation, AppError> {
    let start = Instant::now();
    let result = create_inner(&state, user_id, new).await;

    let outcome = if result.is_ok() { "created" } else { "rejected" };
    state
        .metrics
        .create_reservation_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .reservations_created_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn create_inner(
    state: &Arc<AppState>,
    user_id: Uuid,
    new: NewReservation,
) -> Result<CreatedReservation, AppError> {
    let offset = state.config.local_offset()?;
    let now_local = Utc::now().with_timezone(&offset);

    let pickup_at = if new.is_now {
        now_local
    } else {
        let requested = new.pickup_at.ok_or_else(|| {
            AppError::Validation("pickup_at is required for a scheduled pickup".to_string())
        })?;
        if requested < now_local {
            return Err(AppError::Validation("pickup time is in the past".to_string()));
        }
        requested.with_timezone(&offset)
    };

    if new.service_ids.is_empty() {
        return Err(AppError::Validation(
            "at least one service is required".to_string(),
        ));
    }

    let total_price = pricing::total_price(&state.store, new.distance_km, &new.service_ids)?;

    let reservation = Reservation {
        id: Uuid::new_v4(),
        user_id,
        driver_id: None,
        status: ReservationStatus::AwaitingPayment,
        recipient_name: new.recipient_name,
        recipient_phone: new.recipient_phone,
        send_location: new.send_location,
        receive_location: new.receive_location,
        pickup_point: new.pickup_point,
        is_now: new.is_now,
        pickup_at,
        distance_km: new.distance_km,
        total_price,
        goods: new.goods,
        created_at: Utc::now(),
    };

    let mut tx = state.store.begin_create();
    let reservation_id = tx.insert_reservation(reservation.clone());
    for service_id in &new.service_ids {
        tx.insert_line_item(*service_id).map_err(|err| match err {
            StoreError::ServiceNotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::NoReservationStaged => AppError::Server(err.to_string()),
        })?;
    }

    // a provider refusal drops `tx` and nothing becomes retrievable
    let amount = reservation.total_price.trunc().to_i64().ok_or_else(|| {
        AppError::Server(format!(
            "total price {} does not fit a wallet amount",
            reservation.total_price
        ))
    })?;
    let request_id = format!("{}{}", Utc::now().timestamp_millis(), reservation_id);
    let payment_request = OneTimePaymentRequest::new(
        &state.config.wallet,
        request_id,
        amount,
        reservation_id.to_string(),
        format!("delivery booking {reservation_id}"),
    )
    .map_err(|err| AppError::Server(format!("payment request signing failed: {err}")))?;

    let payment = state
        .gateway
        .create_payment_link(&payment_request)
        .await
        .map_err(|err| {
            warn!(
                reservation_id = %reservation_id,
                error = %err,
                "payment link creation failed; rolling back"
            );
            AppError::Server(format!("payment link creation failed: {err}"))
        })?;

    let rows = tx.commit();
    debug!(reservation_id = %reservation_id, rows, "reservation persisted");

    publish_event(state, &reservation);

    let run_at = Utc::now() + Duration::seconds(state.config.payment_window_secs as i64);
    let job_state = state.clone();
    state.scheduler.schedule_once(
        run_at,
        Box::pin(async move {
            auto_cancel(job_state, reservation_id).await;
        }),
    );

    info!(
        reservation_id = %reservation_id,
        user_id = %user_id,
        total_price = %reservation.total_price,
        "reservation created; awaiting payment"
    );

    Ok(CreatedReservation {
        reservation,
        payment,
    })
}

pub async fn confirm_payment(
    state: Arc<AppState>,
    callback: &PaymentCallback,
) -> Result<PaymentOutcome, AppError> {
    if !callback.is_valid_signature(
        &state.config.wallet.access_key,
        &state.config.wallet.secret_key,
    ) {
        state
            .metrics
            .payment_callbacks_total
            .with_label_values(&["invalid_signature"])
            .inc();
        warn!(order_id = %callback.order_id, "payment callback signature mismatch");
        return Ok(PaymentOutcome::InvalidSignature);
    }

    let reservation_id = Uuid::parse_str(&callback.order_id)
        .map_err(|_| AppError::Validation(format!("malformed order id: {}", callback.order_id)))?;

    if callback.result_code != RESULT_CODE_SUCCESS {
        state
            .metrics
            .payment_callbacks_total
            .with_label_values(&["declined"])
            .inc();
        info!(
            reservation_id = %reservation_id,
            result_code = callback.result_code,
            "payment declined by provider"
        );
        return Ok(PaymentOutcome::Declined {
            result_code: callback.result_code,
        });
    }

    match state.store.transition(
        reservation_id,
        ReservationStatus::AwaitingPayment,
        ReservationStatus::AwaitingDriver,
        |_| {},
    ) {
        Ok(reservation) => {
            state
                .metrics
                .payment_callbacks_total
                .with_label_values(&["confirmed"])
                .inc();
            refresh_awaiting_driver_gauge(&state);
            info!(reservation_id = %reservation_id, "payment confirmed; reservation awaiting driver");
            publish_event(&state, &reservation);
            Ok(PaymentOutcome::Confirmed)
        }
        Err(TransitionError::NotFound(_)) => Err(AppError::NotFound(format!(
            "reservation {reservation_id} not found"
        ))),
        Err(TransitionError::InvalidState { actual, .. }) => {
            state
                .metrics
                .payment_callbacks_total
                .with_label_values(&["ignored"])
                .inc();
            info!(
                reservation_id = %reservation_id,
                status = ?actual,
                "payment callback ignored; reservation no longer awaiting payment"
            );
            Ok(PaymentOutcome::Ignored { status: actual })
        }
        Err(err) => Err(AppError::Server(err.to_string())),
    }
}

// safe to fire late or more than once; only awaiting-payment rows cancel
pub async fn auto_cancel(state: Arc<AppState>, reservation_id: Uuid) -> AutoCancelOutcome {
    match state.store.transition(
        reservation_id,
        ReservationStatus::AwaitingPayment,
        ReservationStatus::Cancelled,
        |_| {},
    ) {
        Ok(reservation) => {
            state
                .metrics
                .auto_cancellations_total
                .with_label_values(&["cancelled"])
                .inc();
            info!(reservation_id = %reservation_id, "payment window elapsed; reservation cancelled");
            publish_event(&state, &reservation);
            AutoCancelOutcome::Cancelled
        }
        Err(TransitionError::InvalidState { actual, .. }) => {
            state
                .metrics
                .auto_cancellations_total
                .with_label_values(&["skipped"])
                .inc();
            debug!(
                reservation_id = %reservation_id,
                status = ?actual,
                "payment window elapsed; reservation already progressed"
            );
            AutoCancelOutcome::AlreadyProgressed(actual)
        }
        Err(err) => {
            warn!(
                reservation_id = %reservation_id,
                error = %err,
                "delayed cancellation check could not run"
            );
            AutoCancelOutcome::Missing
        }
    }
}

pub async fn accept(
    state: Arc<AppState>,
    caller_id: Uuid,
    driver_id: Uuid,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    if caller_id != driver_id {
        state
            .metrics
            .reservations_accepted_total
            .with_label_values(&["conflict"])
            .inc();
        return Err(AppError::Conflict(
            "driver id does not match the authenticated caller".to_string(),
        ));
    }
    if state.store.driver(driver_id).is_none() {
        return Err(AppError::NotFound(format!("driver {driver_id} not found")));
    }

    match state.store.transition(
        reservation_id,
        ReservationStatus::AwaitingDriver,
        ReservationStatus::OnTheWayToPickupPoint,
        |reservation| {
            reservation.driver_id = Some(driver_id);
        },
    ) {
        Ok(reservation) => {
            state
                .metrics
                .reservations_accepted_total
                .with_label_values(&["accepted"])
                .inc();
            refresh_awaiting_driver_gauge(&state);
            info!(
                reservation_id = %reservation_id,
                driver_id = %driver_id,
                "reservation accepted; driver en route to pickup"
            );
            publish_event(&state, &reservation);
            Ok(reservation)
        }
        Err(TransitionError::NotFound(_)) => Err(AppError::NotFound(format!(
            "reservation {reservation_id} not found"
        ))),
        Err(TransitionError::InvalidState { actual, .. }) => {
            state
                .metrics
                .reservations_accepted_total
                .with_label_values(&["conflict"])
                .inc();
            Err(AppError::Conflict(accept_conflict_message(actual).to_string()))
        }
        Err(err) => Err(AppError::Server(err.to_string())),
    }
}

fn accept_conflict_message(actual: ReservationStatus) -> &'static str {
    match actual {
        ReservationStatus::AwaitingPayment => "reservation is still awaiting payment",
        ReservationStatus::Cancelled => "reservation has been cancelled",
        ReservationStatus::Completed => "reservation is already completed",
        _ => "reservation was already taken by another driver",
    }
}

pub async fn complete(
    state: Arc<AppState>,
    caller_id: Uuid,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    let reservation = state
        .store
        .reservation(reservation_id)
        .ok_or_else(|| AppError::NotFound(format!("reservation {reservation_id} not found")))?;

    // driver_id never changes once bound, so this check is stable even
    // without holding the row
    if reservation.driver_id != Some(caller_id) {
        return Err(AppError::Conflict(
            "only the assigned driver can complete a delivery".to_string(),
        ));
    }

    match state.store.transition(
        reservation_id,
        ReservationStatus::OnTheWayToPickupPoint,
        ReservationStatus::Completed,
        |_| {},
    ) {
        Ok(reservation) => {
            info!(reservation_id = %reservation_id, driver_id = %caller_id, "delivery completed");
            publish_event(&state, &reservation);
            Ok(reservation)
        }
        Err(TransitionError::NotFound(_)) => Err(AppError::NotFound(format!(
            "reservation {reservation_id} not found"
        ))),
        Err(TransitionError::InvalidState { actual, .. }) => Err(AppError::Conflict(format!(
            "delivery is not en route (status {actual:?})"
        ))),
        Err(err) => Err(AppError::Server(err.to_string())),
    }
}

pub fn refresh_awaiting_driver_gauge(state: &AppState) {
    let awaiting = state
        .store
        .reservations_by_status(ReservationStatus::AwaitingDriver)
        .len();
    state.metrics.awaiting_driver_reservations.set(awaiting as i64);
}

fn publish_event(state: &AppState, reservation: &Reservation) {
    let event = ReservationEvent {
        reservation_id: reservation.id,
        status: reservation.status,
        driver_id: reservation.driver_id,
        at: Utc::now(),
    };
    let _ = state.reservation_events_tx.send(event);
}
