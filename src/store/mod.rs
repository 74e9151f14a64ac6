use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::reservation::{Reservation, ReservationStatus};
use crate::models::service::{DeliveryService, LineItem, ShippingRate};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("line item staged before its reservation")]
    NoReservationStaged,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("reservation {0} not found")]
    NotFound(Uuid),

    #[error("reservation is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: ReservationStatus,
        actual: ReservationStatus,
    },

    #[error("no transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
}

pub struct Store {
    services: DashMap<Uuid, DeliveryService>,
    shipping_rates: DashMap<Uuid, ShippingRate>,
    reservations: DashMap<Uuid, Reservation>,
    line_items: DashMap<Uuid, LineItem>,
    drivers: DashMap<Uuid, Driver>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            shipping_rates: DashMap::new(),
            reservations: DashMap::new(),
            line_items: DashMap::new(),
            drivers: DashMap::new(),
        }
    }

    pub fn insert_service(&self, service: DeliveryService) {
        self.services.insert(service.id, service);
    }

    pub fn service(&self, id: Uuid) -> Option<DeliveryService> {
        self.services.get(&id).map(|entry| entry.value().clone())
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn insert_shipping_rate(&self, rate: ShippingRate) {
        self.shipping_rates.insert(rate.id, rate);
    }

    pub fn rates_for_service(&self, service_id: Uuid) -> Vec<ShippingRate> {
        let mut rates: Vec<ShippingRate> = self
            .shipping_rates
            .iter()
            .filter(|entry| entry.value().service_id == service_id)
            .map(|entry| entry.value().clone())
            .collect();
        rates.sort_by_key(|rate| rate.km_from);
        rates
    }

    pub fn insert_driver(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn driver(&self, id: Uuid) -> Option<Driver> {
        self.drivers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn reservation(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.get(&id).map(|entry| entry.value().clone())
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.reservations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn reservations_by_status(&self, status: ReservationStatus) -> Vec<Reservation> {
        self.reservations
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn line_items_for(&self, reservation_id: Uuid) -> Vec<LineItem> {
        self.line_items
            .iter()
            .filter(|entry| entry.value().reservation_id == reservation_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn begin_create(&self) -> CreateTx<'_> {
        CreateTx {
            store: self,
            reservation: None,
            line_items: Vec::new(),
            committed: false,
        }
    }

    // row stays locked across the read-verify-write; racing transitions
    // serialize and exactly one passes the expected guard
    pub fn transition<F>(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
        apply: F,
    ) -> Result<Reservation, TransitionError>
    where
        F: FnOnce(&mut Reservation),
    {
        if !expected.can_transition_to(next) {
            return Err(TransitionError::IllegalTransition {
                from: expected,
                to: next,
            });
        }

        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or(TransitionError::NotFound(id))?;

        if entry.status != expected {
            return Err(TransitionError::InvalidState {
                expected,
                actual: entry.status,
            });
        }

        entry.status = next;
        apply(&mut entry);
        Ok(entry.clone())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

// staged rows publish on commit; dropping without commit rolls back
pub struct CreateTx<'a> {
    store: &'a Store,
    reservation: Option<Reservation>,
    line_items: Vec<LineItem>,
    committed: bool,
}

impl CreateTx<'_> {
    pub fn insert_reservation(&mut self, reservation: Reservation) -> Uuid {
        let id = reservation.id;
        self.reservation = Some(reservation);
        id
    }

    pub fn insert_line_item(&mut self, service_id: Uuid) -> Result<Uuid, StoreError> {
        let reservation_id = self
            .reservation
            .as_ref()
            .map(|r| r.id)
            .ok_or(StoreError::NoReservationStaged)?;

        if !self.store.services.contains_key(&service_id) {
            return Err(StoreError::ServiceNotFound(service_id));
        }

        let item = LineItem {
            id: Uuid::new_v4(),
            reservation_id,
            service_id,
        };
        let id = item.id;
        self.line_items.push(item);
        Ok(id)
    }

    // line items land before the reservation so a visible reservation
    // always has its items
    pub fn commit(mut self) -> usize {
        let mut rows = 0;

        for item in self.line_items.drain(..) {
            self.store.line_items.insert(item.id, item);
            rows += 1;
        }
        if let Some(reservation) = self.reservation.take() {
            self.store.reservations.insert(reservation.id, reservation);
            rows += 1;
        }

        self.committed = true;
        rows
    }
}

impl Drop for CreateTx<'_> {
    fn drop(&mut self) {
        if !self.committed && self.reservation.is_some() {
            tracing::debug!("reservation creation rolled back before commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::reservation::{GeoPoint, Goods};

    fn service(id_seed: u128) -> DeliveryService {
        DeliveryService {
            id: Uuid::from_u128(id_seed),
            name: "standard".to_string(),
            description: None,
            price: dec!(50),
        }
    }

    fn reservation(id_seed: u128, status: ReservationStatus) -> Reservation {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        Reservation {
            id: Uuid::from_u128(id_seed),
            user_id: Uuid::from_u128(1000),
            driver_id: None,
            status,
            recipient_name: "An".to_string(),
            recipient_phone: "0900000000".to_string(),
            send_location: "District 1".to_string(),
            receive_location: "District 7".to_string(),
            pickup_point: GeoPoint {
                lat: 10.77,
                lng: 106.70,
            },
            is_now: true,
            pickup_at: offset.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            distance_km: dec!(12),
            total_price: dec!(88),
            goods: Goods {
                name: "boxes".to_string(),
                weight: 4.0,
                width: 0.4,
                height: 0.3,
                length: 0.6,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commit_publishes_reservation_and_line_items() {
        let store = Store::new();
        store.insert_service(service(1));
        store.insert_service(service(2));

        let mut tx = store.begin_create();
        let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingPayment));
        tx.insert_line_item(Uuid::from_u128(1)).unwrap();
        tx.insert_line_item(Uuid::from_u128(2)).unwrap();
        let rows = tx.commit();

        assert_eq!(rows, 3);
        assert!(store.reservation(id).is_some());
        assert_eq!(store.line_items_for(id).len(), 2);
    }

    #[test]
    fn dropped_tx_leaves_nothing_retrievable() {
        let store = Store::new();
        store.insert_service(service(1));

        let id = {
            let mut tx = store.begin_create();
            let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingPayment));
            tx.insert_line_item(Uuid::from_u128(1)).unwrap();
            id
            // tx dropped without commit
        };

        assert!(store.reservation(id).is_none());
        assert!(store.line_items_for(id).is_empty());
        assert_eq!(store.reservation_count(), 0);
    }

    #[test]
    fn line_item_for_missing_service_is_rejected() {
        let store = Store::new();

        let mut tx = store.begin_create();
        tx.insert_reservation(reservation(10, ReservationStatus::AwaitingPayment));
        let err = tx.insert_line_item(Uuid::from_u128(99)).unwrap_err();

        assert_eq!(err, StoreError::ServiceNotFound(Uuid::from_u128(99)));
    }

    #[test]
    fn line_item_requires_staged_reservation() {
        let store = Store::new();
        store.insert_service(service(1));

        let mut tx = store.begin_create();
        let err = tx.insert_line_item(Uuid::from_u128(1)).unwrap_err();

        assert_eq!(err, StoreError::NoReservationStaged);
    }

    #[test]
    fn rates_come_back_ordered_by_km_from() {
        let store = Store::new();
        let service_id = Uuid::from_u128(1);
        for (seed, km_from, km_to) in [(11, 20u32, 30u32), (12, 0, 10), (13, 10, 20)] {
            store.insert_shipping_rate(ShippingRate {
                id: Uuid::from_u128(seed),
                service_id,
                km_from,
                km_to,
                price_per_km: dec!(2),
            });
        }
        // a rate for another service must not leak in
        store.insert_shipping_rate(ShippingRate {
            id: Uuid::from_u128(14),
            service_id: Uuid::from_u128(2),
            km_from: 0,
            km_to: 100,
            price_per_km: dec!(9),
        });

        let rates = store.rates_for_service(service_id);
        let froms: Vec<u32> = rates.iter().map(|r| r.km_from).collect();
        assert_eq!(froms, vec![0, 10, 20]);
    }

    #[test]
    fn transition_applies_status_and_binding_together() {
        let store = Store::new();
        let mut tx = store.begin_create();
        let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingDriver));
        tx.commit();

        let driver_id = Uuid::from_u128(77);
        let updated = store
            .transition(
                id,
                ReservationStatus::AwaitingDriver,
                ReservationStatus::OnTheWayToPickupPoint,
                |r| r.driver_id = Some(driver_id),
            )
            .unwrap();

        assert_eq!(updated.status, ReservationStatus::OnTheWayToPickupPoint);
        assert_eq!(updated.driver_id, Some(driver_id));
    }

    #[test]
    fn transition_guard_rejects_unexpected_status() {
        let store = Store::new();
        let mut tx = store.begin_create();
        let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingDriver));
        tx.commit();

        let err = store
            .transition(
                id,
                ReservationStatus::AwaitingPayment,
                ReservationStatus::Cancelled,
                |_| {},
            )
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::InvalidState {
                expected: ReservationStatus::AwaitingPayment,
                actual: ReservationStatus::AwaitingDriver,
            }
        );
    }

    #[test]
    fn transition_rejects_edges_outside_the_table() {
        let store = Store::new();
        let mut tx = store.begin_create();
        let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingPayment));
        tx.commit();

        let err = store
            .transition(
                id,
                ReservationStatus::AwaitingPayment,
                ReservationStatus::Completed,
                |_| {},
            )
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::IllegalTransition {
                from: ReservationStatus::AwaitingPayment,
                to: ReservationStatus::Completed,
            }
        );
    }

    #[test]
    fn transition_missing_reservation_reports_not_found() {
        let store = Store::new();
        let id = Uuid::from_u128(42);

        let err = store
            .transition(
                id,
                ReservationStatus::AwaitingPayment,
                ReservationStatus::Cancelled,
                |_| {},
            )
            .unwrap_err();

        assert_eq!(err, TransitionError::NotFound(id));
    }

    #[test]
    fn concurrent_accepts_have_exactly_one_winner() {
        let store = std::sync::Arc::new(Store::new());
        let mut tx = store.begin_create();
        let id = tx.insert_reservation(reservation(10, ReservationStatus::AwaitingDriver));
        tx.commit();

        let mut handles = Vec::new();
        for seed in [1u128, 2] {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.transition(
                    id,
                    ReservationStatus::AwaitingDriver,
                    ReservationStatus::OnTheWayToPickupPoint,
                    |r| r.driver_id = Some(Uuid::from_u128(seed)),
                )
            }));
        }

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();
        let wins = outcomes.iter().filter(|o| o.is_ok()).count();

        assert_eq!(wins, 1);
        let final_driver = store.reservation(id).unwrap().driver_id;
        assert!(final_driver.is_some());
    }
}
