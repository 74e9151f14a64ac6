mod api;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod observability;
mod payment;
mod scheduler;
mod state;
mod store;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::service::{DeliveryService, ShippingRate};
use crate::scheduler::Job;
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let shared_state = Arc::new(state::AppState::new(config)?);
    seed_catalog(&shared_state.store);

    let app = api::rest::router(shared_state.clone());

    let sweep_state = shared_state.clone();
    shared_state.scheduler.schedule_repeating(
        Duration::from_secs(30),
        Box::new(move || {
            let state = sweep_state.clone();
            Box::pin(async move {
                engine::reservation::refresh_awaiting_driver_gauge(&state);
            }) as Job
        }),
    );

    let bind_addr = format!("0.0.0.0:{}", shared_state.config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Server(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = shared_state.config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Server(format!("server error: {err}")))?;

    Ok(())
}

// catalog and driver rows belong to the admin tier; seeded so a fresh
// process can take bookings
fn seed_catalog(store: &Store) {
    let standard = DeliveryService {
        id: Uuid::new_v4(),
        name: "standard".to_string(),
        description: Some("same-day delivery".to_string()),
        price: dec!(50),
    };
    let express = DeliveryService {
        id: Uuid::new_v4(),
        name: "express".to_string(),
        description: Some("priority handling and pickup".to_string()),
        price: dec!(80),
    };

    for (service_id, km_from, km_to, price_per_km) in [
        (standard.id, 0u32, 10u32, dec!(2)),
        (standard.id, 10, 20, dec!(3)),
        (express.id, 0, 10, dec!(3)),
        (express.id, 10, 20, dec!(5)),
    ] {
        store.insert_shipping_rate(ShippingRate {
            id: Uuid::new_v4(),
            service_id,
            km_from,
            km_to,
            price_per_km,
        });
    }

    tracing::info!(
        standard_id = %standard.id,
        express_id = %express.id,
        "seeded delivery service catalog"
    );
    store.insert_service(standard);
    store.insert_service(express);

    for name in ["Binh", "Chi"] {
        let driver = Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        tracing::info!(driver_id = %driver.id, name, "seeded driver");
        store.insert_driver(driver);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
