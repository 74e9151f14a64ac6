use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::AppError;
use crate::geo::{GeoDistance, Haversine};
use crate::models::reservation::ReservationEvent;
use crate::observability::metrics::Metrics;
use crate::payment::{HttpWalletGateway, PaymentGateway};
use crate::scheduler::{JobScheduler, TokioScheduler};
use crate::store::Store;

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub gateway: Arc<dyn PaymentGateway>,
    pub geo: Arc<dyn GeoDistance>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub reservation_events_tx: broadcast::Sender<ReservationEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let gateway = HttpWalletGateway::new(config.wallet.endpoint.clone())
            .map_err(|err| AppError::Server(format!("wallet gateway init failed: {err}")))?;

        Ok(Self::with_collaborators(
            config,
            Arc::new(gateway),
            Arc::new(Haversine),
            Arc::new(TokioScheduler),
        ))
    }

    pub fn with_collaborators(
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        geo: Arc<dyn GeoDistance>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        let (reservation_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            config,
            store: Store::new(),
            gateway,
            geo,
            scheduler,
            reservation_events_tx,
            metrics: Metrics::new(),
        }
    }
}
