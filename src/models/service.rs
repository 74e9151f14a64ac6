use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryService {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingRate {
    pub id: Uuid,
    pub service_id: Uuid,
    pub km_from: u32,
    pub km_to: u32,
    pub price_per_km: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub service_id: Uuid,
}
