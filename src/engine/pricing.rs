use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::service::ShippingRate;
use crate::store::Store;

// the strict edge comparisons and the +1 are the published rate contract
pub fn band_charge(distance_km: Decimal, band: &ShippingRate) -> Decimal {
    let km_from = Decimal::from(band.km_from);
    let km_to = Decimal::from(band.km_to);

    if distance_km > km_to {
        (km_to - km_from) * band.price_per_km
    } else if km_from < distance_km && distance_km < km_to {
        (distance_km - km_from + Decimal::ONE) * band.price_per_km
    } else {
        Decimal::ZERO
    }
}

pub fn shipping_cost(distance_km: Decimal, bands: &[ShippingRate]) -> Decimal {
    bands
        .iter()
        .map(|band| band_charge(distance_km, band))
        .sum()
}

pub fn total_price(
    store: &Store,
    distance_km: Decimal,
    service_ids: &[Uuid],
) -> Result<Decimal, AppError> {
    let mut total = Decimal::ZERO;

    for service_id in service_ids {
        let service = store
            .service(*service_id)
            .ok_or_else(|| AppError::NotFound(format!("service {service_id} not found")))?;
        let bands = store.rates_for_service(*service_id);

        total += service.price + shipping_cost(distance_km, &bands);
    }

    Ok(total)
}
