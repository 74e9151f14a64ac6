use async_trait::async_trait;
use thiserror::Error;

use crate::models::reservation::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Error)]
#[error("geo distance lookup failed: {0}")]
pub struct GeoError(pub String);

#[async_trait]
pub trait GeoDistance: Send + Sync {
    async fn distance_meters(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, GeoError>;
}

pub struct Haversine;

#[async_trait]
impl GeoDistance for Haversine {
    async fn distance_meters(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, GeoError> {
        Ok(haversine_km(&from, &to) * 1_000.0)
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, GeoDistance, Haversine};
    use crate::models::reservation::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 10.7769,
            lng: 106.7009,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn saigon_to_hanoi_is_around_1140_km() {
        let saigon = GeoPoint {
            lat: 10.7769,
            lng: 106.7009,
        };
        let hanoi = GeoPoint {
            lat: 21.0278,
            lng: 105.8342,
        };
        let distance = haversine_km(&saigon, &hanoi);
        assert!((distance - 1_140.0).abs() < 10.0);
    }

    #[tokio::test]
    async fn provider_reports_meters() {
        let saigon = GeoPoint {
            lat: 10.7769,
            lng: 106.7009,
        };
        let hanoi = GeoPoint {
            lat: 21.0278,
            lng: 105.8342,
        };
        let meters = Haversine.distance_meters(saigon, hanoi).await.unwrap();
        assert!((meters / 1_000.0 - haversine_km(&saigon, &hanoi)).abs() < 1e-9);
    }
}
