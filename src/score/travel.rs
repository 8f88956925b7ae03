//! Great-circle distance and a coarse three-tier travel-time heuristic.
//!
//! The tiers map distance to a mode guess (walk / transit / vehicle) with a
//! flat transfer penalty; this is explicitly not a routing-engine result.

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance in kilometers between two lat/lon pairs (degrees).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = phi2 - phi1;
    let dlmb = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlmb / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Estimate door-to-door travel minutes from a distance.
///
/// <= 1.5 km: walking at 4.5 km/h, no penalty.
/// <= 10 km: transit at 18 km/h plus a 10-minute transfer penalty.
/// beyond:   vehicle at 30 km/h plus an 8-minute penalty.
pub fn estimate_travel_min(distance_km: f64) -> i64 {
    let (speed_kmh, penalty): (f64, f64) = if distance_km <= 1.5 {
        (4.5, 0.0)
    } else if distance_km <= 10.0 {
        (18.0, 10.0)
    } else {
        (30.0, 8.0)
    };
    let minutes = (distance_km / speed_kmh.max(1e-6)) * 60.0 + penalty;
    minutes.round() as i64
}
