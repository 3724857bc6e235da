use crate::models::geo::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

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

/// Planar distance on raw degrees. Only meaningful for comparing nearby points.
pub fn euclidean(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = b.lat - a.lat;
    let d_lng = b.lng - a.lng;
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}

/// Greedy nearest-neighbour tour starting at `stops[0]`; returns indices into
/// `stops` in visiting order. O(n²), deterministic (ties go to the lower
/// index), and not an optimal tour.
pub fn nearest_neighbor_order(stops: &[GeoPoint]) -> Vec<usize> {
    let Some(first) = stops.first() else {
        return Vec::new();
    };

    let mut order = Vec::with_capacity(stops.len());
    let mut visited = vec![false; stops.len()];
    let mut current = *first;
    order.push(0);
    visited[0] = true;

    while order.len() < stops.len() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, stop) in stops.iter().enumerate() {
            if visited[idx] {
                continue;
            }
            let distance = euclidean(&current, stop);
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((idx, distance));
            }
        }

        let Some((next, _)) = best else { break };
        visited[next] = true;
        order.push(next);
        current = stops[next];
    }

    order
}
