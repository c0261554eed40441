//! Circuits of the headless maps.
use pitlane_core::base::SpawnPoint;
use std::f64::consts::PI;

/// `n` spawn points evenly spaced on a counterclockwise circle of `radius`
/// meters centered at the origin.
///
/// The yaw of every point is tangent to the circle in the driving direction.
pub fn circuit(n: usize, radius: f64, z: f64) -> Vec<SpawnPoint> {
    (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            let yaw = (theta.to_degrees() + 90.0) % 360.0;
            SpawnPoint::new(radius * theta.cos(), radius * theta.sin(), z, yaw)
        })
        .collect()
}

/// Points of `circuit` in the reverse driving direction.
pub fn inverted(points: &[SpawnPoint]) -> Vec<SpawnPoint> {
    points
        .iter()
        .rev()
        .map(|p| SpawnPoint::new(p.x, p.y, p.z, (p.yaw + 180.0) % 360.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_is_evenly_spaced() {
        let points = circuit(400, 300.0, 0.5);
        assert_eq!(points.len(), 400);
        assert!((points[0].x - 300.0).abs() < 1e-9);
        assert!((points[0].yaw - 90.0).abs() < 1e-9);
        let d0 = points[0].location().distance(&points[1].location());
        let d1 = points[200].location().distance(&points[201].location());
        assert!((d0 - d1).abs() < 1e-9);
        assert!(d0 > 4.0);
    }

    #[test]
    fn inverted_reverses_direction() {
        let points = circuit(4, 10.0, 0.0);
        let inv = inverted(&points);
        assert_eq!(inv[0].location(), points[3].location());
        assert!((inv[0].yaw - (points[3].yaw + 180.0) % 360.0).abs() < 1e-9);
    }
}
