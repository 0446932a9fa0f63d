//! Distance-proportional leg durations.
//!
//! The tour's total duration is fixed at `base_per_leg * leg_count`;
//! individual legs get a share proportional to their great-circle length,
//! so the marker appears to move at constant speed instead of spending the
//! same time on a 50 m hop as on a 5 km leg.

use std::time::Duration;

use crate::geo::{haversine_distance, GeoPoint};

/// Allocate animation durations for the legs of a coordinate sequence.
///
/// # Arguments
///
/// * `coords` - Ordered points; N points produce N-1 legs
/// * `base_per_leg` - Nominal per-leg duration; the total tour time is
///   `base_per_leg * (N-1)` regardless of geometry
///
/// # Returns
///
/// One duration per leg. Fewer than two points produce an empty result.
/// When every point coincides (zero total distance) the total is split
/// equally instead of dividing by zero.
pub fn allocate_leg_durations(coords: &[GeoPoint], base_per_leg: Duration) -> Vec<Duration> {
    if coords.len() < 2 {
        return Vec::new();
    }

    let leg_count = coords.len() - 1;
    let distances: Vec<f64> = coords
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .collect();

    let total_distance: f64 = distances.iter().sum();
    let total_duration = base_per_leg.as_secs_f64() * leg_count as f64;

    if total_distance <= 0.0 {
        // All points coincident: equal split
        return vec![base_per_leg; leg_count];
    }

    distances
        .iter()
        .map(|d| Duration::from_secs_f64(d / total_distance * total_duration))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    const BASE: Duration = Duration::from_millis(1000);

    #[test]
    fn test_fewer_than_two_points_is_empty() {
        assert!(allocate_leg_durations(&[], BASE).is_empty());
        assert!(allocate_leg_durations(&[point(0.0, 0.0)], BASE).is_empty());
    }

    #[test]
    fn test_leg_count() {
        let coords = vec![point(0.0, 0.0), point(0.0, 1.0), point(0.0, 2.0)];
        assert_eq!(allocate_leg_durations(&coords, BASE).len(), 2);
    }

    #[test]
    fn test_total_duration_is_conserved() {
        let coords = vec![
            point(53.55, 10.00),
            point(53.60, 10.02),
            point(53.80, 10.50),
            point(53.81, 10.51),
        ];
        let durations = allocate_leg_durations(&coords, BASE);
        let total: f64 = durations.iter().map(Duration::as_secs_f64).sum();
        assert!(
            (total - 3.0).abs() < 1e-6,
            "3 legs at 1000ms must total 3s, got {:.6}s",
            total
        );
    }

    #[test]
    fn test_equal_distance_legs_get_equal_durations() {
        // Equator points at equal longitude spacing
        let coords = vec![
            point(0.0, 0.0),
            point(0.0, 0.01),
            point(0.0, 0.02),
            point(0.0, 0.03),
        ];
        let durations = allocate_leg_durations(&coords, BASE);
        for d in &durations {
            assert!(
                (d.as_secs_f64() - 1.0).abs() < 1e-6,
                "equal legs must split equally, got {:?}",
                durations
            );
        }
    }

    #[test]
    fn test_longer_leg_gets_proportionally_more_time() {
        // Second leg is twice as long as the first
        let coords = vec![point(0.0, 0.0), point(0.0, 0.01), point(0.0, 0.03)];
        let durations = allocate_leg_durations(&coords, BASE);
        let ratio = durations[1].as_secs_f64() / durations[0].as_secs_f64();
        assert!(
            (ratio - 2.0).abs() < 1e-3,
            "expected 2x duration ratio, got {:.4}",
            ratio
        );
    }

    #[test]
    fn test_coincident_points_split_equally() {
        let p = point(53.5511, 9.9937);
        let coords = vec![p, p, p, p];
        let durations = allocate_leg_durations(&coords, BASE);
        assert_eq!(durations, vec![BASE, BASE, BASE]);
    }

    #[test]
    fn test_zero_length_leg_gets_zero_duration() {
        let a = point(0.0, 0.0);
        let b = point(0.0, 0.01);
        let durations = allocate_leg_durations(&[a, a, b], BASE);
        assert_eq!(durations[0], Duration::ZERO);
        assert!((durations[1].as_secs_f64() - 2.0).abs() < 1e-6);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn coord_seq() -> impl Strategy<Value = Vec<GeoPoint>> {
            prop::collection::vec((-80.0..80.0_f64, -170.0..170.0_f64), 2..12)
                .prop_map(|pairs| pairs.into_iter().map(|(lat, lon)| point(lat, lon)).collect())
        }

        proptest! {
            #[test]
            fn test_duration_conservation(coords in coord_seq(), base_ms in 1u64..5000) {
                let base = Duration::from_millis(base_ms);
                let durations = allocate_leg_durations(&coords, base);
                prop_assert_eq!(durations.len(), coords.len() - 1);

                let total: f64 = durations.iter().map(Duration::as_secs_f64).sum();
                let expected = base.as_secs_f64() * (coords.len() - 1) as f64;
                prop_assert!(
                    (total - expected).abs() < expected * 1e-9 + 1e-9,
                    "total {} != expected {}", total, expected
                );
            }

            #[test]
            fn test_no_negative_durations(coords in coord_seq()) {
                // Durations are unsigned by type; this guards the math from
                // producing NaN via Duration::from_secs_f64 panics instead
                let durations = allocate_leg_durations(&coords, BASE);
                for d in durations {
                    prop_assert!(d.as_secs_f64().is_finite());
                }
            }
        }
    }
}
