//! Waypoint arrival detection.
//!
//! Called on every animated position update. Detection is a one-shot,
//! strictly-sequential scan: only the single next unvisited waypoint is
//! ever checked, so an already-visited waypoint can never re-trigger and a
//! waypoint skipped by a large position jump is silently never detected.
//! That is deliberate - the cursor advances by exactly one per arrival and
//! the route order is authoritative.

use crate::geo::{haversine_distance, GeoPoint};
use crate::route::Route;
use crate::tour::DEFAULT_ARRIVAL_THRESHOLD_M;

/// Detects arrival at the next unvisited waypoint.
#[derive(Debug)]
pub struct ArrivalDetector {
    /// Index of the last waypoint detected; `None` before the first.
    last_arrived: Option<usize>,
    /// Proximity that counts as arrived, in meters.
    threshold_m: f64,
}

impl Default for ArrivalDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrivalDetector {
    /// Create a detector with the default 500 m threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_ARRIVAL_THRESHOLD_M)
    }

    /// Create a detector with a custom threshold.
    pub fn with_threshold(threshold_m: f64) -> Self {
        Self {
            last_arrived: None,
            threshold_m,
        }
    }

    /// Check whether the current position has arrived at the next waypoint.
    ///
    /// Returns the arrived index and advances the cursor, or `None` when:
    /// - a popup is currently showing (`popup_showing`) - arrivals are
    ///   suppressed while the surface is occupied,
    /// - the whole route has already been visited,
    /// - the next waypoint is farther away than the threshold.
    ///
    /// The returned index is strictly greater than any index previously
    /// returned by this detector instance.
    pub fn check_arrival(
        &mut self,
        position: GeoPoint,
        route: &Route,
        popup_showing: bool,
    ) -> Option<usize> {
        if popup_showing {
            return None;
        }

        let next_index = self.last_arrived.map_or(0, |i| i + 1);
        let waypoint = route.get(next_index)?;

        if haversine_distance(position, waypoint.coords) <= self.threshold_m {
            self.last_arrived = Some(next_index);
            Some(next_index)
        } else {
            None
        }
    }

    /// The last arrived index, if any.
    pub fn last_arrived(&self) -> Option<usize> {
        self.last_arrived
    }

    /// Reset the cursor for a tour restart.
    pub fn reset(&mut self) {
        self.last_arrived = None;
    }
}
