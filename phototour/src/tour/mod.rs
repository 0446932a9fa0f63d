//! Tour playback: leg timing, arrival detection, popups, transport.
//!
//! The tour animates a marker along the route, dwelling at each waypoint to
//! show its photo. [`player::TourPlayer`] owns the animation driver and the
//! play/pause/resume transport; it consults [`arrival::ArrivalDetector`] on
//! every position update and hands detected arrivals to
//! [`popup::PopupCoordinator`], which enforces the "at most one popup
//! visible" invariant. Leg durations come from [`durations`], scaled so the
//! marker moves at visually constant speed.

pub mod arrival;
pub mod durations;
pub mod player;
pub mod popup;
pub mod renderer;

pub use arrival::ArrivalDetector;
pub use durations::allocate_leg_durations;
pub use player::{PlayerTiming, TourPlayer, Transport};
pub use popup::PopupCoordinator;
pub use renderer::{PopupContent, TourRenderer, VisibilityRx};

use std::time::Duration;

/// Pause at each interior waypoint before the next leg departs.
pub const DEFAULT_STATION_DWELL: Duration = Duration::from_millis(1500);

/// Auto-close delay for playback-triggered popups.
pub const DEFAULT_POPUP_DURATION: Duration = Duration::from_millis(1400);

/// Nominal per-leg animation time before distance-proportional scaling.
pub const DEFAULT_BASE_LEG_DURATION: Duration = Duration::from_millis(1000);

/// Proximity to the next waypoint that counts as an arrival, in meters.
pub const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 500.0;

/// Interval between animated marker position updates.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
