//! Tour playback state machine and transport controls.
//!
//! The player drives the marker along the route on a fixed tick, consults
//! the arrival detector on every position update, dwells at interior
//! waypoints, and hands popup work to the coordinator. The tour repeats
//! indefinitely: reaching the last waypoint force-opens its popup and
//! restarts the run with a fresh arrival cursor, without ever passing
//! through an externally-visible idle state.
//!
//! # Transport
//!
//! ```text
//! Idle --play()--> Playing <--resume()-- Paused
//!                  Playing --pause()--> Paused
//!                  Playing --(end of route)--> Playing (restart)
//! ```
//!
//! Pausing freezes motion in place; popup timers and in-flight resolutions
//! keep running. Calling `play()` again disposes the previous driver task
//! and its timers before starting a new run, so at most one driver ever
//! animates the shared route.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::geo::interpolate;
use crate::route::Route;
use crate::telemetry::TourMetrics;
use crate::tour::arrival::ArrivalDetector;
use crate::tour::durations::allocate_leg_durations;
use crate::tour::popup::PopupCoordinator;
use crate::tour::renderer::TourRenderer;
use crate::tour::{
    DEFAULT_ARRIVAL_THRESHOLD_M, DEFAULT_BASE_LEG_DURATION, DEFAULT_STATION_DWELL,
    DEFAULT_TICK_INTERVAL,
};

/// Externally visible transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Idle,
    Playing,
    Paused,
}

/// Playback timing knobs, split from [`crate::config::TourConfig`] so the
/// player can be driven with scaled-down values in tests.
#[derive(Debug, Clone)]
pub struct PlayerTiming {
    pub base_leg_duration: Duration,
    pub station_dwell: Duration,
    pub tick_interval: Duration,
    pub arrival_threshold_m: f64,
}

impl Default for PlayerTiming {
    fn default() -> Self {
        Self {
            base_leg_duration: DEFAULT_BASE_LEG_DURATION,
            station_dwell: DEFAULT_STATION_DWELL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
        }
    }
}

struct PlayerInner {
    status: Transport,
    /// Cancels the current driver task and everything it spawned.
    driver: Option<CancellationToken>,
    /// Freeze switch observed by the driver between ticks.
    paused_tx: watch::Sender<bool>,
}

/// Drives tour playback over a route.
pub struct TourPlayer {
    route: Arc<Route>,
    renderer: Arc<dyn TourRenderer>,
    popups: Arc<PopupCoordinator>,
    timing: PlayerTiming,
    metrics: Arc<TourMetrics>,
    inner: Mutex<PlayerInner>,
}

impl TourPlayer {
    pub fn new(
        route: Arc<Route>,
        renderer: Arc<dyn TourRenderer>,
        popups: Arc<PopupCoordinator>,
        timing: PlayerTiming,
        metrics: Arc<TourMetrics>,
    ) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            route,
            renderer,
            popups,
            timing,
            metrics,
            inner: Mutex::new(PlayerInner {
                status: Transport::Idle,
                driver: None,
                paused_tx,
            }),
        }
    }

    /// Start the tour from the beginning.
    ///
    /// Disposes any previous run's driver and timers first. An empty route
    /// is a no-op: the player stays idle.
    pub fn play(&self) {
        if self.route.is_empty() {
            debug!("Empty route - tour not started");
            return;
        }

        let (cancel, paused_rx) = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.driver.take() {
                previous.cancel();
            }
            let (paused_tx, paused_rx) = watch::channel(false);
            inner.paused_tx = paused_tx;
            inner.status = Transport::Playing;

            let cancel = CancellationToken::new();
            inner.driver = Some(cancel.clone());
            (cancel, paused_rx)
        };

        info!(waypoints = self.route.len(), "Tour starting");
        let driver = Driver {
            route: Arc::clone(&self.route),
            renderer: Arc::clone(&self.renderer),
            popups: Arc::clone(&self.popups),
            timing: self.timing.clone(),
            metrics: Arc::clone(&self.metrics),
            paused: paused_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(async move {
            driver.run().await;
        });
    }

    /// Freeze motion at the current position.
    ///
    /// In-flight popups and timers are left untouched.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.status == Transport::Playing {
            inner.status = Transport::Paused;
            let _ = inner.paused_tx.send(true);
            debug!("Tour paused");
        }
    }

    /// Continue motion from the frozen point.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.status == Transport::Paused {
            inner.status = Transport::Playing;
            let _ = inner.paused_tx.send(false);
            debug!("Tour resumed");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().status == Transport::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().status == Transport::Paused
    }

    /// Force-show the popup for a waypoint, bypassing suppression.
    ///
    /// This is the manual-exploration entry point: the popup stays open
    /// until dismissed or preempted.
    pub async fn show_waypoint(&self, index: usize) -> bool {
        match self.route.get(index) {
            Some(waypoint) => self.popups.open(waypoint, index, true, true).await,
            None => false,
        }
    }

    /// Close the popup surface, if open.
    pub fn dismiss_popup(&self) {
        self.popups.close();
    }
}

impl Drop for TourPlayer {
    fn drop(&mut self) {
        if let Some(driver) = self.inner.lock().driver.take() {
            driver.cancel();
        }
    }
}

/// The spawned animation driver for one `play()` call.
///
/// Owns its arrival detector; a restart resets the cursor and runs the
/// route again until the token is cancelled.
struct Driver {
    route: Arc<Route>,
    renderer: Arc<dyn TourRenderer>,
    popups: Arc<PopupCoordinator>,
    timing: PlayerTiming,
    metrics: Arc<TourMetrics>,
    paused: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut detector = ArrivalDetector::with_threshold(self.timing.arrival_threshold_m);

        loop {
            detector.reset();
            if self.run_once(&mut detector).await.is_err() {
                return;
            }
            if self.route.len() < 2 {
                // Nothing to animate; show the single photo and stop the
                // driver (transport still reports playing by design)
                return;
            }
            self.metrics.tour_completed();
            info!("Tour complete - restarting");
        }
    }

    /// One full pass over the route. `Err(())` means the driver was
    /// cancelled mid-run.
    async fn run_once(&mut self, detector: &mut ArrivalDetector) -> Result<(), ()> {
        let start = match self.route.get(0) {
            Some(waypoint) => waypoint,
            None => return Err(()),
        };
        self.renderer.place_marker(start.coords);

        // The first popup opens forced, concurrently with motion start
        self.spawn_popup_open(0, true);

        let coords = self.route.coords();
        let durations = allocate_leg_durations(&coords, self.timing.base_leg_duration);
        let last_index = match self.route.last_index() {
            Some(last) => last,
            None => return Err(()),
        };

        for (leg, duration) in durations.iter().enumerate() {
            self.animate_leg(coords[leg], coords[leg + 1], *duration, detector)
                .await?;

            let reached = leg + 1;
            if reached != last_index {
                // Station dwell at interior waypoints - independent of the
                // popup's own auto-close timer
                debug!(waypoint = reached, "Station dwell");
                self.interruptible_sleep(self.timing.station_dwell).await?;
            }
        }

        // Ended: the last waypoint's popup opens forced even if arrival
        // detection was suppressed at the final tick
        if last_index > 0 && detector.last_arrived() != Some(last_index) {
            self.spawn_popup_open(last_index, true);
        }

        Ok(())
    }

    /// Animate one leg with fixed-interval ticks, checking arrival on
    /// every position update.
    async fn animate_leg(
        &mut self,
        from: crate::geo::GeoPoint,
        to: crate::geo::GeoPoint,
        duration: Duration,
        detector: &mut ArrivalDetector,
    ) -> Result<(), ()> {
        let tick = self.timing.tick_interval;
        let steps = (duration.as_secs_f64() / tick.as_secs_f64()).ceil().max(1.0) as u32;

        for step in 1..=steps {
            self.interruptible_sleep(duration / steps).await?;

            let t = f64::from(step) / f64::from(steps);
            let position = interpolate(from, to, t);
            self.renderer.move_marker(position);

            if let Some(index) =
                detector.check_arrival(position, &self.route, self.popups.is_showing())
            {
                self.metrics.arrival();
                debug!(waypoint = index, "Arrived");
                let last = self.route.last_index() == Some(index);
                // First and last waypoints open forced; interior arrivals
                // are suppressible playback popups
                self.spawn_popup_open(index, index == 0 || last);
            }
        }
        Ok(())
    }

    /// Sleep that honors both the pause switch and cancellation.
    ///
    /// The pause gate runs before the interval, so a pause takes effect at
    /// the next tick boundary and the tour clock stops with it.
    async fn interruptible_sleep(&mut self, duration: Duration) -> Result<(), ()> {
        // Wait out a pause first, then sleep the actual interval
        loop {
            if self.cancel.is_cancelled() {
                return Err(());
            }
            let paused = *self.paused.borrow();
            if !paused {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(()),
                result = self.paused.changed() => {
                    if result.is_err() {
                        return Err(());
                    }
                }
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(()),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn spawn_popup_open(&self, index: usize, force: bool) {
        let Some(waypoint) = self.route.get(index).cloned() else {
            return;
        };
        let popups = Arc::clone(&self.popups);
        tokio::spawn(async move {
            popups.open(&waypoint, index, force, false).await;
        });
    }
}
