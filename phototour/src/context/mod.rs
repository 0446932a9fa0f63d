//! Tour context: the owning object for all shared tour state.
//!
//! The route, the resolved-URL cache, the dimension cache, and the cluster
//! icon cache are shared by everything in the engine. Instead of process
//! globals they live in one explicit `TourContext`, created at tour
//! initialization, reset on route reload, and torn down by dropping it.

use std::sync::Arc;

use tracing::info;

use crate::cluster::ClusterIconCache;
use crate::config::TourConfig;
use crate::resolve::{DimensionProber, ImageFetcher, ResourceResolver, UrlSource};
use crate::route::Route;
use crate::telemetry::TourMetrics;
use crate::tour::player::{PlayerTiming, TourPlayer};
use crate::tour::popup::PopupCoordinator;
use crate::tour::renderer::TourRenderer;

/// Owns the route and every process-wide cache of the tour engine.
pub struct TourContext {
    config: TourConfig,
    route: Arc<Route>,
    resolver: Arc<ResourceResolver>,
    prober: Arc<DimensionProber>,
    icons: Arc<ClusterIconCache>,
    metrics: Arc<TourMetrics>,
}

impl TourContext {
    /// Assemble a context from its collaborators.
    pub fn new(
        config: TourConfig,
        route: Route,
        source: Arc<dyn UrlSource>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let resolver = Arc::new(ResourceResolver::with_ttl(source, config.url_ttl));
        info!(
            waypoints = route.len(),
            ttl_secs = config.url_ttl.as_secs(),
            "Tour context initialized"
        );
        Self {
            config,
            route: Arc::new(route),
            resolver,
            prober: Arc::new(DimensionProber::new(fetcher)),
            icons: Arc::new(ClusterIconCache::new()),
            metrics: Arc::new(TourMetrics::new()),
        }
    }

    pub fn config(&self) -> &TourConfig {
        &self.config
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn resolver(&self) -> &Arc<ResourceResolver> {
        &self.resolver
    }

    pub fn prober(&self) -> &Arc<DimensionProber> {
        &self.prober
    }

    pub fn icons(&self) -> &Arc<ClusterIconCache> {
        &self.icons
    }

    pub fn metrics(&self) -> &Arc<TourMetrics> {
        &self.metrics
    }

    /// Replace the route.
    ///
    /// Cluster icons key off route composition and are dropped; resolved
    /// URLs and dimensions key off storage identity and stay valid. Any
    /// running player must be rebuilt against the new route.
    pub fn reload_route(&mut self, route: Route) {
        info!(waypoints = route.len(), "Route reloaded");
        self.icons.clear();
        self.route = Arc::new(route);
    }

    /// Build a player for this context wired to the given renderer.
    ///
    /// At most one player should drive the route at a time; building a new
    /// one and calling `play()` disposes nothing here - the old player's
    /// own `play()`/`Drop` handles its driver teardown.
    pub fn build_player(&self, renderer: Arc<dyn TourRenderer>) -> TourPlayer {
        let popups = Arc::new(PopupCoordinator::new(
            Arc::clone(&renderer),
            Arc::clone(&self.resolver),
            Arc::clone(&self.prober),
            self.config.images_bucket.clone(),
            self.config.popup_duration,
            Arc::clone(&self.metrics),
        ));
        let timing = PlayerTiming {
            base_leg_duration: self.config.base_leg_duration,
            station_dwell: self.config.station_dwell,
            tick_interval: self.config.tick_interval,
            arrival_threshold_m: self.config.arrival_threshold_m,
        };
        TourPlayer::new(
            Arc::clone(&self.route),
            renderer,
            popups,
            timing,
            Arc::clone(&self.metrics),
        )
    }
}
