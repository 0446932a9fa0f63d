//! Popup lifecycle coordination.
//!
//! At most one popup is visible at any instant. Playback-triggered opens
//! are suppressed while a popup is showing and auto-close after a fixed
//! duration; user-triggered opens are always forced - the current popup is
//! closed first, the requested one opens, and it stays up until the user
//! dismisses it or another forced open preempts it.
//!
//! Every `open` follows the same ordering: cancel the pending auto-close
//! timer, close the current surface, resolve content (URL + dimensions -
//! this may suspend), request the new surface, then wait for the one-shot
//! visibility confirmation. The showing flag flips and the auto-close
//! timer arms only once visibility is confirmed, and only for the open
//! generation that requested it: a confirmation arriving after a newer
//! open has taken over is a no-op.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::resolve::{DimensionProber, ResourceResolver, DEFAULT_DIMENSIONS};
use crate::route::Waypoint;
use crate::telemetry::TourMetrics;
use crate::tour::renderer::{PopupContent, TourRenderer};

/// Mutable popup state, guarded by one mutex.
#[derive(Debug, Default)]
struct PopupState {
    /// True between confirmed-visible and closed.
    showing: bool,
    /// Waypoint index of the current (or opening) popup.
    open_index: Option<usize>,
    /// Cancels the pending auto-close timer, if armed.
    autoclose: Option<CancellationToken>,
    /// Open generation; bumped by every open and close. A confirmation or
    /// timer belonging to an older generation is ignored.
    epoch: u64,
}

/// Owns the "at most one popup visible" invariant.
pub struct PopupCoordinator {
    renderer: Arc<dyn TourRenderer>,
    resolver: Arc<ResourceResolver>,
    prober: Arc<DimensionProber>,
    images_bucket: String,
    popup_duration: Duration,
    metrics: Arc<TourMetrics>,
    state: Arc<Mutex<PopupState>>,
}

impl PopupCoordinator {
    pub fn new(
        renderer: Arc<dyn TourRenderer>,
        resolver: Arc<ResourceResolver>,
        prober: Arc<DimensionProber>,
        images_bucket: impl Into<String>,
        popup_duration: Duration,
        metrics: Arc<TourMetrics>,
    ) -> Self {
        Self {
            renderer,
            resolver,
            prober,
            images_bucket: images_bucket.into(),
            popup_duration,
            metrics,
            state: Arc::new(Mutex::new(PopupState::default())),
        }
    }

    /// True between a popup's confirmed-visible transition and its close.
    pub fn is_showing(&self) -> bool {
        self.state.lock().showing
    }

    /// Waypoint index of the currently open popup, if any.
    pub fn open_index(&self) -> Option<usize> {
        let state = self.state.lock();
        if state.showing {
            state.open_index
        } else {
            None
        }
    }

    /// Open the popup for a waypoint.
    ///
    /// * `force` - close any current popup instead of being suppressed by it
    /// * `user_initiated` - user-triggered popups never auto-close
    ///
    /// Returns `true` when the popup became visible, `false` when the open
    /// was suppressed, superseded by a newer open, or never confirmed.
    /// A failed URL resolution is not an error: the popup opens
    /// caption-only.
    pub async fn open(&self, waypoint: &Waypoint, index: usize, force: bool, user_initiated: bool) -> bool {
        let (epoch, close_current) = {
            let mut state = self.state.lock();
            if !force && state.showing {
                self.metrics.popup_suppressed();
                debug!(index, "Popup open suppressed - surface occupied");
                return false;
            }

            // Cancel-then-open ordering: no two surfaces may ever overlap
            if let Some(token) = state.autoclose.take() {
                token.cancel();
            }
            let close_current = state.showing || state.open_index.is_some();
            state.showing = false;
            state.open_index = Some(index);
            state.epoch += 1;
            (state.epoch, close_current)
        };
        if close_current {
            self.renderer.close_surface();
        }

        // Content resolution - may suspend. A resolution failure degrades
        // to a caption-only popup; the tour keeps moving.
        let image_url = match self
            .resolver
            .resolve(&self.images_bucket, &waypoint.image_key)
            .await
        {
            Ok(resolved) => Some(resolved.url),
            Err(e) => {
                warn!(index, key = %waypoint.image_key, error = %e, "Popup image unavailable");
                None
            }
        };
        let dimensions = match &image_url {
            Some(url) => self.prober.probe(url).await,
            None => DEFAULT_DIMENSIONS,
        };

        // A newer open may have taken over while we resolved
        if self.state.lock().epoch != epoch {
            return false;
        }

        let content = PopupContent {
            index,
            key: waypoint.key.clone(),
            image_url,
            dimensions,
            caption: waypoint.display_date.clone(),
        };
        let visible = self.renderer.show_surface(content);

        match visible.await {
            Ok(()) => {}
            Err(_) => {
                // Renderer dropped the confirmation: surface never appeared
                let mut state = self.state.lock();
                if state.epoch == epoch {
                    state.open_index = None;
                }
                warn!(index, "Popup visibility was never confirmed");
                return false;
            }
        }

        // First confirmation wins; anything stale or repeated is a no-op
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return false;
            }
            if state.showing {
                return true;
            }
            state.showing = true;
            if !user_initiated {
                let token = CancellationToken::new();
                state.autoclose = Some(token.clone());
                self.spawn_autoclose(epoch, token);
            }
        }

        self.metrics.popup_opened();
        debug!(index, force, user_initiated, "Popup visible");
        true
    }

    /// Close the current popup, cancelling any pending auto-close timer.
    ///
    /// Always clears the showing flag, independent of caller.
    pub fn close(&self) {
        Self::close_state(&self.state, &self.renderer, None);
    }

    fn spawn_autoclose(&self, epoch: u64, token: CancellationToken) {
        let state = Arc::clone(&self.state);
        let renderer = Arc::clone(&self.renderer);
        let metrics = Arc::clone(&self.metrics);
        let duration = self.popup_duration;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    if Self::close_state(&state, &renderer, Some(epoch)) {
                        metrics.popup_autoclosed();
                    }
                }
            }
        });
    }

    /// Shared close path for `close()` and the auto-close timer.
    ///
    /// `expected_epoch` makes a timer close a no-op when a newer open has
    /// already taken over. Returns whether a popup was actually closed.
    fn close_state(
        state: &Mutex<PopupState>,
        renderer: &Arc<dyn TourRenderer>,
        expected_epoch: Option<u64>,
    ) -> bool {
        let closed = {
            let mut state = state.lock();
            if let Some(expected) = expected_epoch {
                if state.epoch != expected {
                    return false;
                }
            }
            if let Some(token) = state.autoclose.take() {
                token.cancel();
            }
            let was_showing = state.showing;
            state.showing = false;
            state.open_index = None;
            state.epoch += 1;
            was_showing
        };
        renderer.close_surface();
        closed
    }
}
