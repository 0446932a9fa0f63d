//! Logging renderer for headless playback.
//!
//! Implements the engine's rendering adapter by emitting tracing events
//! instead of drawing: marker motion at trace level (it ticks constantly),
//! surface transitions at info. Visibility is confirmed immediately -
//! there is no asynchronous surface in a terminal.

use tokio::sync::oneshot;
use tracing::{info, trace};

use phototour::geo::GeoPoint;
use phototour::tour::renderer::{PopupContent, TourRenderer, VisibilityRx};

/// Renderer that narrates the tour to the log.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl TourRenderer for LogRenderer {
    fn place_marker(&self, at: GeoPoint) {
        info!(position = %at, "Marker placed");
    }

    fn move_marker(&self, at: GeoPoint) {
        trace!(position = %at, "Marker moved");
    }

    fn show_surface(&self, content: PopupContent) -> VisibilityRx {
        info!(
            waypoint = content.index,
            key = %content.key,
            caption = %content.caption,
            image = content.image_url.as_deref().unwrap_or("<unavailable>"),
            width = content.dimensions.width,
            height = content.dimensions.height,
            "Photo shown"
        );
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }

    fn close_surface(&self) {
        info!("Photo closed");
    }
}
