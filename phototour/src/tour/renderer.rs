//! Rendering adapter interface.
//!
//! The engine never touches a map directly. A [`TourRenderer`] places and
//! moves the tour marker and shows/closes the photo surface; the host
//! (web view, native map widget, or the CLI's logging renderer) implements
//! it. Surface visibility is confirmed through a one-shot channel per
//! `show_surface` call - a single subscription, created fresh on every
//! open, so stale confirmations from an earlier surface can never be
//! mistaken for the current one.

use tokio::sync::oneshot;

use crate::geo::GeoPoint;
use crate::resolve::PixelDimensions;

/// Receives the one-shot "surface is visible" confirmation.
///
/// The renderer keeps the sending half and fires it when the surface
/// actually appears; dropping the sender without firing tells the engine
/// the surface never became visible.
pub type VisibilityRx = oneshot::Receiver<()>;

/// Everything the popup needs to render, resolved ahead of display.
#[derive(Debug, Clone)]
pub struct PopupContent {
    /// Waypoint index this popup belongs to.
    pub index: usize,
    /// Waypoint identity (storage filename stem).
    pub key: String,
    /// Resolved image URL; `None` when resolution failed and the popup
    /// shows caption-only.
    pub image_url: Option<String>,
    /// Image dimensions for layout (defaults when probing failed).
    pub dimensions: PixelDimensions,
    /// Caption line (capture date).
    pub caption: String,
}

/// Thin rendering adapter implemented by the host.
///
/// All methods are synchronous fire-and-forget from the engine's point of
/// view; the only asynchronous hand-back is the visibility channel
/// returned by [`show_surface`](TourRenderer::show_surface).
pub trait TourRenderer: Send + Sync {
    /// Place the tour marker (initial position, no animation).
    fn place_marker(&self, at: GeoPoint);

    /// Move the marker to an interpolated position along the current leg.
    fn move_marker(&self, at: GeoPoint);

    /// Request the photo surface for a waypoint. Returns the channel on
    /// which visibility will be confirmed.
    fn show_surface(&self, content: PopupContent) -> VisibilityRx;

    /// Close the photo surface if one is open. Must be idempotent.
    fn close_surface(&self);
}
