//! Cluster icon memoization.
//!
//! Manual exploration groups nearby markers into clusters. Rendering a
//! cluster badge is cheap but not free, and map panning re-derives the
//! same clusters over and over, so rendered badges are memoized by
//! cluster composition: member count plus a stable sample of member
//! identities. Two clusters with the same composition share one render.
//! The cache is cleared whenever the underlying route changes.

use std::sync::Arc;

use moka::sync::Cache;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::debug;

/// How many member identities participate in the cache key.
const KEY_SAMPLE_LEN: usize = 3;

/// Upper bound on distinct cluster compositions kept alive.
const MAX_CACHED_ICONS: u64 = 1024;

/// Identity of a cluster composition.
///
/// Two clusters map to the same key exactly when they have the same member
/// count and the same first three member thumbnail keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    member_count: usize,
    sample: Vec<String>,
}

impl ClusterKey {
    /// Build a key from the cluster's member thumbnail keys, in cluster
    /// order. Only the first [`KEY_SAMPLE_LEN`] members are sampled.
    pub fn new(member_count: usize, member_thumb_keys: &[String]) -> Self {
        Self {
            member_count,
            sample: member_thumb_keys
                .iter()
                .take(KEY_SAMPLE_LEN)
                .cloned()
                .collect(),
        }
    }
}

/// A rendered cluster badge.
#[derive(Debug, Clone)]
pub struct ClusterIcon {
    /// Encoded PNG of the badge.
    pub png: Arc<Vec<u8>>,
    /// Badge edge length in pixels (badges are square).
    pub size_px: u32,
    /// Member count, for the text overlay drawn by the UI layer.
    pub member_count: usize,
}

/// Memoizes rendered cluster badges by composition.
pub struct ClusterIconCache {
    icons: Cache<ClusterKey, ClusterIcon>,
}

impl Default for ClusterIconCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterIconCache {
    pub fn new() -> Self {
        Self {
            icons: Cache::builder().max_capacity(MAX_CACHED_ICONS).build(),
        }
    }

    /// Look up a cached badge.
    pub fn get(&self, key: &ClusterKey) -> Option<ClusterIcon> {
        self.icons.get(key)
    }

    /// Store a rendered badge.
    pub fn put(&self, key: ClusterKey, icon: ClusterIcon) {
        self.icons.insert(key, icon);
    }

    /// Get the badge for a composition, rendering it on first sight.
    pub fn icon_for(&self, member_count: usize, member_thumb_keys: &[String]) -> ClusterIcon {
        let key = ClusterKey::new(member_count, member_thumb_keys);
        if let Some(icon) = self.icons.get(&key) {
            return icon;
        }
        debug!(member_count, "Rendering cluster badge");
        let icon = render_badge(member_count);
        self.icons.insert(key, icon.clone());
        icon
    }

    /// Drop every cached badge. Called on route reload.
    pub fn clear(&self) {
        self.icons.invalidate_all();
    }

    /// Number of cached badges (post-maintenance estimate).
    pub fn entry_count(&self) -> u64 {
        self.icons.run_pending_tasks();
        self.icons.entry_count()
    }
}

/// Badge size bucket for a member count.
fn badge_size(member_count: usize) -> u32 {
    match member_count {
        0..=9 => 30,
        10..=99 => 36,
        _ => 44,
    }
}

/// Badge fill color per size bucket, as RGB.
fn badge_rgb(member_count: usize) -> (u8, u8, u8) {
    match member_count {
        0..=9 => (110, 204, 57),
        10..=99 => (240, 194, 12),
        _ => (241, 128, 23),
    }
}

/// Render a cluster badge: a translucent halo ring around a solid disc.
///
/// The count itself is overlaid as text by the UI layer; the engine only
/// produces the raster.
pub fn render_badge(member_count: usize) -> ClusterIcon {
    let size = badge_size(member_count);
    let center = size as f32 / 2.0;

    // Pixmap::new only fails on zero dimensions, which badge_size never
    // produces
    let mut pixmap = Pixmap::new(size, size).expect("badge dimensions are nonzero");

    let (r, g, b) = badge_rgb(member_count);

    let mut halo = Paint::default();
    halo.set_color(Color::from_rgba8(r, g, b, 153));
    halo.anti_alias = true;

    let mut disc = Paint::default();
    disc.set_color(Color::from_rgba8(r, g, b, 255));
    disc.anti_alias = true;

    if let Some(path) = PathBuilder::from_circle(center, center, center) {
        pixmap.fill_path(&path, &halo, FillRule::Winding, Transform::identity(), None);
    }
    if let Some(path) = PathBuilder::from_circle(center, center, center - 5.0) {
        pixmap.fill_path(&path, &disc, FillRule::Winding, Transform::identity(), None);
    }

    let png = pixmap.encode_png().unwrap_or_default();
    ClusterIcon {
        png: Arc::new(png),
        size_px: size,
        member_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb_keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_same_composition_same_key() {
        let a = ClusterKey::new(5, &thumb_keys(&["a", "b", "c", "d", "e"]));
        let b = ClusterKey::new(5, &thumb_keys(&["a", "b", "c", "x", "y"]));
        // Only the first three members participate
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_count_different_key() {
        let a = ClusterKey::new(5, &thumb_keys(&["a", "b", "c"]));
        let b = ClusterKey::new(6, &thumb_keys(&["a", "b", "c"]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_sample_different_key() {
        let a = ClusterKey::new(5, &thumb_keys(&["a", "b", "c"]));
        let b = ClusterKey::new(5, &thumb_keys(&["a", "b", "z"]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_icon_for_memoizes() {
        let cache = ClusterIconCache::new();
        let keys = thumb_keys(&["a", "b", "c"]);

        let first = cache.icon_for(3, &keys);
        let second = cache.icon_for(3, &keys);

        // Same composition shares the same rendered bytes
        assert!(Arc::ptr_eq(&first.png, &second.png));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_clear_drops_icons() {
        let cache = ClusterIconCache::new();
        let keys = thumb_keys(&["a", "b", "c"]);
        let before = cache.icon_for(3, &keys);

        cache.clear();
        assert_eq!(cache.entry_count(), 0);

        let after = cache.icon_for(3, &keys);
        assert!(
            !Arc::ptr_eq(&before.png, &after.png),
            "cleared cache must re-render"
        );
    }

    #[test]
    fn test_get_and_put_roundtrip() {
        let cache = ClusterIconCache::new();
        let key = ClusterKey::new(12, &thumb_keys(&["a"]));
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), render_badge(12));
        let icon = cache.get(&key).unwrap();
        assert_eq!(icon.member_count, 12);
    }

    #[test]
    fn test_badge_sizes_bucket_by_count() {
        assert_eq!(render_badge(3).size_px, 30);
        assert_eq!(render_badge(42).size_px, 36);
        assert_eq!(render_badge(250).size_px, 44);
    }

    #[test]
    fn test_badge_png_is_nonempty_and_decodable() {
        let icon = render_badge(7);
        assert!(!icon.png.is_empty());
        let decoded = image::load_from_memory(&icon.png).unwrap();
        assert_eq!(decoded.width(), 30);
        assert_eq!(decoded.height(), 30);
    }
}
