//! Route model and loading.
//!
//! A route is the ordered sequence of photo waypoints the tour animates
//! through. It is loaded from the `image_data.json` file produced by the
//! export pipeline, filtered to entries with a usable GPS fix, and sorted
//! ascending by capture timestamp **once, at load time**. The resulting
//! order defines leg order and arrival sequencing and is never changed
//! afterward.

mod key;

pub use key::{parse_storage_key, KeyParseError, StorageKey};

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::geo::GeoPoint;

/// Errors that can occur while loading a route file.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Failed to read the route file.
    #[error("Failed to read route file: {0}")]
    Io(#[from] std::io::Error),

    /// Route file is not valid JSON of the expected shape.
    #[error("Failed to parse route file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One photo location in the route.
///
/// Immutable after load. `ordinal` is the capture timestamp in epoch
/// seconds and is the sole sort key; `display_date` is the human-readable
/// caption shown in the popup.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Stable identity: the storage filename stem.
    pub key: String,
    /// Photo location.
    pub coords: GeoPoint,
    /// Capture timestamp (epoch seconds), ascending along the route.
    pub ordinal: i64,
    /// Human-readable capture date for the popup caption.
    pub display_date: String,
    /// Storage key of the full-size image (within the images bucket).
    pub image_key: String,
    /// Storage key of the thumbnail (within the thumbnails bucket).
    pub thumb_key: String,
}

/// The ordered waypoint sequence driving the tour.
///
/// May be empty; every consumer treats an empty route as a no-op.
#[derive(Debug, Clone, Default)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

/// One entry of `image_data.json` as written by the export pipeline.
///
/// Entries without a GPS fix or timestamp do occur (cameras without GPS,
/// stripped EXIF) and are skipped at load.
#[derive(Debug, Deserialize)]
struct RouteFileEntry {
    filename: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// The route file is either a bare entry list or wrapped in `{"images": []}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RouteFile {
    Wrapped { images: Vec<RouteFileEntry> },
    Bare(Vec<RouteFileEntry>),
}

impl RouteFile {
    fn into_entries(self) -> Vec<RouteFileEntry> {
        match self {
            RouteFile::Wrapped { images } => images,
            RouteFile::Bare(entries) => entries,
        }
    }
}

impl Route {
    /// Build a route from already-constructed waypoints.
    ///
    /// Sorts ascending by `ordinal`; ties keep their input order.
    pub fn from_waypoints(mut waypoints: Vec<Waypoint>) -> Self {
        waypoints.sort_by_key(|w| w.ordinal);
        Self { waypoints }
    }

    /// Load a route from a JSON byte slice in the export pipeline's shape.
    ///
    /// Entries without usable coordinates are skipped with a warning; the
    /// survivors are sorted by timestamp. An empty result is not an error -
    /// the tour simply never starts.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, RouteError> {
        let entries = serde_json::from_slice::<RouteFile>(bytes)?.into_entries();

        let total = entries.len();
        let mut waypoints = Vec::with_capacity(total);
        for entry in entries {
            if let Some(waypoint) = waypoint_from_entry(entry) {
                waypoints.push(waypoint);
            }
        }

        if waypoints.len() < total {
            warn!(
                skipped = total - waypoints.len(),
                kept = waypoints.len(),
                "Skipped route entries without usable GPS fix"
            );
        }

        Ok(Self::from_waypoints(waypoints))
    }

    /// Load a route from a file path.
    pub fn from_file(path: &Path) -> Result<Self, RouteError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Number of waypoints.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// True when the route has no waypoints.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Get a waypoint by index.
    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Iterate over waypoints in route order.
    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    /// The coordinate sequence in route order.
    pub fn coords(&self) -> Vec<GeoPoint> {
        self.waypoints.iter().map(|w| w.coords).collect()
    }

    /// Index of the last waypoint, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.waypoints.len().checked_sub(1)
    }
}

fn waypoint_from_entry(entry: RouteFileEntry) -> Option<Waypoint> {
    let (lat, lon) = match (entry.lat, entry.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            warn!(filename = %entry.filename, "Route entry has no GPS fix");
            return None;
        }
    };
    let coords = match GeoPoint::new(lat, lon) {
        Ok(coords) => coords,
        Err(e) => {
            warn!(filename = %entry.filename, error = %e, "Route entry has invalid coordinates");
            return None;
        }
    };

    let image_key = match parse_storage_key(entry.path.as_deref().unwrap_or(&entry.filename)) {
        Ok(key) => key,
        Err(e) => {
            warn!(filename = %entry.filename, error = %e, "Route entry has unusable storage key");
            return None;
        }
    };
    let thumb_key = entry
        .thumbnail
        .as_deref()
        .and_then(|t| parse_storage_key(t).ok())
        .unwrap_or_else(|| image_key.clone());

    let ordinal = entry.timestamp.unwrap_or(0.0) as i64;
    let display_date = entry
        .date
        .as_deref()
        .map(format_display_date)
        .unwrap_or_else(|| format_timestamp(ordinal));

    Some(Waypoint {
        key: image_key.stem.clone(),
        coords,
        ordinal,
        display_date,
        image_key: image_key.name(),
        thumb_key: thumb_key.name(),
    })
}

/// Normalize an EXIF-style date (`2019:04:02 14:22:08`) for display.
///
/// Falls back to the raw string when the input isn't in EXIF form.
fn format_display_date(raw: &str) -> String {
    match NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S") {
        Ok(dt) => dt.format("%d %b %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn format_timestamp(epoch_secs: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch_secs, 0) {
        Some(dt) => dt.format("%d %b %Y").to_string(),
        None => String::new(),
    }
}
