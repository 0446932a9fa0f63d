//! Pixel-dimension probing for resolved image URLs.
//!
//! Popups are laid out before the image itself has loaded, so the engine
//! needs each image's dimensions up front. The prober fetches the image
//! bytes, reads the dimensions from the header, and caches the result by
//! URL for the process lifetime. Probing never fails: any fetch or decode
//! problem yields a fixed default aspect ratio which is cached too, so a
//! broken image is not re-attempted on every popup.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::resolve::BoxFuture;

/// Fallback dimensions for images that fail to load: 400x300 (4:3).
pub const DEFAULT_DIMENSIONS: PixelDimensions = PixelDimensions {
    width: 400,
    height: 300,
    aspect_ratio: 400.0 / 300.0,
};

/// Pixel dimensions of an image, with the derived aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDimensions {
    pub width: u32,
    pub height: u32,
    /// `width / height`.
    pub aspect_ratio: f64,
}

impl PixelDimensions {
    /// Dimensions from a width/height pair.
    pub fn of(width: u32, height: u32) -> Self {
        let aspect_ratio = if height == 0 {
            DEFAULT_DIMENSIONS.aspect_ratio
        } else {
            f64::from(width) / f64::from(height)
        };
        Self {
            width,
            height,
            aspect_ratio,
        }
    }
}

/// Fetches raw image bytes from a URL.
///
/// Object-safe so tests can substitute scripted fetchers.
pub trait ImageFetcher: Send + Sync {
    /// Fetch the bytes behind `url`. Errors are reported as strings; the
    /// prober treats every failure the same way.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, String>>;
}

/// HTTP fetcher backed by a shared reqwest client.
///
/// Only `http(s)` URLs are fetchable; `file://` URLs from the directory
/// source fail the scheme check and fall back to default dimensions.
pub struct ReqwestImageFetcher {
    client: reqwest::Client,
}

impl ReqwestImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for ReqwestImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, String>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("status {}", status.as_u16()));
            }
            response.bytes().await.map_err(|e| e.to_string())
        })
    }
}

/// Probes URLs for pixel dimensions, caching permanently by URL.
pub struct DimensionProber {
    fetcher: Arc<dyn ImageFetcher>,
    cache: DashMap<String, PixelDimensions>,
    defaults_served: AtomicU64,
}

impl DimensionProber {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
            defaults_served: AtomicU64::new(0),
        }
    }

    /// Probe `url` for its pixel dimensions.
    ///
    /// Never fails: a fetch or decode error yields [`DEFAULT_DIMENSIONS`],
    /// and the default is cached so the broken URL is not retried.
    pub async fn probe(&self, url: &str) -> PixelDimensions {
        if let Some(cached) = self.cache.get(url) {
            return *cached;
        }

        let dims = match self.fetcher.fetch(url).await {
            Ok(bytes) => match decode_dimensions(&bytes) {
                Some((width, height)) => {
                    debug!(url, width, height, "Probed image dimensions");
                    PixelDimensions::of(width, height)
                }
                None => {
                    warn!(url, "Image bytes could not be decoded; using defaults");
                    self.defaults_served.fetch_add(1, Ordering::Relaxed);
                    DEFAULT_DIMENSIONS
                }
            },
            Err(e) => {
                warn!(url, error = %e, "Image fetch failed; using defaults");
                self.defaults_served.fetch_add(1, Ordering::Relaxed);
                DEFAULT_DIMENSIONS
            }
        };

        self.cache.insert(url.to_string(), dims);
        dims
    }

    /// Number of cached URLs (successes and defaults alike).
    pub fn entry_count(&self) -> usize {
        self.cache.len()
    }

    /// How many probes fell back to the default dimensions.
    pub fn defaults_served(&self) -> u64 {
        self.defaults_served.load(Ordering::Relaxed)
    }
}

/// Read dimensions from encoded image bytes without a full decode.
fn decode_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Fetcher serving a scripted response, counting calls.
    struct MockFetcher {
        calls: AtomicUsize,
        response: Result<Bytes, String>,
    }

    impl MockFetcher {
        fn ok(bytes: Vec<u8>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(Bytes::from(bytes)),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err("connection refused".to_string()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ImageFetcher for MockFetcher {
        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Bytes, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    /// Encode a real PNG of the given size for decode tests.
    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_dimensions_of() {
        let dims = PixelDimensions::of(800, 600);
        assert_eq!(dims.width, 800);
        assert_eq!(dims.height, 600);
        assert!((dims.aspect_ratio - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimensions_of_zero_height_uses_default_ratio() {
        let dims = PixelDimensions::of(800, 0);
        assert!((dims.aspect_ratio - DEFAULT_DIMENSIONS.aspect_ratio).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_probe_decodes_real_image() {
        let fetcher = Arc::new(MockFetcher::ok(png_bytes(640, 480)));
        let prober = DimensionProber::new(fetcher);

        let dims = prober.probe("https://cdn.example/a.png").await;
        assert_eq!(dims.width, 640);
        assert_eq!(dims.height, 480);
        assert_eq!(prober.defaults_served(), 0);
    }

    #[tokio::test]
    async fn test_probe_caches_by_url() {
        let fetcher = Arc::new(MockFetcher::ok(png_bytes(640, 480)));
        let prober = DimensionProber::new(fetcher.clone());

        prober.probe("https://cdn.example/a.png").await;
        prober.probe("https://cdn.example/a.png").await;

        assert_eq!(fetcher.calls(), 1, "second probe must be served from cache");
        assert_eq!(prober.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_fetch_failure_yields_default() {
        let fetcher = Arc::new(MockFetcher::failing());
        let prober = DimensionProber::new(fetcher);

        let dims = prober.probe("https://cdn.example/broken.png").await;
        assert_eq!(dims, DEFAULT_DIMENSIONS);
        assert!((dims.aspect_ratio - 1.3333).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_probe_failure_is_cached_not_retried() {
        let fetcher = Arc::new(MockFetcher::failing());
        let prober = DimensionProber::new(fetcher.clone());

        prober.probe("https://cdn.example/broken.png").await;
        let dims = prober.probe("https://cdn.example/broken.png").await;

        assert_eq!(dims, DEFAULT_DIMENSIONS);
        assert_eq!(fetcher.calls(), 1, "failed probe must not be re-attempted");
        assert_eq!(prober.defaults_served(), 1);
    }

    #[tokio::test]
    async fn test_probe_undecodable_bytes_yield_default() {
        let fetcher = Arc::new(MockFetcher::ok(b"definitely not an image".to_vec()));
        let prober = DimensionProber::new(fetcher);

        let dims = prober.probe("https://cdn.example/garbage.bin").await;
        assert_eq!(dims, DEFAULT_DIMENSIONS);
    }
}
