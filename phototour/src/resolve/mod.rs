//! Resource resolution: storage keys to fetchable URLs, and URL probing.
//!
//! Private storage buckets only serve content through short-lived signed
//! URLs. This module turns opaque storage keys into usable URLs with a
//! time-bounded cache and in-flight request coalescing, and probes resolved
//! URLs for pixel dimensions so popups can be laid out before the image
//! itself arrives.
//!
//! # Architecture
//!
//! ```text
//! storage key ──► ResourceResolver ──► UrlSource (signed-URL exchange)
//!                  │ TTL cache                  │
//!                  │ single-flight map          ▼
//!                  ▼                     DirectorySource │ SignedUrlSource
//!                 url ──► DimensionProber ──► ImageFetcher (reqwest)
//!                          permanent cache
//! ```

mod dimensions;
mod resolver;
mod source;

pub use dimensions::{
    DimensionProber, ImageFetcher, PixelDimensions, ReqwestImageFetcher, DEFAULT_DIMENSIONS,
};
pub use resolver::{ResolvedUrl, ResolveError, ResolverStats, ResourceResolver};
pub use source::{DirectorySource, SignedUrlSource, SourceError, UrlSource};

use std::future::Future;
use std::pin::Pin;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
