//! Backing URL sources.
//!
//! A [`UrlSource`] answers the single question "give me a fetchable URL for
//! this bucket/key pair". Two implementations are provided:
//!
//! - [`DirectorySource`] maps keys to `file://` URLs under a local export
//!   directory (local hosting, no credentials involved).
//! - [`SignedUrlSource`] performs the signed-URL exchange against a private
//!   storage service (Supabase-compatible storage API).

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::resolve::BoxFuture;

/// Errors from a backing URL source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transport-level failure talking to the storage service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The storage service answered with a non-success status.
    #[error("Storage service returned status {status} for {key}")]
    Status { status: u16, key: String },

    /// The signing response could not be understood.
    #[error("Malformed signing response: {0}")]
    MalformedResponse(String),

    /// The key does not exist in the local directory mapping.
    #[error("No such object: {0}")]
    NotFound(String),
}

/// Resolves a storage key within a bucket to a fetchable URL.
///
/// Implementations must be `Send + Sync`; the resolver shares one source
/// across all callers. The trait is object-safe (`Arc<dyn UrlSource>`)
/// via boxed futures.
pub trait UrlSource: Send + Sync {
    /// Resolve `key` within `bucket` to a URL.
    ///
    /// May suspend (network round-trip) and may fail; the caller owns
    /// caching and de-duplication.
    fn resolve_url<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>>;
}

/// Maps bucket/key pairs onto `file://` URLs under a local root.
///
/// Mirrors the export layout: `{root}/{bucket}/{key}`. The file is checked
/// for existence so that a missing export surfaces as [`SourceError::NotFound`]
/// at resolution time rather than as a broken image later.
pub struct DirectorySource {
    root: std::path::PathBuf,
}

impl DirectorySource {
    /// Create a source rooted at the given export directory.
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl UrlSource for DirectorySource {
    fn resolve_url<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            let path = self.root.join(bucket).join(key);
            if !path.is_file() {
                return Err(SourceError::NotFound(format!("{}/{}", bucket, key)));
            }
            Ok(format!("file://{}", path.display()))
        })
    }
}

/// Response body of the storage signing endpoint.
#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Signed-URL exchange against a private storage service.
///
/// Issues `POST {base_url}/storage/v1/object/sign/{bucket}/{key}` with a
/// bearer service key and `{"expiresIn": secs}` body, and joins the
/// returned relative `signedURL` onto the storage base URL.
pub struct SignedUrlSource {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    expires_in_secs: u64,
}

impl SignedUrlSource {
    /// Create a signing source.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Storage project base URL (no trailing slash)
    /// * `service_key` - Service role key used as bearer token
    /// * `expires_in_secs` - Validity window requested for each signed URL;
    ///   must exceed the resolver's cache TTL
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        expires_in_secs: u64,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            service_key: service_key.into(),
            expires_in_secs,
        }
    }
}

impl UrlSource for SignedUrlSource {
    fn resolve_url<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            let endpoint = format!(
                "{}/storage/v1/object/sign/{}/{}",
                self.base_url, bucket, key
            );

            let response = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.service_key)
                .json(&serde_json::json!({ "expiresIn": self.expires_in_secs }))
                .send()
                .await
                .map_err(|e| SourceError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    key: format!("{}/{}", bucket, key),
                });
            }

            let body: SignResponse = response
                .json()
                .await
                .map_err(|e| SourceError::MalformedResponse(e.to_string()))?;

            // The service answers with a project-relative path
            let url = format!(
                "{}/storage/v1{}",
                self.base_url,
                body.signed_url.trim_start_matches("/storage/v1")
            );
            debug!(bucket, key, "Signed URL issued");
            Ok(url)
        })
    }
}
