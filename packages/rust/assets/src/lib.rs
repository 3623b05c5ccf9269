//! Asset retrieval: URL normalization and the HTTP asset fetcher.
//!
//! A fetch succeeds only on `200 OK` with a non-HTML content type. Share
//! hosts answer quota and permission problems with an HTML page and a 200
//! status, which must never be saved as an `.mp3` or `.jpg`.

mod normalize;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sheetsync_shared::{Result, SheetSyncError};
use tracing::{debug, instrument};

pub use normalize::{
    DEFAULT_DOWNLOAD_PREFIX, DEFAULT_SHARE_HOST, ShareLinkNormalizer, normalize,
};

/// Maximum number of redirects to follow (share hosts redirect to a CDN).
const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for asset requests.
const USER_AGENT: &str = concat!("SheetSync/", env!("CARGO_PKG_VERSION"));

/// Media types treated as "an HTML page, not the asset".
const HTML_MEDIA_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

// ---------------------------------------------------------------------------
// Fetch options
// ---------------------------------------------------------------------------

/// Configuration for the asset fetcher.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each HTTP request in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// AssetFetcher
// ---------------------------------------------------------------------------

/// Downloads single assets to local files.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    /// Create a fetcher with the given options.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SheetSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// GET `url` and store the body at `dest`, replacing any existing file.
    ///
    /// Returns the number of bytes written. On error nothing is written at
    /// `dest`; a previous file there is left as it was.
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("fetching asset");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SheetSyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SheetSyncError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if is_html_content_type(content_type) {
                return Err(SheetSyncError::UnexpectedContent {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SheetSyncError::Network(format!("{url}: body read failed: {e}")))?;

        write_replace(dest, &body)?;
        debug!(size = body.len(), "asset written");

        Ok(body.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether a `Content-Type` header value denotes an HTML document.
pub fn is_html_content_type(value: &str) -> bool {
    let media_type = value.split(';').next().unwrap_or_default().trim();
    HTML_MEDIA_TYPES
        .iter()
        .any(|html| media_type.eq_ignore_ascii_case(html))
}

/// Write to a sibling temp file, then rename over `dest`.
fn write_replace(dest: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_path(dest);

    std::fs::write(&temp, bytes).map_err(|e| SheetSyncError::io(&temp, e))?;

    if let Err(e) = std::fs::rename(&temp, dest) {
        let _ = std::fs::remove_file(&temp);
        return Err(SheetSyncError::io(dest, e));
    }
    Ok(())
}

fn temp_path(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());
    dest.with_file_name(format!(".{file_name}.part"))
}
