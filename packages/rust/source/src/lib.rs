//! Tabular source: fetch the published CSV export and parse it into rows.
//!
//! Any failure here is fatal to a run: it happens before the record store is
//! touched, so nothing needs to be rolled back.

mod parser;

use std::time::Duration;

use reqwest::Client;
use sheetsync_shared::{Result, Row, SheetSyncError};
use tracing::{debug, info, instrument};

pub use parser::{REQUIRED_COLUMNS, parse_rows};

/// Maximum number of redirects to follow (published exports redirect once).
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for fetching the export.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("SheetSync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Source options
// ---------------------------------------------------------------------------

/// Configuration for fetching the tabular source.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Timeout for the HTTP request in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch the CSV export at `url` and parse it into rows.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_rows(url: &str, opts: &SourceOptions) -> Result<Vec<Row>> {
    let client = build_client(opts)?;
    let body = fetch_csv(&client, url).await?;
    let rows = parse_rows(&body)?;

    info!(rows = rows.len(), "tabular source loaded");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &SourceOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| SheetSyncError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET the export body as text, requiring a 200 response.
async fn fetch_csv(client: &Client, url: &str) -> Result<String> {
    debug!(%url, "fetching tabular source");

    let response = client
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

    response
        .text()
        .await
        .map_err(|e| SheetSyncError::Network(format!("{url}: failed to read body: {e}")))
}
