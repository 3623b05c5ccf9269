//! End-to-end `sync` pipeline: CSV export → reconcile → record store + assets.

use tracing::{info, instrument};

use sheetsync_assets::{AssetFetcher, FetchOptions};
use sheetsync_shared::{RecordKey, Result, SyncConfig};
use sheetsync_source::SourceOptions;
use sheetsync_store::RecordStore;

use crate::layout::AssetLayout;
use crate::reconcile::{self, AssetFailure, SyncReport};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a new record has been built.
    fn row_added(&self, key: &RecordKey, added_so_far: usize);
    /// Called for every asset that could not be stored.
    fn asset_failed(&self, failure: &AssetFailure);
    /// Called when the pipeline completes.
    fn done(&self, report: &SyncReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_added(&self, _key: &RecordKey, _added_so_far: usize) {}
    fn asset_failed(&self, _failure: &AssetFailure) {}
    fn done(&self, _report: &SyncReport) {}
}

/// Run the full sync.
///
/// 1. Validate config and create the asset directories
/// 2. Fetch and parse the CSV export (any failure aborts the run)
/// 3. Reconcile the rows against the record store
#[instrument(skip_all, fields(source = %config.source_url, root = %config.root.display()))]
pub async fn sync(config: &SyncConfig, progress: &dyn ProgressReporter) -> Result<SyncReport> {
    config.validate()?;

    let layout = AssetLayout::from(config);
    layout.ensure_dirs()?;

    progress.phase("Fetching spreadsheet");
    let source_opts = SourceOptions {
        timeout_secs: config.timeout_secs,
    };
    let rows = sheetsync_source::fetch_rows(&config.source_url, &source_opts).await?;

    let fetcher = AssetFetcher::new(&FetchOptions {
        timeout_secs: config.timeout_secs,
    })?;
    let store = RecordStore::new(config.store_file(), config.missing_store);

    let report = reconcile::reconcile(&rows, &store, &fetcher, &layout, progress).await?;

    info!(added = report.added, "sync finished");
    progress.done(&report);

    Ok(report)
}
