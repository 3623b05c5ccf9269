//! Reconciliation of source rows against the record store.
//!
//! Rows whose `(section, name)` key is already stored are skipped outright.
//! Every other row has its assets fetched and becomes a new record appended
//! after the existing ones. Existing records are never modified.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use sheetsync_assets::AssetFetcher;
use sheetsync_shared::{Record, RecordKey, Result, Row, SheetSyncError};
use sheetsync_store::{RecordStore, append, existing_keys};

use crate::layout::{AssetKind, AssetLayout};
use crate::pipeline::ProgressReporter;
use crate::slug::SlugAllocator;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// An asset that could not be stored locally.
#[derive(Debug, Clone)]
pub struct AssetFailure {
    pub key: RecordKey,
    pub kind: AssetKind,
    /// URL as given in the source row.
    pub url: String,
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Rows read from the source.
    pub rows_seen: usize,
    /// Records appended to the store.
    pub added: usize,
    /// Rows whose key was already in the store.
    pub skipped_existing: usize,
    /// Rows repeating a key produced earlier in the same run.
    pub skipped_duplicate: usize,
    /// Assets fetched and written successfully.
    pub assets_fetched: usize,
    pub asset_failures: Vec<AssetFailure>,
    /// Whether the store document was rewritten.
    pub store_written: bool,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Reconcile `rows` against `store`, fetching assets for new rows.
///
/// 1. Load existing records and their keys
/// 2. For each row in order: skip known keys, otherwise fetch audio and
///    image and build a record
/// 3. Save `existing ++ new` once if anything was added
///
/// Asset failures are reported, never fatal. A failed fetch still leaves the
/// published URL on the record; an asset URL that normalizes to nothing
/// leaves the field empty.
#[instrument(skip_all, fields(store = %store.path().display(), rows = rows.len()))]
pub async fn reconcile(
    rows: &[Row],
    store: &RecordStore,
    fetcher: &AssetFetcher,
    layout: &AssetLayout,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    let start = Instant::now();
    let mut report = SyncReport {
        rows_seen: rows.len(),
        ..SyncReport::default()
    };

    // --- Load existing ---
    progress.phase("Loading record store");
    let existing = store.load()?;
    let known = existing_keys(&existing);
    let mut produced: HashSet<RecordKey> = HashSet::new();
    let mut slugs = SlugAllocator::seeded(&existing);

    info!(existing = existing.len(), "reconciling source rows");

    // --- Process rows ---
    progress.phase("Processing new rows");
    let mut pending: Vec<Record> = Vec::new();

    for row in rows {
        let key = row.key();
        if known.contains(&key) {
            report.skipped_existing += 1;
            continue;
        }
        if produced.contains(&key) {
            warn!(%key, "duplicate key in source, keeping first occurrence");
            report.skipped_duplicate += 1;
            continue;
        }

        let slug = slugs.claim(&key);
        debug!(%key, %slug, "new row");

        let audio = ingest_asset(
            &key,
            AssetKind::Audio,
            &row.audio,
            &slug,
            fetcher,
            layout,
            progress,
            &mut report,
        )
        .await;
        let image = ingest_asset(
            &key,
            AssetKind::Image,
            &row.image,
            &slug,
            fetcher,
            layout,
            progress,
            &mut report,
        )
        .await;

        pending.push(Record {
            section: row.section.clone(),
            name: row.name.clone(),
            image,
            audio,
            description: row.description.clone(),
            extra: serde_json::Map::new(),
        });
        produced.insert(key.clone());
        progress.row_added(&key, pending.len());
    }

    // --- Persist ---
    report.added = pending.len();
    if pending.is_empty() {
        info!("no new entries to add");
    } else {
        progress.phase("Writing record store");
        let all = append(existing, pending);
        store.save(&all)?;
        report.store_written = true;
    }

    report.elapsed = start.elapsed();

    info!(
        added = report.added,
        skipped_existing = report.skipped_existing,
        skipped_duplicate = report.skipped_duplicate,
        assets_fetched = report.assets_fetched,
        asset_failures = report.asset_failures.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "reconciliation complete"
    );

    Ok(report)
}

/// Fetch one asset of a new row and return the URL to store on the record.
///
/// Empty source URL → empty. Unusable share link → empty, no fetch.
/// Otherwise the published URL, whether or not the fetch succeeded.
#[allow(clippy::too_many_arguments)]
async fn ingest_asset(
    key: &RecordKey,
    kind: AssetKind,
    source_url: &str,
    slug: &str,
    fetcher: &AssetFetcher,
    layout: &AssetLayout,
    progress: &dyn ProgressReporter,
    report: &mut SyncReport,
) -> String {
    if source_url.trim().is_empty() {
        return String::new();
    }

    let download_url = layout.download_url(source_url);
    if download_url.is_empty() {
        let error = SheetSyncError::validation("share link has no usable file id").to_string();
        record_failure(key, kind, source_url, error, progress, report);
        return String::new();
    }

    let dest = layout.local_path(kind, slug);
    match fetcher.fetch_to(&download_url, &dest).await {
        Ok(bytes) => {
            debug!(%key, %kind, bytes, path = %dest.display(), "asset stored");
            report.assets_fetched += 1;
        }
        Err(e) => record_failure(key, kind, source_url, e.to_string(), progress, report),
    }

    layout.published_url(kind, slug)
}

fn record_failure(
    key: &RecordKey,
    kind: AssetKind,
    source_url: &str,
    error: String,
    progress: &dyn ProgressReporter,
    report: &mut SyncReport,
) {
    warn!(%key, %kind, url = %source_url, %error, "asset not stored");
    let failure = AssetFailure {
        key: key.clone(),
        kind,
        url: source_url.to_string(),
        error,
    };
    progress.asset_failed(&failure);
    report.asset_failures.push(failure);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::SilentProgress;
    use sheetsync_assets::FetchOptions;
    use sheetsync_shared::{MissingStorePolicy, SyncConfig};
    use uuid::Uuid;

    struct Fixture {
        root: PathBuf,
        store: RecordStore,
        layout: AssetLayout,
        fetcher: AssetFetcher,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(|_| {})
        }

        fn with_config(adjust: impl FnOnce(&mut SyncConfig)) -> Self {
            let root =
                std::env::temp_dir().join(format!("sheetsync-reconcile-{}", Uuid::now_v7()));
            let mut config = SyncConfig {
                root: root.clone(),
                ..SyncConfig::default()
            };
            adjust(&mut config);
            let layout = AssetLayout::from(&config);
            layout.ensure_dirs().unwrap();
            Self {
                store: RecordStore::new(config.store_file(), MissingStorePolicy::Empty),
                layout,
                fetcher: AssetFetcher::new(&FetchOptions::default()).unwrap(),
                root,
            }
        }

        fn seed(&self, json: &str) {
            std::fs::write(self.store.path(), json).unwrap();
        }

        async fn run(&self, rows: &[Row]) -> SyncReport {
            reconcile(rows, &self.store, &self.fetcher, &self.layout, &SilentProgress)
                .await
                .unwrap()
        }

        fn modified(&self) -> std::time::SystemTime {
            std::fs::metadata(self.store.path()).unwrap().modified().unwrap()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn row(section: &str, name: &str, audio: &str, image: &str) -> Row {
        Row {
            section: section.into(),
            name: name.into(),
            audio: audio.into(),
            image: image.into(),
            description: format!("About {name}"),
        }
    }

    async fn mount_asset(
        server: &wiremock::MockServer,
        path: &str,
        content_type: &str,
        body: &[u8],
    ) {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(path))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw(body.to_vec(), content_type),
            )
            .mount(server)
            .await;
    }

    fn exists(path: &Path) -> bool {
        path.try_exists().unwrap_or(false)
    }

    #[tokio::test]
    async fn adds_only_new_keys() {
        let fx = Fixture::new();
        fx.seed(r#"[{"section":"Cosmos","name":"Chukwu","image":"","audio":"","description":"Supreme being"}]"#);

        let rows = vec![row("Cosmos", "Chukwu", "", ""), row("Cosmos", "Ala", "", "")];
        let report = fx.run(&rows).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 1);
        assert!(report.store_written);

        let records = fx.store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Chukwu");
        assert_eq!(records[0].description, "Supreme being");
        assert_eq!(records[1].name, "Ala");
        assert_eq!(records[1].description, "About Ala");
    }

    #[tokio::test]
    async fn second_run_adds_nothing_and_does_not_write() {
        let fx = Fixture::new();
        let rows = vec![row("Cosmos", "Chukwu", "", ""), row("Cosmos", "Ala", "", "")];

        let first = fx.run(&rows).await;
        assert_eq!(first.added, 2);
        let written_at = fx.modified();

        let second = fx.run(&rows).await;
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped_existing, 2);
        assert!(!second.store_written);
        assert_eq!(fx.modified(), written_at);
    }

    #[tokio::test]
    async fn missing_store_bootstraps_with_single_write() {
        let fx = Fixture::new();
        assert!(!exists(fx.store.path()));

        let report = fx.run(&[row("Cosmos", "Ala", "", "")]).await;

        assert_eq!(report.added, 1);
        assert!(report.store_written);
        assert_eq!(fx.store.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_new_rows_leaves_missing_store_absent() {
        let fx = Fixture::new();
        let report = fx.run(&[]).await;
        assert_eq!(report.added, 0);
        assert!(!exists(fx.store.path()));
    }

    #[tokio::test]
    async fn empty_asset_fields_fetch_nothing() {
        let fx = Fixture::new();
        let report = fx.run(&[row("Cosmos", "Ala", "", "")]).await;

        let record = &fx.store.load().unwrap()[0];
        assert!(record.audio.is_empty());
        assert!(record.image.is_empty());
        assert_eq!(report.assets_fetched, 0);
        assert!(report.asset_failures.is_empty());
    }

    #[tokio::test]
    async fn fetched_assets_get_published_urls() {
        let fx = Fixture::new();
        let server = wiremock::MockServer::start().await;
        mount_asset(&server, "/ala.mp3", "audio/mpeg", b"ID3").await;
        mount_asset(&server, "/ala.jpg", "image/jpeg", b"\xff\xd8\xff").await;

        let uri = server.uri();
        let rows = vec![row("Cosmos", "Ala", &format!("{uri}/ala.mp3"), &format!("{uri}/ala.jpg"))];
        let report = fx.run(&rows).await;

        assert_eq!(report.assets_fetched, 2);
        let record = &fx.store.load().unwrap()[0];
        assert_eq!(record.audio, fx.layout.published_url(AssetKind::Audio, "ala"));
        assert_eq!(record.image, fx.layout.published_url(AssetKind::Image, "ala"));
        assert_eq!(
            std::fs::read(fx.layout.local_path(AssetKind::Audio, "ala")).unwrap(),
            b"ID3"
        );
        assert!(exists(&fx.layout.local_path(AssetKind::Image, "ala")));
    }

    #[tokio::test]
    async fn html_response_still_produces_record() {
        let fx = Fixture::new();
        let server = wiremock::MockServer::start().await;
        mount_asset(&server, "/ala.jpg", "text/html", b"<html>Sign in</html>").await;

        let image_url = format!("{}/ala.jpg", server.uri());
        let report = fx.run(&[row("Cosmos", "Ala", "", &image_url)]).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.asset_failures.len(), 1);
        assert_eq!(report.asset_failures[0].kind, AssetKind::Image);
        assert_eq!(report.asset_failures[0].url, image_url);
        assert!(!exists(&fx.layout.local_path(AssetKind::Image, "ala")));

        let record = &fx.store.load().unwrap()[0];
        assert_eq!(record.image, fx.layout.published_url(AssetKind::Image, "ala"));
    }

    #[tokio::test]
    async fn unreachable_asset_is_not_fatal() {
        let fx = Fixture::new();
        let rows = vec![
            row("Cosmos", "Ala", "http://127.0.0.1:9/ala.mp3", ""),
            row("Cosmos", "Anyanwu", "", ""),
        ];
        let report = fx.run(&rows).await;

        assert_eq!(report.added, 2);
        assert_eq!(report.asset_failures.len(), 1);
        let records = fx.store.load().unwrap();
        assert_eq!(records[0].audio, fx.layout.published_url(AssetKind::Audio, "ala"));
    }

    #[tokio::test]
    async fn unusable_share_link_leaves_field_empty() {
        let fx = Fixture::new();
        let rows = vec![row("Cosmos", "Ala", "https://drive.google.com/drive/folders", "")];
        let report = fx.run(&rows).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.asset_failures.len(), 1);
        assert_eq!(report.asset_failures[0].kind, AssetKind::Audio);
        assert!(report.asset_failures[0].error.starts_with("validation error"));
        let record = &fx.store.load().unwrap()[0];
        assert!(record.audio.is_empty());
    }

    #[tokio::test]
    async fn share_links_are_fetched_at_direct_download_url() {
        let server = wiremock::MockServer::start().await;
        let uri = server.uri();
        let fx = Fixture::with_config(|config| {
            config.share_host = "127.0.0.1".into();
            config.download_prefix = format!("{uri}/uc?export=download&id=");
        });

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/uc"))
            .and(wiremock::matchers::query_param("export", "download"))
            .and(wiremock::matchers::query_param("id", "ABC123"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(b"ID3".to_vec(), "audio/mpeg"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let share_link = format!("{uri}/file/d/ABC123/view?usp=sharing");
        let report = fx.run(&[row("Cosmos", "Ala", &share_link, "")]).await;

        assert_eq!(report.assets_fetched, 1);
        assert!(report.asset_failures.is_empty());
        assert_eq!(
            std::fs::read(fx.layout.local_path(AssetKind::Audio, "ala")).unwrap(),
            b"ID3"
        );
        let record = &fx.store.load().unwrap()[0];
        assert_eq!(record.audio, fx.layout.published_url(AssetKind::Audio, "ala"));
    }

    #[tokio::test]
    async fn duplicate_source_rows_produce_one_record() {
        let fx = Fixture::new();
        let mut second = row("Cosmos", "Ala", "", "");
        second.description = "Repeated".into();
        let rows = vec![row("Cosmos", "Ala", "", ""), second];

        let report = fx.run(&rows).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_duplicate, 1);
        let records = fx.store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "About Ala");
    }

    #[tokio::test]
    async fn colliding_slugs_use_distinct_files() {
        let fx = Fixture::new();
        let server = wiremock::MockServer::start().await;
        mount_asset(&server, "/one.jpg", "image/jpeg", b"one").await;
        mount_asset(&server, "/two.jpg", "image/jpeg", b"two").await;

        let uri = server.uri();
        let rows = vec![
            row("Cosmos", "Ala", "", &format!("{uri}/one.jpg")),
            row("Shrines", "Ala", "", &format!("{uri}/two.jpg")),
        ];
        fx.run(&rows).await;

        let records = fx.store.load().unwrap();
        assert_ne!(records[0].image, records[1].image);
        assert!(records[1].image.ends_with("/ala-shrines.jpg"));
        assert_eq!(
            std::fs::read(fx.layout.local_path(AssetKind::Image, "ala")).unwrap(),
            b"one"
        );
        assert_eq!(
            std::fs::read(fx.layout.local_path(AssetKind::Image, "ala-shrines")).unwrap(),
            b"two"
        );
    }

    #[tokio::test]
    async fn key_set_after_run_is_union_without_repeats() {
        let fx = Fixture::new();
        fx.seed(r#"[{"section":"Cosmos","name":"Chukwu"},{"section":"Cosmos","name":"Ala"}]"#);

        let rows = vec![
            row("Cosmos", "Ala", "", ""),
            row("Spirits", "Agwu", "", ""),
            row("Spirits", "Agwu", "", ""),
            row("Spirits", "Ikenga", "", ""),
        ];
        fx.run(&rows).await;

        let records = fx.store.load().unwrap();
        let keys = existing_keys(&records);
        assert_eq!(records.len(), keys.len());
        let expected: HashSet<RecordKey> = [
            RecordKey::new("Cosmos", "Chukwu"),
            RecordKey::new("Cosmos", "Ala"),
            RecordKey::new("Spirits", "Agwu"),
            RecordKey::new("Spirits", "Ikenga"),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn malformed_store_aborts_before_any_fetch() {
        let fx = Fixture::new();
        fx.seed("not json");
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let rows = vec![row("Cosmos", "Ala", &format!("{}/a.mp3", server.uri()), "")];
        let result =
            reconcile(&rows, &fx.store, &fx.fetcher, &fx.layout, &SilentProgress).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(fx.store.path()).unwrap(), "not json");
    }

    #[derive(Default)]
    struct Recording {
        added: Mutex<Vec<String>>,
        failed: Mutex<Vec<AssetKind>>,
    }

    impl ProgressReporter for Recording {
        fn phase(&self, _name: &str) {}
        fn row_added(&self, key: &RecordKey, _added_so_far: usize) {
            self.added.lock().unwrap().push(key.name.clone());
        }
        fn asset_failed(&self, failure: &AssetFailure) {
            self.failed.lock().unwrap().push(failure.kind);
        }
        fn done(&self, _report: &SyncReport) {}
    }

    #[tokio::test]
    async fn progress_sees_rows_and_failures_in_order() {
        let fx = Fixture::new();
        let rows = vec![
            row("Cosmos", "Ala", "", "https://drive.google.com/file/d/"),
            row("Cosmos", "Anyanwu", "", ""),
        ];
        let progress = Recording::default();
        reconcile(&rows, &fx.store, &fx.fetcher, &fx.layout, &progress)
            .await
            .unwrap();

        assert_eq!(*progress.added.lock().unwrap(), vec!["Ala", "Anyanwu"]);
        assert_eq!(*progress.failed.lock().unwrap(), vec![AssetKind::Image]);
    }
}
