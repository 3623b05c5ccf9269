//! Application configuration for SheetSync.
//!
//! Config lives in `./sheetsync.toml`, falling back to
//! `~/.sheetsync/sheetsync.toml`. CLI flags override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetSyncError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "sheetsync.toml";

/// Config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sheetsync";

// ---------------------------------------------------------------------------
// Config structs (matching sheetsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tabular source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Local asset layout and published URL settings.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the published CSV export.
    #[serde(default = "default_source_url")]
    pub url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
        }
    }
}

fn default_source_url() -> String {
    "https://docs.google.com/spreadsheets/d/e/2PACX-1vS6DwoZGGGSoNgv4N3CccevntUCCHhaYNWR4MyQi_GlgfqRTTwgcSGgtNeIh-PmiKLLhKzY2dc-4-mE/pub?output=csv".into()
}

/// What to do when the store document does not exist yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingStorePolicy {
    /// Treat a missing document as an empty store.
    #[default]
    Empty,
    /// Abort the run.
    Fail,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON document, relative to the project root.
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Behaviour when the document is absent.
    #[serde(default)]
    pub missing: MissingStorePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            missing: MissingStorePolicy::default(),
        }
    }
}

fn default_store_path() -> String {
    "igbo_cosmology.json".into()
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Audio directory, relative to the project root (`/`-separated).
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Image directory, relative to the project root (`/`-separated).
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// Base URL under which the asset directories are published.
    #[serde(default = "default_published_base_url")]
    pub published_base_url: String,

    #[serde(default = "default_audio_prefix")]
    pub audio_prefix: String,

    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,

    #[serde(default)]
    pub image_prefix: String,

    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Host whose share links are rewritten to direct downloads.
    #[serde(default = "default_share_host")]
    pub share_host: String,

    /// Direct-download URL up to and including `id=`; the file id is appended.
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            image_dir: default_image_dir(),
            published_base_url: default_published_base_url(),
            audio_prefix: default_audio_prefix(),
            audio_extension: default_audio_extension(),
            image_prefix: String::new(),
            image_extension: default_image_extension(),
            share_host: default_share_host(),
            download_prefix: default_download_prefix(),
        }
    }
}

fn default_audio_dir() -> String {
    "assets/pronunciations".into()
}
fn default_image_dir() -> String {
    "assets/images".into()
}
fn default_published_base_url() -> String {
    "https://raw.githubusercontent.com/ezeanyimhenry/igbo-cosmology/main".into()
}
fn default_audio_prefix() -> String {
    "pronunciation_ig_".into()
}
fn default_audio_extension() -> String {
    "mp3".into()
}
fn default_image_extension() -> String {
    "jpg".into()
}
fn default_share_host() -> String {
    "drive.google.com".into()
}
fn default_download_prefix() -> String {
    "https://drive.google.com/uc?export=download&id=".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Sync config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sync configuration, merged from config file + CLI flags.
///
/// Relative paths are resolved against `root`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// URL of the CSV export.
    pub source_url: String,
    /// Project root that the store and asset directories live under.
    pub root: PathBuf,
    /// Store document path, relative to `root`.
    pub store_path: String,
    pub missing_store: MissingStorePolicy,
    pub audio_dir: String,
    pub image_dir: String,
    pub published_base_url: String,
    pub audio_prefix: String,
    pub audio_extension: String,
    pub image_prefix: String,
    pub image_extension: String,
    pub share_host: String,
    pub download_prefix: String,
    pub timeout_secs: u64,
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source_url: config.source.url.clone(),
            root: PathBuf::from("."),
            store_path: config.store.path.clone(),
            missing_store: config.store.missing,
            audio_dir: config.assets.audio_dir.clone(),
            image_dir: config.assets.image_dir.clone(),
            published_base_url: config.assets.published_base_url.clone(),
            audio_prefix: config.assets.audio_prefix.clone(),
            audio_extension: config.assets.audio_extension.clone(),
            image_prefix: config.assets.image_prefix.clone(),
            image_extension: config.assets.image_extension.clone(),
            share_host: config.assets.share_host.clone(),
            download_prefix: config.assets.download_prefix.clone(),
            timeout_secs: config.http.timeout_secs,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl SyncConfig {
    /// Absolute (or root-relative) path of the store document.
    pub fn store_file(&self) -> PathBuf {
        self.root.join(&self.store_path)
    }

    /// Local directory receiving audio files.
    pub fn audio_dir_path(&self) -> PathBuf {
        join_relative(&self.root, &self.audio_dir)
    }

    /// Local directory receiving image files.
    pub fn image_dir_path(&self) -> PathBuf {
        join_relative(&self.root, &self.image_dir)
    }

    /// Reject settings that would produce unusable paths or URLs.
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(SheetSyncError::config("source url is empty"));
        }
        if self.store_path.trim().is_empty() {
            return Err(SheetSyncError::config("store path is empty"));
        }
        if self.published_base_url.trim().is_empty() {
            return Err(SheetSyncError::config("published_base_url is empty"));
        }
        if self.share_host.trim().is_empty() || self.download_prefix.trim().is_empty() {
            return Err(SheetSyncError::config(
                "share_host and download_prefix must both be set",
            ));
        }
        for (field, dir) in [("audio_dir", &self.audio_dir), ("image_dir", &self.image_dir)] {
            if dir_segments(dir).next().is_none() {
                return Err(SheetSyncError::config(format!("{field} is empty")));
            }
            if Path::new(dir).is_absolute() {
                return Err(SheetSyncError::config(format!(
                    "{field} must be relative to the project root, got {dir}"
                )));
            }
            if dir.split('/').any(|part| part == "..") {
                return Err(SheetSyncError::config(format!(
                    "{field} must stay inside the project root, got {dir}"
                )));
            }
        }
        for (field, ext) in [
            ("audio_extension", &self.audio_extension),
            ("image_extension", &self.image_extension),
        ] {
            if ext.is_empty() || ext.contains(['/', '.']) {
                return Err(SheetSyncError::config(format!(
                    "{field} must be a bare extension, got {ext:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Segments of a `/`-separated relative directory, without empty or `.` parts.
pub fn dir_segments(dir: &str) -> impl Iterator<Item = &str> {
    dir.split('/').filter(|part| !part.is_empty() && *part != ".")
}

/// Join a `/`-separated relative directory onto a filesystem root.
fn join_relative(root: &Path, dir: &str) -> PathBuf {
    dir_segments(dir).fold(root.to_path_buf(), |acc, part| acc.join(part))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Candidate config files, in lookup order.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths
}

/// Load the application config.
///
/// An explicit path must exist. Without one, the first existing file from
/// [`config_search_paths`] is used, or defaults when none exists.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    for path in config_search_paths() {
        if path.exists() {
            return load_config_from(&path);
        }
    }

    tracing::debug!("no config file found, using defaults");
    Ok(AppConfig::default())
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SheetSyncError::io(path, e))?;

    let config = toml::from_str(&content).map_err(|e| {
        SheetSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Write a default config file at `path`. Refuses to overwrite.
pub fn init_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(SheetSyncError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SheetSyncError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SheetSyncError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| SheetSyncError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(())
}
