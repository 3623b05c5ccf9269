//! Where assets land on disk and where they are published.

use std::path::PathBuf;

use sheetsync_assets::ShareLinkNormalizer;
use sheetsync_shared::{Result, SheetSyncError, SyncConfig, dir_segments};
use tracing::debug;

/// The two asset columns of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Naming convention for one asset kind.
#[derive(Debug, Clone)]
struct AssetNaming {
    /// Local directory.
    dir: PathBuf,
    /// Directory as it appears in published URLs (`/`-separated, no slashes at the ends).
    published_dir: String,
    prefix: String,
    extension: String,
}

/// Where assets are downloaded from, and their deterministic file names,
/// local paths, and published URLs.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    normalizer: ShareLinkNormalizer,
    base_url: String,
    audio: AssetNaming,
    image: AssetNaming,
}

impl From<&SyncConfig> for AssetLayout {
    fn from(config: &SyncConfig) -> Self {
        Self {
            normalizer: ShareLinkNormalizer::new(&config.share_host, &config.download_prefix),
            base_url: config.published_base_url.trim_end_matches('/').to_string(),
            audio: AssetNaming {
                dir: config.audio_dir_path(),
                published_dir: url_path(&config.audio_dir),
                prefix: config.audio_prefix.clone(),
                extension: config.audio_extension.clone(),
            },
            image: AssetNaming {
                dir: config.image_dir_path(),
                published_dir: url_path(&config.image_dir),
                prefix: config.image_prefix.clone(),
                extension: config.image_extension.clone(),
            },
        }
    }
}

/// `/`-joined directory for URLs, without empty or `.` segments.
fn url_path(dir: &str) -> String {
    dir_segments(dir).collect::<Vec<_>>().join("/")
}

impl AssetLayout {
    /// URL to fetch for a source cell; empty when a share link has no usable id.
    pub fn download_url(&self, source_url: &str) -> String {
        self.normalizer.normalize(source_url)
    }

    fn naming(&self, kind: AssetKind) -> &AssetNaming {
        match kind {
            AssetKind::Audio => &self.audio,
            AssetKind::Image => &self.image,
        }
    }

    /// `<prefix><slug>.<extension>`
    pub fn file_name(&self, kind: AssetKind, slug: &str) -> String {
        let naming = self.naming(kind);
        format!("{}{slug}.{}", naming.prefix, naming.extension)
    }

    pub fn local_path(&self, kind: AssetKind, slug: &str) -> PathBuf {
        self.naming(kind).dir.join(self.file_name(kind, slug))
    }

    /// `<base>/<asset dir>/<file name>`, independent of whether the file exists.
    pub fn published_url(&self, kind: AssetKind, slug: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.naming(kind).published_dir,
            self.file_name(kind, slug)
        )
    }

    /// Create both asset directories if absent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.audio.dir, &self.image.dir] {
            std::fs::create_dir_all(dir).map_err(|e| SheetSyncError::io(dir, e))?;
            debug!(path = %dir.display(), "asset directory ready");
        }
        Ok(())
    }
}
