//! Share-link → direct-download URL rewriting.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Host of the share-link family we know how to rewrite.
pub const DEFAULT_SHARE_HOST: &str = "drive.google.com";

/// Direct-download form; the file identifier is appended.
pub const DEFAULT_DOWNLOAD_PREFIX: &str = "https://drive.google.com/uc?export=download&id=";

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

static DEFAULT_NORMALIZER: LazyLock<ShareLinkNormalizer> =
    LazyLock::new(ShareLinkNormalizer::default);

/// Rewrites share links of one host into direct-download links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinkNormalizer {
    share_host: String,
    download_prefix: String,
}

impl Default for ShareLinkNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SHARE_HOST, DEFAULT_DOWNLOAD_PREFIX)
    }
}

impl ShareLinkNormalizer {
    /// `download_prefix` is the direct-download URL up to and including `id=`.
    pub fn new(share_host: impl Into<String>, download_prefix: impl Into<String>) -> Self {
        Self {
            share_host: share_host.into(),
            download_prefix: download_prefix.into(),
        }
    }

    /// Rewrite a share link into a direct-download link.
    ///
    /// - empty input → empty output
    /// - share link with a file id (`/d/<id>/…` or `?id=<id>`) → canonical
    ///   direct-download URL
    /// - share link without a usable id → empty (the caller treats it as "no
    ///   asset")
    /// - anything else → returned unchanged
    ///
    /// Idempotent: the canonical form maps to itself.
    pub fn normalize(&self, url: &str) -> String {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let Ok(parsed) = Url::parse(trimmed) else {
            return url.to_string();
        };
        if !self.is_share_link(&parsed) {
            return url.to_string();
        }

        match file_id(&parsed) {
            Some(id) => format!("{}{id}", self.download_prefix),
            None => String::new(),
        }
    }

    /// Whether the URL belongs to the share-link family.
    pub fn is_share_link(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.share_host))
    }
}

/// [`ShareLinkNormalizer::normalize`] for the default share host.
pub fn normalize(url: &str) -> String {
    DEFAULT_NORMALIZER.normalize(url)
}

/// Extract the file identifier from a share link.
///
/// A valid `/d/<id>` path segment takes precedence over the `id` query
/// parameter.
fn file_id(url: &Url) -> Option<String> {
    let valid = |id: &String| ID_RE.is_match(id);

    let from_path = url
        .path_segments()
        .and_then(|mut segments| {
            segments.find(|s| *s == "d")?;
            segments.next().map(str::to_string)
        })
        .filter(valid);

    let from_query = || {
        url.query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .filter(valid)
    };

    from_path.or_else(from_query)
}
