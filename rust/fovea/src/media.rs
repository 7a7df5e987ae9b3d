//! Media URL resolution.
//!
//! A view row's `url` is joined with the dataset's `media/` directory:
//! urls that already carry a scheme pass through as remote references,
//! scheme-less relative paths join onto the local media directory. Urls
//! must be clean, with no traversal sequences, and a relative url is a
//! fatal read error when the dataset has no media directory to resolve
//! against.

use std::path::{Path, PathBuf};

use url::Url;

use fovea_common::{Result, error::Error};

/// A resolved media reference.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaUrl {
    /// A file under the dataset's media directory.
    Local(PathBuf),
    /// A fully qualified remote object (http, s3, ...).
    Remote(Url),
}

impl MediaUrl {
    pub fn as_local(&self) -> Option<&Path> {
        match self {
            MediaUrl::Local(path) => Some(path),
            MediaUrl::Remote(_) => None,
        }
    }
}

/// Resolves a view url against a dataset's media directory.
pub fn resolve_media_url(media_dir: &Path, media_url: &str) -> Result<MediaUrl> {
    if media_url.is_empty() {
        return Err(Error::media_url_unresolved(media_url, "url is empty"));
    }
    if media_url.split('/').any(|segment| segment == "..") {
        return Err(Error::media_url_unresolved(
            media_url,
            "url contains a path traversal sequence",
        ));
    }
    if let Ok(url) = Url::parse(media_url) {
        return Ok(MediaUrl::Remote(url));
    }
    if !media_dir.is_dir() {
        return Err(Error::media_url_unresolved(
            media_url,
            format!(
                "url has no scheme and media directory '{}' does not exist",
                media_dir.display()
            ),
        ));
    }
    let relative = media_url.trim_start_matches('/');
    Ok(MediaUrl::Local(media_dir.join(relative)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemed_urls_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_media_url(dir.path(), "s3://bucket/key/item.jpg").unwrap();
        assert!(matches!(resolved, MediaUrl::Remote(_)));
        let resolved = resolve_media_url(dir.path(), "https://host/item.jpg").unwrap();
        assert!(matches!(resolved, MediaUrl::Remote(_)));
    }

    #[test]
    fn relative_urls_join_the_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_media_url(dir.path(), "train/item_0.jpg").unwrap();
        assert_eq!(
            resolved.as_local(),
            Some(dir.path().join("train/item_0.jpg").as_path())
        );
    }

    #[test]
    fn relative_url_without_media_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = resolve_media_url(&missing, "train/item_0.jpg").unwrap_err();
        assert!(matches!(
            err.kind(),
            fovea_common::error::ErrorKind::MediaUrlUnresolved { .. }
        ));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_media_url(dir.path(), "../../etc/passwd").is_err());
        assert!(resolve_media_url(dir.path(), "").is_err());
    }
}
