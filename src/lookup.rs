//! Read-only queries against a [`FileIndex`] snapshot.

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::LookupError;
use crate::index::{FileEntry, FileIndex};

/// Builds the public download URL for an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLinks {
    base_url: Option<String>,
    route_prefix: String,
}

impl FileLinks {
    pub fn new(base_url: Option<&str>, route_prefix: &str) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        let route_prefix = format!("/{}", route_prefix.trim_matches('/'));
        Self {
            base_url,
            route_prefix,
        }
    }

    /// `{base}{prefix}/{identifier}`, or a relative path without a base URL.
    pub fn url_for(&self, identifier: &str) -> String {
        let prefix = self.route_prefix.trim_end_matches('/');
        match &self.base_url {
            Some(base) => format!("{base}{prefix}/{identifier}"),
            None => format!("{prefix}/{identifier}"),
        }
    }
}

impl Default for FileLinks {
    fn default() -> Self {
        Self::new(None, "/file")
    }
}

/// One row of the `/files` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListing {
    pub identifier: String,
    pub user_id: String,
    pub file_name: String,
    pub url: String,
}

/// List every entry in index order.
pub fn list_all(index: &FileIndex, links: &FileLinks) -> Vec<FileListing> {
    index
        .iter()
        .map(|entry| FileListing {
            identifier: entry.identifier.clone(),
            user_id: entry.user_id.clone(),
            file_name: entry.file_name.clone(),
            url: links.url_for(&entry.identifier),
        })
        .collect()
}

/// Resolve an identifier to an entry whose file still exists.
///
/// An existence probe that fails for other reasons is not reported here; the
/// caller surfaces it when opening the file.
pub async fn get<'a>(
    index: &'a FileIndex,
    identifier: &str,
) -> Result<&'a FileEntry, LookupError> {
    let Some(entry) = index.get(identifier) else {
        debug!("Unknown identifier: {}", identifier);
        return Err(LookupError::UnknownIdentifier);
    };

    if matches!(fs::try_exists(&entry.absolute_path).await, Ok(false)) {
        warn!(
            "Indexed file missing on disk: {} ({})",
            entry.absolute_path.display(),
            identifier
        );
        return Err(LookupError::MissingOnDisk);
    }

    Ok(entry)
}
