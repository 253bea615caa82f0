//! Read-only file host for per-user upload directories.
//!
//! Files laid out as `root/<user_id>/<file_name>` are indexed once at startup
//! and served by identifier. The index is an immutable snapshot; an optional
//! watcher can build a replacement and swap it in.

pub mod config;
pub mod error;
pub mod handlers;
pub mod index;
pub mod lookup;
pub mod routes;
pub mod watch;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

pub use config::Config;
pub use error::{FileServerError, IndexError, LookupError};
pub use index::{FileEntry, FileIndex};
pub use lookup::FileLinks;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Uploads root the index was built from
    pub root_dir: PathBuf,
    /// Configuration
    pub config: Arc<Config>,
    /// Download link builder
    pub links: Arc<FileLinks>,
    index: Arc<RwLock<Arc<FileIndex>>>,
}

impl AppState {
    /// Create a new AppState with the given index and default config.
    pub fn new(root_dir: PathBuf, index: FileIndex) -> Self {
        Self::with_config(root_dir, index, Config::default())
    }

    /// Create a new AppState with the given index and config.
    pub fn with_config(root_dir: PathBuf, index: FileIndex, config: Config) -> Self {
        let links = FileLinks::new(config.base_url.as_deref(), &config.file_route_prefix);
        Self {
            root_dir,
            config: Arc::new(config),
            links: Arc::new(links),
            index: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// Current index snapshot. Holding it never blocks a swap.
    pub fn snapshot(&self) -> Arc<FileIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current snapshot with a freshly built one.
    pub fn replace_index(&self, index: FileIndex) {
        let next = Arc::new(index);
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}
