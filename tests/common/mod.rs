//! Test utilities and common setup.

use std::path::Path;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use tempfile::TempDir;
use uploads_host::{routes, AppState, Config, FileIndex};

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Index `root` and wrap it in a router with the given config.
pub fn app_for(root: &Path, config: Config) -> (Router, AppState) {
    let index = FileIndex::build(root).unwrap();
    let state = AppState::with_config(root.to_path_buf(), index, config);
    (routes::create_router(state.clone()), state)
}

/// Create a test application over a temp uploads tree.
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub fn test_app(files: &[(&str, &str)]) -> (Router, AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    for (relative, contents) in files {
        write_file(temp_dir.path(), relative, contents);
    }
    let (app, state) = app_for(temp_dir.path(), Config::default());
    (app, state, temp_dir)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::GET)
        .body(Body::empty())
        .unwrap()
}
