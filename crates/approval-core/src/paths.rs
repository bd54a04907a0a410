/// Path constants and utilities for the review inbox
use std::path::PathBuf;
use once_cell::sync::OnceCell;

// Static storage for configurable reviews root
static REVIEWS_ROOT: OnceCell<String> = OnceCell::new();

// Default root constants
pub const DEFAULT_REVIEWS_ROOT: &str = "/data/reviews";
pub const APP_ROOT: &str = "/app";

// Directory names (relative to roots)
pub const PENDING_DIR_NAME: &str = "pending";
pub const PROCESSED_DIR_NAME: &str = "processed";
pub const FAILED_DIR_NAME: &str = "failed";

// App subdirectories
pub const CONFIG_DIR_NAME: &str = "config";
pub const CONFIG_FILE_NAME: &str = "maharat.json";

/// Initialize the reviews root directory. Can only be called once.
/// If not called, the default `/data/reviews` will be used.
pub fn init_reviews_root(path: String) -> Result<(), String> {
    REVIEWS_ROOT.set(path).map_err(|_| "Reviews root already initialized".to_string())
}

fn get_reviews_root() -> &'static str {
    REVIEWS_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_REVIEWS_ROOT)
}

// Path builder functions
pub fn reviews_root() -> PathBuf {
    PathBuf::from(get_reviews_root())
}

pub fn config_path() -> PathBuf {
    PathBuf::from(APP_ROOT).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// File name of a queued review request
pub fn review_file_name(request_id: &uuid::Uuid) -> String {
    format!("review_{}.json", request_id)
}
