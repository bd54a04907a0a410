//! Error types for the approval workflow

use crate::workflow::AdvanceReport;
use approval_types::{LinkedFamily, ReviewValidationError};
use thiserror::Error;

/// Main error type for all Maharat operations
#[derive(Error, Debug)]
pub enum MaharatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ReviewValidationError),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Another review already recorded this step for the object
    #[error("Step {order} of {family} {object_id} was already claimed")]
    OrderClaimed {
        family: LinkedFamily,
        object_id: u64,
        order: u32,
    },

    /// The back office refused the status update because the invoice's fiscal
    /// period has no main budget. Displays the back-office message verbatim.
    #[error("{message}")]
    NoMainBudget {
        message: String,
        partial: Option<Box<AdvanceReport>>,
    },
}

impl From<config::ConfigError> for MaharatError {
    fn from(e: config::ConfigError) -> Self {
        MaharatError::Config(e.to_string())
    }
}

/// Result type for Maharat operations
pub type Result<T> = std::result::Result<T, MaharatError>;
