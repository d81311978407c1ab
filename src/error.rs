//! Error types for dataverse-semantic

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while retrieving metadata or exporting a model
#[derive(Error, Debug)]
pub enum DataverseError {
    #[error("Invalid argument `{name}`: {message}")]
    InvalidArgument { name: &'static str, message: String },

    #[error("Invalid environment URL: {url}")]
    InvalidEnvironmentUrl { url: String },

    #[error("Failed to build HTTP client")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed: {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend returned HTTP {status} for {url}: {body}")]
    BackendStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Solution '{unique_name}' not found")]
    SolutionNotFound { unique_name: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to start blocking runtime")]
    RuntimeInit {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write fragment to {path}")]
    ExportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read exported file {path}")]
    ExportRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write metadata dictionary to {path}")]
    DictionaryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read metadata dictionary {path}: {message}")]
    DictionaryRead { path: PathBuf, message: String },

    #[error("Failed to write settings to {path}")]
    SettingsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid relationship set: {}", .issues.join("; "))]
    InvalidRelationships { issues: Vec<String> },
}

pub type Result<T, E = DataverseError> = std::result::Result<T, E>;
