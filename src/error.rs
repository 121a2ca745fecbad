//! Error types for the shikaku toolbox.
//!
//! Uses `thiserror` for structured error definitions that keep the
//! different failure causes of the loader distinguishable by callers.

use thiserror::Error;

/// Error type for Aozora Bunko loading operations.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Author or work identifier is not a positive integer
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The card page lists no ZIP archive for the requested work
    #[error("No ZIP archive for work {work_id} found in {card_url}")]
    Resolution { card_url: String, work_id: u32 },

    /// HTTP request failed (DNS, timeout, non-success status)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction or joining failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The fetched bytes are not a readable ZIP archive
    #[error("Failed to read ZIP archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive contains no text member
    #[error("Text file not found in {archive}")]
    TextFileNotFound { archive: String },

    /// Reading an archive member failed
    #[error("Failed to read archive member: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing decodable was found in the text member
    #[error("Failed to decode text: {0}")]
    Decode(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}
