//! Error types for the depwatch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type. None of these errors is allowed to abort a commit: the
//! cascade downgrades probe failures to "no result" and the advisory step
//! downgrades to the static advice table.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Advisory(#[from] AdvisoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Probe errors
// ---------------------------------------------------------------------------

/// Errors raised while invoking a package manager CLI.
///
/// A nonzero exit status is never an error: managers exit nonzero when they
/// report dependency problems, and the captured output is still inspected.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The manager binary was not found on `$PATH`.
    #[error("binary not found: {0}")]
    BinaryNotFound(String),

    /// The process did not finish within the configured timeout.
    #[error("`{program}` timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// Spawning or waiting on the process failed.
    #[error("process I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Manifest errors
// ---------------------------------------------------------------------------

/// Errors from reading the package manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest at the expected location.
    #[error("manifest not found: {0}")]
    NotFound(String),

    /// The manifest is not valid JSON.
    #[error("manifest parse error in '{path}': {detail}")]
    ParseError { path: String, detail: String },

    /// Generic I/O error reading the manifest.
    #[error("manifest I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Advisory errors
// ---------------------------------------------------------------------------

/// Errors from the language-model advisory step.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("advisory HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider returned a non-success status code.
    #[error("advisory provider error (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    /// The provider answered but the body had no usable text.
    #[error("malformed advisory response: {0}")]
    MalformedResponse(String),

    /// The call did not complete within the configured timeout.
    #[error("advisory request timed out after {0}s")]
    Timeout(u64),

    /// No API key is configured for the selected provider.
    #[error("no API key configured (expected in ${0})")]
    MissingApiKey(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
