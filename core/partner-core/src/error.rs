//! Error types for partner-core operations.
//!
//! Most failure modes in this crate degrade locally (skip a tick, fall back to
//! defaults). The variants here cover the cases that must reach a caller.

use std::path::PathBuf;

/// All errors that can escape partner-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PartnerError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("State persistence failed: {path}: {details}")]
    Persist { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using PartnerError.
pub type Result<T> = std::result::Result<T, PartnerError>;
