//! Error types for samwise.
//!
//! All fallible operations return [`Result`], whose error type is
//! [`SamwiseError`]. Every variant records the source location that created
//! it (`src_path`/`src_line`), which the [`err!`](crate::err) macro fills in.
//!
//! # Error Categories
//!
//! - **IO errors**: reading and rewriting configuration files, writing reports
//! - **Git errors**: remote inspection, cloning, authentication, timeouts
//! - **Config errors**: invalid configuration files or unsupported values
//!
//! Module-level failures (a repository that cannot be reached) are collected
//! into the failure report and never abort a run. Configuration failures do.
//!
//! # Example
//!
//! ```rust
//! use samwise::error::{Result, SamwiseError};
//!
//! fn read_module(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).map_err(|e| SamwiseError::Io {
//!         path: path.into(),
//!         source: e,
//!         src_path: file!(),
//!         src_line: line!(),
//!     })
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Usage:
/// ```ignore
/// return Err(err!(ConfigValue { key: "output.format".to_string(), message: "unsupported".to_string() }));
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident: $value:expr),* $(,)? }) => {
        $crate::error::SamwiseError::$variant {
            $($field: $value,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for samwise operations.
pub type Result<T> = std::result::Result<T, SamwiseError>;

/// The main error type for samwise.
#[derive(Error, Debug)]
pub enum SamwiseError {
    // =========================================================================
    // I/O and File System Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Directory not found.
    #[error("Directory not found: {path} ({src_path}:{src_line})")]
    DirectoryNotFound {
        /// The missing directory path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// HCL parsing error.
    #[error("Failed to parse HCL in '{file}' \n\t({src_path}:{src_line}): {message}")]
    HclParse {
        /// The file being parsed
        file: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Git Errors
    // =========================================================================
    /// Git authentication error.
    #[error("Git authentication failed for '{url}' ({src_path}:{src_line}): {message}")]
    GitAuth {
        /// The repository URL
        url: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Git clone or remote inspection error.
    #[error("Failed to clone repository '{url}' ({src_path}:{src_line}): {message}")]
    GitClone {
        /// The repository URL
        url: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Clone or inspection exceeded its deadline.
    #[error("Timed out after {seconds}s while contacting '{url}' ({src_path}:{src_line})")]
    GitTimeout {
        /// The repository URL
        url: String,
        /// Configured deadline in seconds
        seconds: u64,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid Git URL.
    #[error("Invalid Git URL '{url}' ({src_path}:{src_line}): {message}")]
    InvalidGitUrl {
        /// The invalid URL
        url: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Report generation error.
    #[error("Failed to generate report ({src_path}:{src_line}): {message}")]
    ReportGeneration {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },
}

impl SamwiseError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, src_path: &'static str, src_line: u32) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Creates a `ConfigParse` error.
    #[must_use]
    pub fn config_parse(message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>, src_path: &'static str, src_line: u32) -> Self {
        Self::ConfigParse { message, source, src_path, src_line }
    }

    /// Returns true for the failures that stop a single repository from being
    /// reached: bad URL, rejected credentials, transport failure, deadline.
    #[must_use]
    pub fn is_clone_failure(&self) -> bool {
        matches!(
            self,
            Self::GitClone { .. } | Self::GitAuth { .. } | Self::GitTimeout { .. } | Self::InvalidGitUrl { .. }
        )
    }

    /// Determines if the error is recoverable (the run continues with the next module).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_clone_failure() || matches!(self, Self::HclParse { .. })
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::DirectoryNotFound { .. } => 15,
            Self::GitAuth { .. } => 16,
            Self::GitClone { .. } | Self::GitTimeout { .. } | Self::InvalidGitUrl { .. } => 17,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } => 19,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for SamwiseError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source,
            src_path: file!(),
            src_line: line!(),
        }
    }
}

impl From<serde_json::Error> for SamwiseError {
    fn from(source: serde_json::Error) -> Self {
        Self::ReportGeneration {
            message: format!("JSON serialization error: {source}"),
            src_path: file!(),
            src_line: line!(),
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_clone_failure_family() {
        let timeout = crate::err!(GitTimeout { url: "git@github.com:org/repo.git".to_string(), seconds: 5 });
        assert!(timeout.is_clone_failure());
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.exit_code(), 17);

        let auth = crate::err!(GitAuth { url: "https://x".to_string(), message: "denied".to_string() });
        assert!(auth.is_clone_failure());
        assert_eq!(auth.exit_code(), 16);
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let e = crate::err!(ConfigValue { key: "output.format".to_string(), message: "pdf".to_string() });
        assert!(!e.is_recoverable());
        assert_eq!(e.exit_code(), 19);
    }

    #[test]
    fn test_error_carries_source_location() {
        let e = crate::err!(Internal { message: "boom".to_string() });
        let text = e.to_string();
        assert!(text.contains("error.rs"));
        assert!(text.contains("boom"));
    }
}
