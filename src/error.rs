//! Error types for tor-exit-history
//!
//! This module provides the error taxonomy for the whole crate, including:
//! - Period expansion errors (bad `YYYY-MM` tokens, inverted ranges)
//! - Fetch errors (transport failures and local I/O)
//! - Archive errors, qualified by the stage that rejected the input
//! - Record parsing errors, qualified by the offending field
//! - A stable mapping to machine-readable codes and process exit statuses

use crate::types::Period;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tor-exit-history operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tor-exit-history
///
/// Every component fails fast and surfaces the first error it hits, wrapped with
/// enough context (operation, path, field) to diagnose without re-running.
#[derive(Debug, Error)]
pub enum Error {
    /// A period token could not be parsed as `YYYY-MM`
    #[error("invalid period {input:?}: {reason}")]
    InvalidDateFormat {
        /// The rejected input
        input: String,
        /// Why the input was rejected
        reason: &'static str,
    },

    /// The start period is chronologically after the end period
    #[error("start period {start} is after end period {end}")]
    RangeInverted {
        /// First period of the requested range
        start: Period,
        /// Last period of the requested range
        end: Period,
    },

    /// Connection failure, timeout, or non-2xx response
    #[error("transport error fetching {url}: {reason}")]
    Transport {
        /// The URL that was requested
        url: String,
        /// Response status, when a response was received
        status: Option<u16>,
        /// Leading part of the response body, when one could be read
        body_excerpt: Option<String>,
        /// Human-readable description of the failure
        reason: String,
    },

    /// Local filesystem failure (create, write, read, walk, remove)
    #[error("I/O error during {context}: {source}")]
    LocalIo {
        /// The operation that failed, e.g. "create archive file"
        context: String,
        /// The path involved, when there is one
        path: Option<PathBuf>,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be decompressed or unpacked
    #[error("corrupt archive {archive} ({stage}): {reason}")]
    CorruptArchive {
        /// The compressed archive that was rejected
        archive: PathBuf,
        /// Which stage rejected it
        stage: ArchiveStage,
        /// Description of the failure
        reason: String,
    },

    /// A record line carried a malformed field
    #[error("field {field} parse error at line {line}: {source}")]
    FieldParse {
        /// The directive whose value was malformed
        field: Field,
        /// 1-based line number within the source stream
        line: usize,
        /// Underlying failure
        #[source]
        source: FieldError,
    },

    /// Cancellation was observed before a stage started
    #[error("cancelled before {stage}")]
    Cancelled {
        /// The stage that was skipped
        stage: &'static str,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "url_template")
        key: Option<String>,
    },

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Build a [`Error::LocalIo`] for an operation on `path`
    pub fn local_io(
        context: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::LocalIo {
            context: context.into(),
            path: Some(path.into()),
            source,
        }
    }
}

/// Stage of archive processing that rejected the input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveStage {
    /// The xz decompression stage
    Compression,
    /// The tar unpacking stage
    Tar,
}

impl ArchiveStage {
    /// Reason code reported for this stage
    pub fn reason_code(&self) -> &'static str {
        match self {
            ArchiveStage::Compression => "compression",
            ArchiveStage::Tar => "tar",
        }
    }
}

impl fmt::Display for ArchiveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason_code())
    }
}

/// Record directive that carries a parseable value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// `ExitNode <fingerprint>`
    ExitNode,
    /// `Published <date> <time>`
    Published,
    /// `LastStatus <date> <time>`
    LastStatus,
    /// `ExitAddress <ip> <date> <time>`
    ExitAddress,
}

impl Field {
    /// The directive key as it appears in the source
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ExitNode => "ExitNode",
            Field::Published => "Published",
            Field::LastStatus => "LastStatus",
            Field::ExitAddress => "ExitAddress",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field value was rejected
#[derive(Debug, Error)]
pub enum FieldError {
    /// The timestamp tokens did not form a `YYYY-MM-DD HH:MM:SS` value
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        /// The rejected timestamp text
        value: String,
        /// Underlying chrono error
        #[source]
        source: chrono::ParseError,
    },

    /// The line ended before a required token
    #[error("missing {0}")]
    MissingToken(&'static str),

    /// The line carries a record key but is not valid UTF-8
    #[error("not valid UTF-8: {0}")]
    Encoding(#[source] std::str::Utf8Error),
}

/// Map errors to process exit statuses for command-line callers
///
/// Callers print the error on stderr and exit with [`exit_code`](ToExitCode::exit_code),
/// keeping stdout clean for redirection.
pub trait ToExitCode {
    /// Non-zero process exit status for this error
    fn exit_code(&self) -> u8;

    /// Machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> u8 {
        match self {
            // 2 - caller supplied bad input
            Error::InvalidDateFormat { .. } => 2,
            Error::RangeInverted { .. } => 2,
            Error::Config { .. } => 2,

            // 3 - upstream archive unreachable
            Error::Transport { .. } => 3,

            // 4 - local filesystem
            Error::LocalIo { .. } => 4,

            // 5/6 - upstream data unusable
            Error::CorruptArchive { .. } => 5,
            Error::FieldParse { .. } => 6,

            // 130 - interrupted, shell convention for SIGINT
            Error::Cancelled { .. } => 130,

            Error::TaskFailed(_) => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidDateFormat { .. } => "invalid_date_format",
            Error::RangeInverted { .. } => "range_inverted",
            Error::Transport { .. } => "transport_error",
            Error::LocalIo { .. } => "local_io_error",
            Error::CorruptArchive { stage, .. } => match stage {
                ArchiveStage::Compression => "corrupt_archive_compression",
                ArchiveStage::Tar => "corrupt_archive_tar",
            },
            Error::FieldParse { .. } => "field_parse_error",
            Error::Cancelled { .. } => "cancelled",
            Error::Config { .. } => "config_error",
            Error::TaskFailed(_) => "task_failed",
        }
    }
}
