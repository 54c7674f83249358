//! # tor-exit-history
//!
//! Historical lookups over the Tor Project's published exit-list archives.
//!
//! ## Design Philosophy
//!
//! tor-exit-history is designed to be:
//! - **Library-first** - No CLI or output formatting, purely a Rust crate for embedding
//! - **All or nothing** - Any failure in any stage fails the whole query
//! - **Chronological** - Sources are ordered by the month they belong to, never by
//!   whatever order the filesystem walks them in
//!
//! ## Pipeline
//!
//! A query covers an inclusive range of months. Each month's `.tar.xz` archive is
//! fetched and extracted concurrently into its own directory, the extracted exit
//! lists are enumerated in chronological order, and one of two views is built:
//!
//! - **most recent**: the latest record of every relay ([`ExitListArchive::now`])
//! - **IP history**: every record that used a given exit IP, newest month first
//!   ([`ExitListArchive::history`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use tor_exit_history::{Config, ExitListArchive, cancel_on_shutdown_signal};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let archive = ExitListArchive::new(Config::default())?;
//!
//!     // Ctrl+C skips the remaining stages
//!     let cancel = CancellationToken::new();
//!     tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
//!
//!     for record in archive.now("2024-01", "2024-01", &cancel).await? {
//!         println!("{} last seen {}", record.fingerprint, record.last_status);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Most-recent and IP-history views
pub mod aggregate;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Archive fetching
pub mod fetch;
/// Run-level query facade
pub mod lookup;
/// Exit-list record parsing
pub mod parser;
/// Month range expansion
pub mod period;
/// Concurrent fetch and extract
pub mod pipeline;
/// Source file enumeration
pub mod sources;
/// Core data types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::{Config, FetchConfig, WorkConfig};
pub use error::{ArchiveStage, Error, Field, FieldError, Result, ToExitCode};
pub use lookup::ExitListArchive;
pub use types::{ExitAddress, ExitNodeRecord, Period};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// Stages already running finish; the next cancellation checkpoint skips the
/// rest of the query.
///
/// - **Unix:** listens for SIGTERM and Ctrl+C, or Ctrl+C alone if SIGTERM cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns early, without waiting for a signal, if `token` is cancelled by
/// someone else first.
pub async fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, cancelling query");
                }
                _ = wait_for_ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

/// Resolve on Ctrl+C; never resolves if the handler cannot be installed
async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, cancelling query"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
