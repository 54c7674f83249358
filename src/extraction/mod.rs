//! Archive extraction
//!
//! Exit lists are published as `.tar.xz` bundles. Extraction decompresses and
//! unpacks a bundle into its own parent directory and removes the bundle once the
//! whole tree is on disk. Failures are reported with the stage that rejected the
//! input: `compression` for the xz layer, `tar` for the archive layer.

mod tar_xz;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use tar_xz::TarXzExtractor;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Extract a fetched archive in place on the blocking pool
///
/// # Arguments
/// * `archive_path` - Path to the `.tar.xz` file; its parent receives the tree
/// * `cancel` - Checked before starting and before every tar entry
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - Regular files written, in archive order
/// * `Err(Error)` - `Cancelled`, `CorruptArchive` (compression or tar), or `LocalIo`
///
/// # Example
/// ```no_run
/// use tor_exit_history::extraction::extract_archive;
/// use tokio_util::sync::CancellationToken;
/// use std::path::Path;
///
/// # async fn example() -> tor_exit_history::error::Result<()> {
/// let files = extract_archive(
///     Path::new("/tmp/work/2024-01/exit-list-2024-01.tar.xz"),
///     &CancellationToken::new(),
/// )
/// .await?;
/// println!("Extracted {} files", files.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract_archive(
    archive_path: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { stage: "extract" });
    }

    info!(?archive_path, "extracting archive");

    let archive_path_owned = archive_path.to_path_buf();
    let cancel_owned = cancel.clone();
    spawn_blocking(move || TarXzExtractor::try_extract(&archive_path_owned, &cancel_owned))
        .await
        .map_err(|e| Error::TaskFailed(format!("extraction task panicked: {}", e)))?
}
