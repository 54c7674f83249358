//! Concurrent acquisition of a period range
//!
//! Each period is fetched and extracted by its own task into
//! `<work_dir>/<YYYY-MM>/`, so no two tasks write the same path. The first
//! failure wins: it cancels the remaining tasks through a child token, the set is
//! drained, and the error is returned once nothing is left running.

use crate::error::{Error, Result};
use crate::extraction::extract_archive;
use crate::fetch::Fetcher;
use crate::types::Period;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Fetch the archive for `period` and unpack it under `<work_dir>/<period>/`
///
/// `cancel` is checked before the fetch, before extraction and between tar
/// entries. A download in flight is not interrupted.
///
/// # Returns
/// The extracted regular files, in archive order.
pub async fn fetch_and_extract(
    fetcher: &Fetcher,
    period: Period,
    work_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { stage: "fetch" });
    }

    let period_dir = work_dir.join(period.to_string());
    tokio::fs::create_dir_all(&period_dir).await.map_err(|e| {
        Error::local_io(
            format!("create period directory {}", period_dir.display()),
            &period_dir,
            e,
        )
    })?;

    let archive = fetcher.fetch(period, &period_dir).await?;
    extract_archive(&archive, cancel).await
}

/// Fetch and extract every period concurrently, failing on the first error
///
/// All tasks are spawned before any is awaited. When one fails, its siblings are
/// cancelled at their next checkpoint and awaited; their outcomes are discarded.
///
/// # Returns
/// Total number of files extracted across all periods.
pub async fn acquire_all(
    fetcher: &Fetcher,
    periods: &[Period],
    work_dir: &Path,
    cancel: &CancellationToken,
) -> Result<usize> {
    let siblings = cancel.child_token();
    let mut tasks = JoinSet::new();

    for &period in periods {
        let fetcher = fetcher.clone();
        let work_dir = work_dir.to_path_buf();
        let token = siblings.clone();
        tasks.spawn(async move {
            fetch_and_extract(&fetcher, period, &work_dir, &token)
                .await
                .map(|files| (period, files.len()))
        });
    }

    info!(periods = periods.len(), ?work_dir, "acquiring exit-list archives");

    let mut first_error = None;
    let mut total_files = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| Error::TaskFailed(format!("acquisition task failed: {}", e)))
            .and_then(|result| result);

        match outcome {
            Ok((period, files)) => {
                total_files += files;
                debug!(%period, files, "period acquired");
            }
            Err(e) if first_error.is_none() => {
                error!(error = %e, "acquisition failed, cancelling remaining periods");
                siblings.cancel();
                first_error = Some(e);
            }
            Err(e) => {
                debug!(error = %e, "discarding sibling outcome after earlier failure");
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!(periods = periods.len(), files = total_files, "all periods acquired");
            Ok(total_files)
        }
    }
}
