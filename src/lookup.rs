//! Run-level entry points
//!
//! [`ExitListArchive`] ties the stages together for one query: expand the
//! period range, provision an exclusive working directory, acquire every
//! archive, enumerate the extracted files and aggregate them. The working
//! directory is removed when the call returns, on success and on failure.

use crate::aggregate::{ip_history_view, most_recent_view};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::period::expand_periods;
use crate::pipeline::acquire_all;
use crate::sources::{SourceSet, enumerate_sources};
use crate::types::ExitNodeRecord;
use std::path::Path;
use tempfile::TempDir;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Queries over the published exit-list archives
///
/// # Example
/// ```no_run
/// use tor_exit_history::{Config, ExitListArchive};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> tor_exit_history::Result<()> {
/// let archive = ExitListArchive::new(Config::default())?;
/// let history = archive
///     .history("2024-01", "2024-02", "185.241.208.232", &CancellationToken::new())
///     .await?;
/// for record in history {
///     println!("{} {}", record.fingerprint, record.published);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ExitListArchive {
    config: Config,
    fetcher: Fetcher,
}

impl ExitListArchive {
    /// Validate `config` and build the HTTP client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Ok(Self { config, fetcher })
    }

    /// The configuration this archive was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Latest known record of every relay seen between `start` and `end`
    ///
    /// Both bounds are inclusive `YYYY-MM` tokens. Records are sorted by
    /// fingerprint.
    pub async fn now(
        &self,
        start: &str,
        end: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExitNodeRecord>> {
        let work_dir = self.acquire(start, end, cancel).await?;

        let mut records = aggregate(work_dir.path(), cancel, |sources| {
            most_recent_view(sources).map(|latest| latest.into_values().collect::<Vec<_>>())
        })
        .await?;
        records.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));

        info!(start, end, relays = records.len(), "most-recent lookup complete");
        Ok(records)
    }

    /// Every record between `start` and `end` that used `ip` as an exit address
    ///
    /// Newest month first; see [`ip_history_view`] for ordering within a file.
    pub async fn history(
        &self,
        start: &str,
        end: &str,
        ip: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExitNodeRecord>> {
        let work_dir = self.acquire(start, end, cancel).await?;

        let query = ip.to_string();
        let records = aggregate(work_dir.path(), cancel, move |sources| {
            ip_history_view(sources, &query)
        })
        .await?;

        info!(start, end, ip, matches = records.len(), "IP history lookup complete");
        Ok(records)
    }

    /// Expand the range and fetch every period into a fresh working directory
    async fn acquire(&self, start: &str, end: &str, cancel: &CancellationToken) -> Result<TempDir> {
        let periods = expand_periods(start, end)?;
        let work_dir = self.provision_work_dir()?;
        debug!(work_dir = ?work_dir.path(), periods = periods.len(), "provisioned working directory");

        acquire_all(&self.fetcher, &periods, work_dir.path(), cancel).await?;
        Ok(work_dir)
    }

    fn provision_work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.config.work.dir_prefix);

        match &self.config.work.temp_root {
            Some(root) => builder.tempdir_in(root).map_err(|e| {
                Error::local_io(format!("create working directory in {}", root.display()), root, e)
            }),
            None => builder.tempdir().map_err(|e| Error::LocalIo {
                context: "create working directory".into(),
                path: None,
                source: e,
            }),
        }
    }
}

/// Enumerate `work_dir` and run `view` over it on the blocking pool
async fn aggregate<T, F>(work_dir: &Path, cancel: &CancellationToken, view: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut SourceSet) -> Result<T> + Send + 'static,
{
    let work_dir = work_dir.to_path_buf();
    let cancel = cancel.clone();

    spawn_blocking(move || {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { stage: "enumerate" });
        }
        let mut sources = enumerate_sources(&work_dir)?;

        if cancel.is_cancelled() {
            sources.release();
            return Err(Error::Cancelled { stage: "aggregate" });
        }
        let result = view(&mut sources);
        sources.release();
        result
    })
    .await
    .map_err(|e| Error::TaskFailed(format!("aggregation task panicked: {}", e)))?
}
