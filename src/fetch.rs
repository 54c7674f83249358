//! Archive fetching over HTTP(S)
//!
//! One GET per period, streamed into a file named after the URL's last path segment.
//! No retry: a failed fetch fails the batch it belongs to.

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::types::Period;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Maximum number of response body bytes kept for diagnostics on non-2xx responses
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Downloads exit-list archives into a working directory
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Build a fetcher with its own HTTP client
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self { client, config })
    }

    /// The archive URL for `period`
    pub fn url_for(&self, period: Period) -> String {
        self.config.url_for(&period.to_string())
    }

    /// Fetch the archive for `period` into `dir`, returning the written file's path
    pub async fn fetch(&self, period: Period, dir: &Path) -> Result<PathBuf> {
        let url = self.url_for(period);
        let file_name = archive_file_name(&url).unwrap_or_else(|| format!("{period}.tar.xz"));
        self.fetch_to(&url, &dir.join(file_name)).await
    }

    /// Fetch `url` into `dest`
    ///
    /// The destination is created (truncated) only once a 2xx response has arrived.
    /// A failed body transfer leaves the partial file in place for the caller's
    /// working-directory teardown.
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        debug!(url, ?dest, "requesting archive");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!(
                    "timeout (exceeded {} seconds)",
                    self.config.timeout.as_secs()
                )
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            Error::Transport {
                url: url.to_string(),
                status: None,
                body_excerpt: None,
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_excerpt = response
                .text()
                .await
                .ok()
                .map(|body| excerpt(&body, BODY_EXCERPT_LIMIT))
                .filter(|body| !body.is_empty());
            return Err(Error::Transport {
                url: url.to_string(),
                status: Some(status.as_u16()),
                body_excerpt,
                reason: format!("server returned {}", status),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::local_io(format!("create {}", dest.display()), dest, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            status: Some(status.as_u16()),
            body_excerpt: None,
            reason: format!("failed to read response body: {}", e),
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::local_io(format!("write {}", dest.display()), dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| Error::local_io(format!("flush {}", dest.display()), dest, e))?;

        info!(url, ?dest, bytes = written, "archive fetched");
        Ok(dest.to_path_buf())
    }
}

/// Last non-empty path segment of `url`, if any
pub fn archive_file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Truncate `body` to at most `limit` bytes on a char boundary
fn excerpt(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
