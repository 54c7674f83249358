//! Test configuration helpers for pointing the archive at a mock collector

use std::path::Path;
use tempfile::TempDir;
use tor_exit_history::{Config, ExitListArchive, FetchConfig, WorkConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{archive_path, collector_bundle};

/// Config fetching from `server` and provisioning working directories under `temp_root`
pub fn mock_config(server: &MockServer, temp_root: &Path) -> Config {
    Config {
        fetch: FetchConfig {
            url_template: format!(
                "{}/archive/exit-lists/exit-list-{{period}}.tar.xz",
                server.uri()
            ),
            ..Default::default()
        },
        work: WorkConfig {
            temp_root: Some(temp_root.to_path_buf()),
            ..Default::default()
        },
    }
}

/// Create an archive backed by `server`
///
/// Returns the archive and the directory its working directories are created in
/// (keep it alive for the test duration).
pub fn mock_archive(server: &MockServer) -> (ExitListArchive, TempDir) {
    let temp_root = TempDir::new().unwrap();
    let archive = ExitListArchive::new(mock_config(server, temp_root.path())).unwrap();
    (archive, temp_root)
}

/// Serve a collector bundle holding one file per `(day, contents)` pair for `period`
pub async fn serve_period(server: &MockServer, period: &str, days: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(archive_path(period)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(collector_bundle(period, days)))
        .mount(server)
        .await;
}

/// Serve an arbitrary status and body for `period`
pub async fn serve_status(server: &MockServer, period: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(archive_path(period)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}
