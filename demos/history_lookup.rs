//! History lookup example
//!
//! This example demonstrates the core functionality of tor-exit-history:
//! - Configuring the archive source
//! - Cancelling a query on Ctrl+C
//! - Looking up every relay that used an exit IP over a range of months
//! - Mapping errors to exit statuses
//!
//! ```bash
//! cargo run --example history_lookup -- 2024-01 2024-03 185.241.208.232
//! ```

use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tor_exit_history::config::{Config, FetchConfig};
use tor_exit_history::{ExitListArchive, ToExitCode, cancel_on_shutdown_signal};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [start, end, ip] = args.as_slice() else {
        eprintln!("usage: history_lookup <start YYYY-MM> <end YYYY-MM> <ip>");
        return ExitCode::from(2);
    };

    // Monthly archives are large; allow slow mirrors more time
    let config = Config {
        fetch: FetchConfig {
            timeout: Duration::from_secs(300),
            ..Default::default()
        },
        ..Default::default()
    };

    let archive = match ExitListArchive::new(config) {
        Ok(archive) => archive,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    match archive.history(start, end, ip, &cancel).await {
        Ok(records) => {
            println!("{:<42} {:<21} {:<21}", "FINGERPRINT", "PUBLISHED", "LAST STATUS");
            for record in &records {
                println!(
                    "{:<42} {:<21} {:<21}",
                    record.fingerprint,
                    record.published.format("%Y-%m-%d %H:%M:%S"),
                    record.last_status.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            eprintln!("{} observations of {ip}", records.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error [{}]: {e}", e.error_code());
            ExitCode::from(e.exit_code())
        }
    }
}
