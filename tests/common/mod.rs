//! Common test utilities for tor-exit-history integration tests

#[allow(dead_code)]
pub mod config;

#[allow(unused_imports)]
pub use assertions::*;
pub use config::*;
#[allow(unused_imports)]
pub use fixtures::*;
