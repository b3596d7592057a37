//! Per-test temporary directories.
//!
//! Each test gets a directory named after it under the temporary root. The
//! directory is recreated on set-up, every deletion requested through the
//! [`TemporaryDirectoryManager`] must stay inside it, and tear-down fails the
//! test when something was left behind before removing the directory anyway.

mod config;
mod harness;
mod logging;
mod manager;
mod paths;
mod report;
mod security;

#[cfg(test)]
mod test_support;

pub use config::{load_config, load_config_from, read_config};
pub use harness::{CaseOutcome, execute_case, run_case, run_case_with_config, run_named_case};
pub use logging::init_logging;
pub use manager::TemporaryDirectoryManager;
pub use paths::{CONFIG_FILE_NAME, config_path_from};
pub use report::{FailureReporter, RecordedFailures, TeardownReport};
pub use scratchcase_core::{FixtureConfig, FixtureError, Identifier, LoggingConfig, resolve};
pub use security::is_valid_temporary_directory;
pub use url::Url;
