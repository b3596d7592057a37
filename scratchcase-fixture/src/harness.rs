use anyhow::Result;
use scratchcase_core::{FixtureConfig, FixtureError, Identifier};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::config::load_config;
use crate::logging::init_logging;
use crate::manager::TemporaryDirectoryManager;
use crate::report::{FailureReporter, RecordedFailures, TeardownReport};

/// Result of one set-up / body / tear-down cycle.
pub struct CaseOutcome {
    pub failures: RecordedFailures,
    pub teardown: TeardownReport,
    panic: Option<Box<dyn Any + Send>>,
}

impl CaseOutcome {
    pub fn body_panicked(&self) -> bool {
        self.panic.is_some()
    }

    pub fn passed(&self) -> bool {
        !self.body_panicked() && self.failures.is_empty()
    }

    /// Resumes a panic from the body, otherwise panics when any failure was
    /// recorded.
    pub fn finish(self) {
        if let Some(payload) = self.panic {
            panic::resume_unwind(payload);
        }
        if !self.failures.is_empty() {
            panic!("{}", self.failures.summary());
        }
    }
}

/// Runs set-up, `body` and tear-down in order. Tear-down runs even when the
/// body returns an error or panics. Only a set-up failure is returned as an
/// error, since there is no directory to tear down in that case.
pub fn execute_case<F>(
    config: &FixtureConfig,
    identifier: &str,
    body: F,
) -> Result<CaseOutcome, FixtureError>
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    execute_identified_case(config, Identifier::new(identifier)?, body)
}

fn execute_identified_case<F>(
    config: &FixtureConfig,
    identifier: Identifier,
    body: F,
) -> Result<CaseOutcome, FixtureError>
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    let manager = TemporaryDirectoryManager::set_up_with_identifier(config, identifier)?;
    let mut failures = RecordedFailures::new();

    let panic = match panic::catch_unwind(AssertUnwindSafe(|| body(&manager))) {
        Ok(Ok(())) => None,
        Ok(Err(error)) => {
            failures.record_failure(format!("test body failed: {error:#}"));
            None
        }
        Err(payload) => Some(payload),
    };

    let teardown = manager.tear_down(&mut failures);
    Ok(CaseOutcome {
        failures,
        teardown,
        panic,
    })
}

/// Test entry point: runs `body` inside a fresh temporary directory named
/// after the calling test and fails the test on any recorded problem.
///
/// The name comes from the libtest thread running the test, so this panics
/// on the main thread (`harness = false` targets); use [`run_named_case`]
/// there.
///
/// ```no_run
/// use scratchcase_fixture::run_case;
///
/// run_case(|dir| {
///     let file = dir.path_for_temporary_item("out.txt");
///     std::fs::write(&file, "data")?;
///     dir.remove_temporary_item_at_path(&file)?;
///     Ok(())
/// });
/// ```
pub fn run_case<F>(body: F)
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    let identifier = match Identifier::for_current_thread() {
        Ok(identifier) => identifier,
        Err(error) => panic!("unable to name the temporary directory: {error}"),
    };
    run_identified_case(shared_config(), identifier, body);
}

pub fn run_named_case<F>(identifier: &str, body: F)
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    let identifier = match Identifier::new(identifier) {
        Ok(identifier) => identifier,
        Err(error) => panic!("temporary directory set-up failed: {error}"),
    };
    run_identified_case(shared_config(), identifier, body);
}

pub fn run_case_with_config<F>(config: &FixtureConfig, identifier: &str, body: F)
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    match Identifier::new(identifier) {
        Ok(identifier) => run_identified_case(config, identifier, body),
        Err(error) => panic!("temporary directory set-up failed: {error}"),
    }
}

fn run_identified_case<F>(config: &FixtureConfig, identifier: Identifier, body: F)
where
    F: FnOnce(&TemporaryDirectoryManager) -> Result<()>,
{
    // Another test in this binary may already own the global subscriber.
    let _ = init_logging(config);
    match execute_identified_case(config, identifier, body) {
        Ok(outcome) => outcome.finish(),
        Err(error) => panic!("temporary directory set-up failed: {error}"),
    }
}

/// `scratchcase.toml` for this test binary, read once. Loading may apply a
/// `.env` file to the process environment; other `run_case` callers block
/// until that is done instead of writing the environment again.
fn shared_config() -> &'static FixtureConfig {
    static CONFIG: OnceLock<Result<FixtureConfig, String>> = OnceLock::new();
    let config = CONFIG.get_or_init(|| load_config().map_err(|error| format!("{error:#}")));
    match config {
        Ok(config) => config,
        Err(error) => panic!("unable to load scratchcase config: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use scratchcase_core::FixtureError;
    use std::fs;

    use scratchcase_core::Identifier;
    use std::thread;

    use super::{execute_case, run_case, run_case_with_config, shared_config};
    use crate::manager::TemporaryDirectoryManager;
    use crate::report::RecordedFailures;
    use crate::test_support::{config_rooted_at, temp_root, write_file};

    fn identifier_on_thread(name: &str) -> Result<Identifier> {
        let identifier = thread::Builder::new()
            .name(name.to_string())
            .spawn(Identifier::for_current_thread)?
            .join()
            .map_err(|_| anyhow::anyhow!("naming thread panicked"))??;
        Ok(identifier)
    }

    #[test]
    fn execute_case_runs_tear_down_after_clean_body() -> Result<()> {
        let root = temp_root("harness_clean");
        let config = config_rooted_at(&root);

        let outcome = execute_case(&config, "clean", |dir| {
            assert!(dir.path().is_dir());
            Ok(())
        })?;

        assert!(outcome.passed());
        assert!(outcome.teardown.is_clean());
        assert!(!root.join("clean").exists());

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }

    #[test]
    fn execute_case_tears_down_after_body_panic() -> Result<()> {
        let root = temp_root("harness_panic");
        let config = config_rooted_at(&root);

        let outcome = execute_case(&config, "panicky", |dir| {
            write_file(&dir.path_for_temporary_item("half.txt"), "partial");
            panic!("body blew up");
        })?;

        assert!(outcome.body_panicked());
        assert!(!outcome.passed());
        assert_eq!(outcome.teardown.leftovers, vec!["half.txt"]);
        assert!(!root.join("panicky").exists());

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }

    #[test]
    fn execute_case_records_body_errors() -> Result<()> {
        let root = temp_root("harness_error");
        let config = config_rooted_at(&root);

        let outcome = execute_case(&config, "erroring", |dir| {
            dir.remove_temporary_item_at_path("/etc/passwd")?;
            Ok(())
        })?;

        assert!(!outcome.passed());
        assert_eq!(outcome.failures.messages().len(), 1);
        assert!(outcome.failures.messages()[0].contains("/etc/passwd"));
        assert!(outcome.teardown.is_clean());

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }

    #[test]
    fn execute_case_returns_set_up_failures() -> Result<()> {
        let root = temp_root("harness_setup");
        let mut config = config_rooted_at(&root);
        config.path_prefix = Some("/not/the/root".to_string());

        let result = execute_case(&config, "never", |_| Ok(()));

        assert!(matches!(result, Err(FixtureError::Setup { .. })));

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "was not empty")]
    fn run_case_fails_the_test_on_leftovers() {
        let root = temp_root("harness_leftover");
        let config = config_rooted_at(&root);

        run_case_with_config(&config, "leftover", |dir| {
            fs::write(dir.path_for_temporary_item("leftover.txt"), "oops")?;
            Ok(())
        });
    }

    #[test]
    fn run_case_names_the_directory_after_the_test() {
        run_case(|dir| {
            assert_eq!(
                dir.identifier().as_str(),
                "harness.tests.run_case_names_the_directory_after_the_test"
            );
            assert!(dir.path().is_dir());
            Ok(())
        });
    }

    #[test]
    fn distinct_test_paths_get_distinct_directories() -> Result<()> {
        let root = temp_root("harness_names");
        let config = config_rooted_at(&root);

        let dotted = TemporaryDirectoryManager::set_up_with_identifier(
            &config,
            identifier_on_thread("tests::a.b")?,
        )?;
        let data = dotted.path_for_temporary_item("data.txt");
        write_file(&data, "live");

        let underscored = TemporaryDirectoryManager::set_up_with_identifier(
            &config,
            identifier_on_thread("tests__a_b")?,
        )?;

        assert_ne!(dotted.path(), underscored.path());
        assert!(data.is_file());

        dotted.remove_temporary_item_at_path(&data)?;
        let mut failures = RecordedFailures::new();
        assert!(dotted.tear_down(&mut failures).is_clean());
        assert!(underscored.tear_down(&mut failures).is_clean());
        assert!(failures.is_empty(), "{:?}", failures.messages());

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }

    #[test]
    fn shared_config_is_loaded_once() {
        assert!(std::ptr::eq(shared_config(), shared_config()));
        assert_eq!(
            shared_config().namespace.as_deref(),
            Some("scratchcase-fixture")
        );
    }
}
