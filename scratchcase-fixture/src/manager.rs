use scratchcase_core::{
    FixtureConfig, FixtureError, Identifier, has_parent_traversal, has_path_prefix,
    is_strictly_below_prefix, is_within_directory, resolve,
};
use std::fs;
use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::report::{FailureReporter, TeardownReport};
use crate::security::{
    entry_exists, has_symlinked_ancestor, is_valid_temporary_directory, list_entries,
    safely_remove_temporary_item,
};

/// Owns one test's temporary directory from set-up to tear-down.
///
/// All deletions requested through the manager are confined to the managed
/// directory, and the directory is expected to be empty again when
/// [`TemporaryDirectoryManager::tear_down`] runs.
#[derive(Debug)]
pub struct TemporaryDirectoryManager {
    identifier: Identifier,
    path: PathBuf,
    url: Url,
    path_prefix: String,
    alias_prefix: String,
}

impl TemporaryDirectoryManager {
    /// Creates the managed directory for `identifier`, clearing a stale one
    /// left behind by an earlier run that never reached tear-down.
    pub fn set_up(config: &FixtureConfig, identifier: &str) -> Result<Self, FixtureError> {
        Self::set_up_with_identifier(config, Identifier::new(identifier)?)
    }

    pub fn set_up_with_identifier(
        config: &FixtureConfig,
        identifier: Identifier,
    ) -> Result<Self, FixtureError> {
        let path = config.managed_directory_path(&identifier)?;
        let path_prefix = config.path_prefix();

        if !is_strictly_below_prefix(&path, &path_prefix) {
            return Err(setup_error(
                &path,
                format!("directory is not below the temporary prefix {path_prefix}"),
                None,
            ));
        }

        if entry_exists(&path) {
            safely_remove_temporary_item(&path, &path_prefix).map_err(|error| {
                setup_error(&path, "unable to clear a stale directory".to_string(), Some(error))
            })?;
            tracing::warn!(
                path = %path.display(),
                "a temporary directory had to be cleaned up"
            );
        }

        fs::create_dir_all(&path).map_err(|error| {
            setup_error(
                &path,
                "unable to create the directory".to_string(),
                Some(FixtureError::filesystem("create directory", &path, error)),
            )
        })?;
        if !is_valid_temporary_directory(&path) {
            return Err(setup_error(&path, "path is not a directory".to_string(), None));
        }

        let url = Url::from_directory_path(&path).map_err(|()| {
            setup_error(&path, "path cannot be expressed as a file url".to_string(), None)
        })?;

        tracing::debug!(
            identifier = %identifier,
            path = %path.display(),
            "temporary directory ready"
        );

        Ok(Self {
            identifier,
            path,
            url,
            path_prefix,
            alias_prefix: config.alias_prefix().to_string(),
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Joins `component` onto the managed directory. Root and drive prefixes
    /// in `component` are dropped so the result stays under the directory.
    pub fn path_for_temporary_item(&self, component: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = component
            .as_ref()
            .components()
            .filter(|part| !matches!(part, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.path.join(relative)
    }

    pub fn url_for_temporary_item(&self, component: impl AsRef<Path>) -> Url {
        let path = self.path_for_temporary_item(component);
        Url::from_file_path(&path).unwrap_or_else(|()| self.url.clone())
    }

    pub fn remove_temporary_item_with_component(
        &self,
        component: impl AsRef<Path>,
    ) -> Result<(), FixtureError> {
        self.remove_temporary_item_at_path(self.path_for_temporary_item(component))
    }

    pub fn remove_temporary_item_at_url(&self, url: &Url) -> Result<(), FixtureError> {
        let path = url.to_file_path().map_err(|()| FixtureError::InvalidUrl {
            url: url.to_string(),
        })?;
        self.remove_temporary_item_at_path(path)
    }

    pub fn remove_temporary_item_at_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), FixtureError> {
        let path = path.as_ref();
        if !is_within_directory(path, &self.path)
            || has_parent_traversal(path)
            || has_symlinked_ancestor(path, &self.path)
        {
            return Err(FixtureError::Containment {
                path: path.to_path_buf(),
                root: self.path.clone(),
            });
        }
        safely_remove_temporary_item(path, &self.path_prefix)
    }

    /// Whether `path` carries the canonical temporary prefix, after
    /// rewriting an alias-prefixed form.
    pub fn is_temporary_item_at_path(&self, path: impl AsRef<Path>) -> bool {
        let resolved = self.resolve(&path.as_ref().to_string_lossy());
        has_path_prefix(Path::new(&resolved), &self.path_prefix)
    }

    pub fn is_temporary_item_at_url(&self, url: &Url) -> bool {
        match url.to_file_path() {
            Ok(path) => self.is_temporary_item_at_path(path),
            Err(()) => false,
        }
    }

    /// Normalizes a path reported by the OS with the alias prefix.
    pub fn resolve(&self, path: &str) -> String {
        resolve(path, &self.path_prefix, &self.alias_prefix)
    }

    /// Checks the hygiene invariant and removes the directory. Problems are
    /// sent to `reporter`; removal is attempted even when the directory was
    /// left dirty.
    pub fn tear_down(self, reporter: &mut dyn FailureReporter) -> TeardownReport {
        let mut report = TeardownReport {
            path: self.path.clone(),
            leftovers: Vec::new(),
            absent: false,
        };

        if is_valid_temporary_directory(&self.path) {
            match list_entries(&self.path) {
                Ok(entries) if !entries.is_empty() => {
                    tracing::warn!(
                        path = %self.path.display(),
                        leftovers = ?entries,
                        "a temporary directory was not empty during tear down"
                    );
                    reporter.record_failure(format!(
                        "temporary directory {} was not empty: {}",
                        self.path.display(),
                        entries.join(", ")
                    ));
                    report.leftovers = entries;
                }
                Ok(_) => {}
                Err(error) => reporter.record_failure(format!(
                    "unable to inspect temporary directory before removal: {error}"
                )),
            }

            if let Err(error) = safely_remove_temporary_item(&self.path, &self.path_prefix) {
                reporter.record_failure(format!(
                    "failed to clean up temporary directory {}: {error}",
                    self.path.display()
                ));
            }
        } else {
            reporter.record_failure(format!(
                "temporary directory {} is not a valid directory at tear down",
                self.path.display()
            ));
        }

        if entry_exists(&self.path) {
            reporter.record_failure(format!(
                "temporary directory {} still exists after tear down",
                self.path.display()
            ));
        } else {
            report.absent = true;
        }

        report
    }
}

fn setup_error(path: &Path, reason: String, source: Option<FixtureError>) -> FixtureError {
    FixtureError::Setup {
        path: path.to_path_buf(),
        reason,
        source: source.map(Box::new),
    }
}
