use scratchcase_core::{FixtureError, has_parent_traversal, is_strictly_below_prefix};
use std::fs;
use std::path::{Path, PathBuf};

/// Removes `path` recursively, but only when it sits below the canonical
/// temporary prefix. Every deletion in the crate goes through here.
pub(crate) fn safely_remove_temporary_item(path: &Path, prefix: &str) -> Result<(), FixtureError> {
    if !is_strictly_below_prefix(path, prefix) || has_parent_traversal(path) {
        return Err(FixtureError::Containment {
            path: path.to_path_buf(),
            root: PathBuf::from(prefix),
        });
    }

    let metadata = fs::symlink_metadata(path)
        .map_err(|error| FixtureError::filesystem("inspect", path, error))?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
            .map_err(|error| FixtureError::filesystem("remove directory", path, error))?;
    } else {
        fs::remove_file(path)
            .map_err(|error| FixtureError::filesystem("remove file", path, error))?;
    }
    tracing::debug!(path = %path.display(), "removed temporary item");
    Ok(())
}

pub fn is_valid_temporary_directory(path: &Path) -> bool {
    path.is_dir()
}

/// Whether a directory between `dir` and `path`, both exclusive, is a
/// symlink. The final component may be one; it is unlinked, not followed.
pub(crate) fn has_symlinked_ancestor(path: &Path, dir: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(dir) else {
        return false;
    };
    let mut current = dir.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if fs::symlink_metadata(&current).is_ok_and(|metadata| metadata.file_type().is_symlink())
        {
            return true;
        }
    }
    false
}

/// Anything at `path`, including a dangling symlink.
pub(crate) fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

pub(crate) fn list_entries(dir: &Path) -> Result<Vec<String>, FixtureError> {
    let mut names = Vec::new();
    let entries = fs::read_dir(dir).map_err(|error| FixtureError::filesystem("list", dir, error))?;
    for entry in entries {
        let entry =
            entry.map_err(|error| FixtureError::filesystem("read entry in", dir, error))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
