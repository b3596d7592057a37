use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "scratchcase.toml";

/// Nearest `scratchcase.toml` at or above `start`. The search stops at the
/// enclosing repository root (a directory with `.git`).
pub fn config_path_from(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        current = dir.parent();
    }

    None
}

/// Where configuration discovery starts: the crate under test when cargo
/// runs it, the working directory otherwise.
pub fn discovery_start() -> Option<PathBuf> {
    std::env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
}
