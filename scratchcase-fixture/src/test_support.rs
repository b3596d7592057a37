use scratchcase_core::FixtureConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}_{nanos}", std::process::id())
}

/// Fresh directory under the system temp dir, removed by the caller.
pub(crate) fn temp_root(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("scratchcase_test_{prefix}_{}", unique_suffix()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Config whose temporary root and deletable prefix are both `root`.
pub(crate) fn config_rooted_at(root: &Path) -> FixtureConfig {
    FixtureConfig::with_temporary_root(root)
}

pub(crate) fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
