use anyhow::{Context, Result};
use scratchcase_core::{FixtureConfig, Identifier};
use std::fs;
use std::path::Path;

use crate::logging::parse_log_level;
use crate::paths::{config_path_from, discovery_start};

/// Loads the nearest `scratchcase.toml` for the crate under test, or the
/// defaults when there is none.
pub fn load_config() -> Result<FixtureConfig> {
    match discovery_start() {
        Some(start) => load_config_from(&start),
        None => Ok(FixtureConfig::default()),
    }
}

pub fn load_config_from(start: &Path) -> Result<FixtureConfig> {
    match config_path_from(start) {
        Some(path) => read_config(&path),
        None => Ok(FixtureConfig::default()),
    }
}

pub fn read_config(path: &Path) -> Result<FixtureConfig> {
    load_dotenv_for_config(path)?;
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    let mut config: FixtureConfig = toml::from_str(&contents)
        .with_context(|| format!("invalid TOML in config file {}", path.display()))?;
    resolve_env_vars(&mut config, path)?;
    validate_config(&config)
        .with_context(|| format!("invalid config data in {}", path.display()))?;
    Ok(config)
}

fn load_dotenv_for_config(path: &Path) -> Result<()> {
    let Some(dotenv_path) = path.parent().map(|dir| dir.join(".env")) else {
        return Ok(());
    };

    if dotenv_path.is_file() {
        dotenvy::from_path(&dotenv_path)
            .with_context(|| format!("unable to read .env file {}", dotenv_path.display()))?;
    }

    Ok(())
}

fn resolve_env_vars(config: &mut FixtureConfig, path: &Path) -> Result<()> {
    let resolve = |field: &str, value: &str| -> Result<String> {
        interpolate_env_value(value).map_err(|error| {
            anyhow::anyhow!(
                "config {}: unable to resolve env vars in {field}: {error}",
                path.display()
            )
        })
    };

    if let Some(root) = config.temporary_root.as_ref()
        && root.to_string_lossy().contains("${")
    {
        let resolved = resolve("temporary_root", root.to_string_lossy().as_ref())?;
        config.temporary_root = Some(resolved.into());
    }
    if let Some(namespace) = config.namespace.as_deref()
        && namespace.contains("${")
    {
        config.namespace = Some(resolve("namespace", namespace)?);
    }
    if let Some(prefix) = config.path_prefix.as_deref()
        && prefix.contains("${")
    {
        config.path_prefix = Some(resolve("path_prefix", prefix)?);
    }

    Ok(())
}

fn interpolate_env_value(value: &str) -> Result<String> {
    let mut output = String::with_capacity(value.len());
    let mut remainder = value;

    while let Some(start) = remainder.find("${") {
        output.push_str(&remainder[..start]);
        let rest = &remainder[start + 2..];
        let end = rest
            .find('}')
            .ok_or_else(|| anyhow::anyhow!("unterminated env var placeholder"))?;
        let name = &rest[..end];
        if name.trim().is_empty() {
            anyhow::bail!("empty env var placeholder");
        }
        let value = std::env::var(name)
            .map_err(|_| anyhow::anyhow!("missing environment variable '{name}'"))?;
        output.push_str(&value);
        remainder = &rest[end + 1..];
    }

    output.push_str(remainder);
    Ok(output)
}

fn validate_config(config: &FixtureConfig) -> Result<()> {
    if let Some(root) = config.temporary_root.as_deref()
        && !root.is_absolute()
    {
        anyhow::bail!("temporary_root must be an absolute path");
    }
    if let Some(prefix) = config.path_prefix.as_deref()
        && !Path::new(prefix).is_absolute()
    {
        anyhow::bail!("path_prefix must be an absolute path");
    }
    if let Some(namespace) = config.namespace.as_deref() {
        Identifier::new(namespace).context("namespace cannot be empty")?;
    }
    if let Some(alias) = config.alias_prefix.as_deref()
        && !alias.is_empty()
        && !alias.starts_with('/')
    {
        anyhow::bail!("alias_prefix must be empty or start with '/'");
    }
    if let Some(level) = config.logging.level.as_deref()
        && parse_log_level(Some(level)).1.is_some()
    {
        anyhow::bail!("logging.level '{level}' is not one of trace, debug, info, warn, error, off");
    }
    Ok(())
}
