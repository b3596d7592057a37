use anyhow::{Context, Result};
use scratchcase_core::FixtureConfig;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;

/// Installs a global subscriber that writes through the test harness's
/// captured output. Fails if a subscriber is already installed.
pub fn init_logging(config: &FixtureConfig) -> Result<()> {
    let (level, warning) = parse_log_level(config.logging.level.as_deref());
    if let Some(warning) = warning {
        eprintln!("warning: {warning}");
    }
    let filter = Targets::new()
        .with_target("scratchcase_core", level)
        .with_target("scratchcase_fixture", level)
        .with_default(LevelFilter::WARN);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_test_writer();
    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).context("unable to initialize logging")?;
    Ok(())
}

pub(crate) fn parse_log_level(level: Option<&str>) -> (LevelFilter, Option<String>) {
    let raw = level.unwrap_or("info");
    let parsed = match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => {
            return (
                LevelFilter::INFO,
                Some(format!("invalid log level '{raw}', using info")),
            );
        }
    };
    (parsed, None)
}
