use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::settings::Settings;

const LOG_ENV: &str = "CARDBOOK_LOG";

fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&settings.log_filter))
}

/// Log to stderr for one-shot commands.
pub fn init_stderr(settings: &Settings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Log to a file while the terminal belongs to the interactive screen.
pub fn init_to_file(settings: &Settings, path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
