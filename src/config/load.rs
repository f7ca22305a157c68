use super::{ConfigError, Settings, SETTINGS_PATH_ENV};
use std::path::PathBuf;

/// An explicit `--settings` path wins over `DEVPROV_SETTINGS`.
pub fn resolve_settings_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        std::env::var_os(SETTINGS_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

pub fn load_settings(explicit: Option<PathBuf>) -> Result<Settings, ConfigError> {
    let settings = match resolve_settings_path(explicit) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading provisioner settings");
            Settings::from_path(&path)?
        }
        None => Settings::default(),
    };
    settings.validate()?;
    Ok(settings)
}
