//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! The showroom library only reads environment variables; this crate is how the CLI fills
//! them from files before building an `OrchestratorConfig`.

mod dotenv_file;
mod xdg_toml;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use thiserror::Error;

/// XDG application directory name: `$XDG_CONFIG_HOME/showroom/config.toml`.
pub const APP_NAME: &str = "showroom";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(#[from] dotenv::Error),
}

/// Loads `$XDG_CONFIG_HOME/<app_name>/config.toml` `[env]` and an optional project `.env`,
/// then sets only the variables that are **not** already present in the process
/// environment.
///
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of the current one.
///
/// Returns the keys that were set, sorted.
pub fn load_and_apply(
    app_name: &str,
    override_dir: Option<&Path>,
) -> Result<Vec<String>, LoadError> {
    let xdg = xdg_toml::load_env_map(app_name)?;
    let dotenv = dotenv_file::load_env_map(override_dir)?;
    Ok(apply(&dotenv, &xdg, |key| std::env::var_os(key).is_some()))
}

fn apply(
    dotenv: &HashMap<String, String>,
    xdg: &HashMap<String, String>,
    is_set: impl Fn(&str) -> bool,
) -> Vec<String> {
    let keys: BTreeSet<&String> = dotenv.keys().chain(xdg.keys()).collect();
    let mut applied = Vec::new();
    for key in keys {
        if is_set(key) {
            continue;
        }
        if let Some(value) = dotenv.get(key).or_else(|| xdg.get(key)) {
            std::env::set_var(key, value);
            applied.push(key.clone());
        }
    }
    applied
}

/// Serializes tests that touch `XDG_CONFIG_HOME`.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
