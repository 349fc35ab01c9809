//! Application configuration.
//!
//! Values come from `~/.config/hangout/config.toml` (when present) and are
//! overridden by `HANGOUT_*` environment variables, e.g.
//! `HANGOUT_BACKEND=shared` or `HANGOUT_TOTAL_MEMBERS=12`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    storage::LocalStore,
    tally::{MajorityRule, DEFAULT_TOTAL_MEMBERS},
};

/// Directory under the platform config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "hangout";

const DEFAULT_CONFIG: &str = r#"# Which store to use: "local" keeps data for this machine only,
# "shared" watches `shared_dir` for changes made by other clients.
backend = "local"

# Where the local store keeps events.json and games.json.
# data_dir = "/home/me/.local/share/hangout"

# Directory shared between clients (defaults to data_dir).
# shared_dir = "/mnt/shared/hangout"

# Group size; a game needs ceil(total_members / 2) votes to be a fan favourite.
total_members = 15

# How many events the "upcoming" panel shows.
upcoming_limit = 2

# Name used when voting from this client.
# voter_name = "Tanish"
"#;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single-client file store.
    #[default]
    Local,
    /// Watched directory shared by several clients.
    Shared,
}

/// Runtime settings for the planner and its front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory of the local store.
    pub data_dir: PathBuf,
    /// Which backend to open.
    pub backend: Backend,
    /// Directory watched by the shared backend.
    pub shared_dir: Option<PathBuf>,
    /// Size of the group voting on games.
    pub total_members: u32,
    /// Number of cards in the short upcoming list; 0 shows everything.
    pub upcoming_limit: usize,
    /// Name this client votes as.
    pub voter_name: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: LocalStore::default_root(),
            backend: Backend::Local,
            shared_dir: None,
            total_members: DEFAULT_TOTAL_MEMBERS,
            upcoming_limit: 2,
            voter_name: None,
        }
    }
}

impl AppConfig {
    /// Load from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (missing files are fine) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("HANGOUT").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.total_members == 0 {
            bail!("total_members must be at least 1");
        }
        if self
            .voter_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            bail!("voter_name cannot be blank");
        }
        Ok(())
    }

    /// Majority rule for the configured group size.
    pub fn rule(&self) -> MajorityRule {
        MajorityRule::new(self.total_members)
    }

    /// Limit for the short upcoming list.
    pub fn upcoming_limit(&self) -> Option<usize> {
        (self.upcoming_limit > 0).then_some(self.upcoming_limit)
    }

    /// Directory the selected backend stores collections in.
    pub fn store_dir(&self) -> &Path {
        match (self.backend, self.shared_dir.as_deref()) {
            (Backend::Shared, Some(dir)) => dir,
            _ => self.data_dir.as_path(),
        }
    }
}

/// Location of `config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Write a commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_parses_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("hangout").join("config.toml");
        write_default_config(path.clone())?;
        assert!(path.exists());

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.total_members, 15);
        assert_eq!(config.rule().threshold(), 8);
        assert_eq!(config.upcoming_limit(), Some(2));
        assert_eq!(config.voter_name, None);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        let shared = dir.path().join("shared");
        fs::write(
            &path,
            format!(
                "backend = \"shared\"\n\
                 shared_dir = {:?}\n\
                 total_members = 6\n\
                 upcoming_limit = 0\n\
                 voter_name = \"Olwethu\"\n",
                shared.display().to_string()
            ),
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.backend, Backend::Shared);
        assert_eq!(config.store_dir(), shared.as_path());
        assert_eq!(config.rule().threshold(), 3);
        assert_eq!(config.upcoming_limit(), None);
        assert_eq!(config.voter_name.as_deref(), Some("Olwethu"));
        Ok(())
    }

    #[test]
    fn rejects_an_empty_group() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "total_members = 0\n")?;
        assert!(AppConfig::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn local_backend_ignores_shared_dir() {
        let config = AppConfig {
            shared_dir: Some(PathBuf::from("/elsewhere")),
            ..AppConfig::default()
        };
        assert_eq!(config.store_dir(), config.data_dir.as_path());
    }
}
