use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration loaded from the TOML file given on the command line.
///
/// Example:
/// ```toml
/// server    = "https://app.getoutline.com"
/// api_token = "A1B2C3"
/// git_url   = "git@github.com:username/wiki_backup.git"
/// git_rsa   = "~/.ssh/id_rsa"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the wiki server.
    pub server: String,
    /// API token sent as a bearer credential on every request.
    pub api_token: String,
    /// Remote repository receiving the backup snapshots.
    pub git_url: String,
    /// Private key used to authenticate clone and push.
    pub git_rsa: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: "https://app.getoutline.com".into(),
            api_token: "A1B2C3".into(),
            git_url: "git@github.com:username/wiki_backup.git".into(),
            git_rsa: PathBuf::from("~/.ssh/id_rsa"),
        }
    }
}

impl Config {
    /// Load the configuration, bootstrapping a template on first run.
    ///
    /// If `path` does not exist, a default config is written there and the
    /// run is aborted so the operator can fill in real values before the
    /// next invocation.
    ///
    /// # Errors
    /// - Returns an error if the file cannot be read or written.
    /// - Returns an error if parsing the TOML fails.
    pub fn load_or_init(path: &Path) -> Result<Config> {
        if !path.exists() {
            let body = toml::to_string_pretty(&Config::default())
                .context("failed to serialize default config")?;
            fs::write(path, body)
                .with_context(|| format!("cannot write default config to {}", path.display()))?;
            bail!(
                "wrote a default config to {}; edit it and run again",
                path.display()
            );
        }
        let txt = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let cfg: Config =
            toml::from_str(&txt).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Private key path with a leading `~` expanded against `$HOME`.
    pub fn key_path(&self) -> PathBuf {
        expand_home(&self.git_rsa)
    }
}

fn expand_home(p: &Path) -> PathBuf {
    if let Ok(rest) = p.strip_prefix("~")
        && let Some(home) = env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    p.to_path_buf()
}
