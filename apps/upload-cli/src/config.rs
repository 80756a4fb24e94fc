//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/oseh/upload.toml`
//! - Windows: `%APPDATA%/oseh/upload.toml`
//!
//! `OSEH_API_URL` and `OSEH_TOKEN` override the stored values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API origin, without a trailing path.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token of the logged-in admin.
    #[serde(default)]
    pub token: String,

    /// Parts uploaded at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds (0 = none).
    #[serde(default)]
    pub request_timeout_secs: u64,

    /// Extra attempts for a failed part before giving up.
    #[serde(default)]
    pub part_retries: u32,
}

fn default_api_url() -> String {
    "https://oseh.io".into()
}

fn default_concurrency() -> usize {
    oseh_content_upload::types::DEFAULT_CONCURRENCY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: String::new(),
            concurrency: default_concurrency(),
            request_timeout_secs: 0,
            part_retries: 0,
        }
    }
}

impl Config {
    /// Loads configuration from disk with environment overrides applied.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads `path`, or returns the defaults if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies `OSEH_API_URL` and `OSEH_TOKEN` as returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OSEH_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup("OSEH_TOKEN").filter(|v| !v.is_empty()) {
            self.token = token;
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// TOML rendering with the token masked.
    pub fn redacted(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if !shown.token.is_empty() {
            shown.token = "<set>".into();
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("oseh").join("upload.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home =
                    std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("oseh").join("upload.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://oseh.io");
        assert!(config.token.is_empty());
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.part_retries, 0);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("upload.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.toml");
        std::fs::write(&path, "token = \"abc\"\nconcurrency = 2\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.api_url, "https://oseh.io");
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("upload.toml");
        let config = Config {
            api_url: "http://localhost:8080".into(),
            token: "tok".into(),
            concurrency: 3,
            request_timeout_secs: 30,
            part_retries: 2,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn env_overrides_stored_values() {
        let mut config = Config {
            token: "stored".into(),
            ..Config::default()
        };
        config.apply_overrides(|key| match key {
            "OSEH_TOKEN" => Some("from-env".into()),
            "OSEH_API_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.token, "from-env");
        assert_eq!(config.api_url, "https://oseh.io");
    }

    #[test]
    fn redacted_hides_token() {
        let config = Config {
            token: "secret".into(),
            ..Config::default()
        };
        let shown = config.redacted().unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<set>"));
    }

    #[test]
    fn timeout_from_seconds() {
        let config = Config {
            request_timeout_secs: 45,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(45)));
    }
}
