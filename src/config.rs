use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::edit_diff::DEFAULT_DIFF_CONTEXT_LINES;
use crate::util::is_local_endpoint_url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_DOCUMENT_EXTENSION: &str = ".md";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub document_extension: String,
    /// Filesystem root for documents. `None` persists through the HTTP API.
    pub document_root: Option<PathBuf>,
    pub auto_approve_after: Option<Duration>,
    pub diff_context_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            document_extension: DEFAULT_DOCUMENT_EXTENSION.to_string(),
            document_root: None,
            auto_approve_after: None,
            diff_context_lines: DEFAULT_DIFF_CONTEXT_LINES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url =
            std::env::var("MARKPILOT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = non_empty_env("MARKPILOT_API_KEY");
        let document_extension = non_empty_env("MARKPILOT_DOCUMENT_EXTENSION")
            .unwrap_or_else(|| DEFAULT_DOCUMENT_EXTENSION.to_string());
        let document_root = non_empty_env("MARKPILOT_DOCUMENT_ROOT").map(PathBuf::from);
        let auto_approve_after = non_empty_env("MARKPILOT_AUTO_APPROVE_SECS")
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid MARKPILOT_AUTO_APPROVE_SECS '{v}'"))
            })
            .transpose()?
            .map(Duration::from_secs);
        let diff_context_lines = non_empty_env("MARKPILOT_DIFF_CONTEXT_LINES")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_DIFF_CONTEXT_LINES)
            .min(50);

        Ok(Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            document_extension,
            document_root,
            auto_approve_after,
            diff_context_lines,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid MARKPILOT_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "MARKPILOT_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        let extension = self.document_extension.trim().trim_start_matches('.');
        if extension.is_empty() || extension.contains('/') {
            bail!(
                "Invalid MARKPILOT_DOCUMENT_EXTENSION '{}': expected something like '.md'",
                self.document_extension
            );
        }

        if let Some(root) = &self.document_root {
            if !root.is_dir() {
                bail!(
                    "MARKPILOT_DOCUMENT_ROOT '{}' is not a directory",
                    root.display()
                );
            }
        }

        if self.auto_approve_after == Some(Duration::ZERO) {
            bail!("MARKPILOT_AUTO_APPROVE_SECS must be greater than zero");
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 6] = [
        "MARKPILOT_API_URL",
        "MARKPILOT_API_KEY",
        "MARKPILOT_DOCUMENT_EXTENSION",
        "MARKPILOT_DOCUMENT_ROOT",
        "MARKPILOT_AUTO_APPROVE_SECS",
        "MARKPILOT_DIFF_CONTEXT_LINES",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_uses_local_defaults() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();

        let config = Config::load().expect("load defaults");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.document_extension, ".md");
        assert!(config.document_root.is_none());
        assert!(config.auto_approve_after.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_overrides_and_trims_url() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();
        std::env::set_var("MARKPILOT_API_URL", "https://editor.example.com/api/");
        std::env::set_var("MARKPILOT_API_KEY", "secret");
        std::env::set_var("MARKPILOT_AUTO_APPROVE_SECS", "30");
        std::env::set_var("MARKPILOT_DIFF_CONTEXT_LINES", "5");

        let config = Config::load().expect("load overrides");
        clear_env();

        assert_eq!(config.api_url, "https://editor.example.com/api");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.auto_approve_after, Some(Duration::from_secs(30)));
        assert_eq!(config.diff_context_lines, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_non_numeric_auto_approve() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();
        std::env::set_var("MARKPILOT_AUTO_APPROVE_SECS", "soon");
        let result = Config::load();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_key_for_remote_endpoint() {
        let config = Config {
            api_url: "https://editor.example.com/api".to_string(),
            ..Config::default()
        };
        let error = config.validate().expect_err("remote without key");
        assert!(error.to_string().contains("MARKPILOT_API_KEY"));
    }

    #[test]
    fn test_validate_rejects_empty_extension() {
        let config = Config {
            document_extension: ".".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
