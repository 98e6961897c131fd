//! auditscore configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level auditscore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditscoreConfig {
    /// Form file or directory used when `--forms` is not given.
    #[serde(default = "default_forms_dir")]
    pub forms_dir: PathBuf,
    /// Directory for JSON reports. Reports are only written when set.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Output format for `score`: text, json or markdown.
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Exit with status 1 when a scored audit failed.
    #[serde(default)]
    pub fail_on_flag: bool,
}

fn default_forms_dir() -> PathBuf {
    PathBuf::from("./forms")
}
fn default_format() -> String {
    "text".to_string()
}

impl Default for AuditscoreConfig {
    fn default() -> Self {
        Self {
            forms_dir: default_forms_dir(),
            output_dir: None,
            default_format: default_format(),
            fail_on_flag: false,
        }
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `auditscore.toml` in the current directory
/// 2. `~/.config/auditscore/config.toml`
///
/// Environment variable overrides: `AUDITSCORE_FORMS_DIR`, `AUDITSCORE_OUTPUT_DIR`.
pub fn load_config_from(path: Option<&Path>) -> Result<AuditscoreConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("auditscore.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AuditscoreConfig::default(),
    };

    // Apply env var overrides
    if let Ok(dir) = std::env::var("AUDITSCORE_FORMS_DIR") {
        config.forms_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("AUDITSCORE_OUTPUT_DIR") {
        config.output_dir = Some(PathBuf::from(dir));
    }

    Ok(config)
}

fn parse_config(content: &str) -> Result<AuditscoreConfig> {
    let config: AuditscoreConfig = toml::from_str(content)?;
    anyhow::ensure!(
        matches!(config.default_format.as_str(), "text" | "json" | "markdown" | "md"),
        "unknown default_format '{}'",
        config.default_format
    );
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("auditscore"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuditscoreConfig::default();
        assert_eq!(config.forms_dir, PathBuf::from("./forms"));
        assert_eq!(config.default_format, "text");
        assert!(config.output_dir.is_none());
        assert!(!config.fail_on_flag);
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"
forms_dir = "checklists"
output_dir = "reports"
default_format = "markdown"
fail_on_flag = true
"#,
        )
        .unwrap();
        assert_eq!(config.forms_dir, PathBuf::from("checklists"));
        assert_eq!(config.output_dir, Some(PathBuf::from("reports")));
        assert!(config.fail_on_flag);
    }

    #[test]
    fn parse_rejects_unknown_format() {
        assert!(parse_config("default_format = \"pdf\"").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/auditscore.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditscore.toml");
        std::fs::write(&path, "default_format = \"json\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_format, "json");
    }
}
