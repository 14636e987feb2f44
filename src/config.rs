//! Configuration for storyreel paths and generation services.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STORYREEL_HOME)
//! 2. Config file (.storyreel/config.yaml)
//! 3. Defaults (~/.storyreel)
//!
//! Config file discovery:
//! - Searches current directory and parents for .storyreel/config.yaml
//! - Relative paths in the config file are resolved against the config file's
//!   parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub style: StyleDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    /// Project-state home directory (relative to config file)
    pub home: Option<String>,
}

/// Endpoint settings for one generation service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoint {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

fn default_timeout() -> u64 {
    60
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_seconds: default_timeout(),
            model: None,
            max_tokens: None,
        }
    }
}

/// One endpoint per external generation capability
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub llm: ServiceEndpoint,
    #[serde(default)]
    pub image: ServiceEndpoint,
    #[serde(default)]
    pub lora: ServiceEndpoint,
    #[serde(default)]
    pub video: ServiceEndpoint,
}

/// Generation defaults written into every new project document
#[derive(Debug, Clone, Deserialize)]
pub struct StyleDefaults {
    #[serde(default = "default_style_model")]
    pub model: String,
    #[serde(default = "default_style_seed")]
    pub seed: u64,
}

fn default_style_model() -> String {
    "SDXL_Niji6".to_string()
}

fn default_style_seed() -> u64 {
    777_312
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            model: default_style_model(),
            seed: default_style_seed(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the storyreel home (project state)
    pub home: PathBuf,
    /// Path to the config file (if found)
    pub config_file: Option<PathBuf>,
    /// Service endpoints
    pub services: ServicesConfig,
    /// Retry policy applied around capability calls
    pub retry: RetryPolicy,
    /// Style defaults for new projects
    pub style: StyleDefaults,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".storyreel").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".storyreel");

    let config_file = find_config_file();

    let (home, services, retry, style) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        let home = if let Ok(env_home) = std::env::var("STORYREEL_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.storage.home {
            // home is relative to the .storyreel/ directory
            let storyreel_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(storyreel_dir, home_path)
        } else {
            default_home.clone()
        };

        (home, config.services, config.retry, config.style)
    } else {
        let home = std::env::var("STORYREEL_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        (
            home,
            ServicesConfig::default(),
            RetryPolicy::default(),
            StyleDefaults::default(),
        )
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        services,
        retry,
        style,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the projects directory ($STORYREEL_HOME/projects)
pub fn projects_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("projects"))
}

/// Get the directory for final composed videos ($STORYREEL_HOME/videos/final)
pub fn final_videos_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("videos").join("final"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let storyreel_dir = temp.path().join(".storyreel");
        std::fs::create_dir_all(&storyreel_dir).unwrap();

        let config_path = storyreel_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
storage:
  home: ./
services:
  llm:
    base_url: https://llm.example.com/v1
    api_key: sk-test
    model: qwen-max
    max_tokens: 4096
  image:
    base_url: https://image.example.com
    api_key: img-test
    timeout_seconds: 120
retry:
  max_attempts: 5
style:
  model: SDXL_Niji6
  seed: 42
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.services.llm.base_url, "https://llm.example.com/v1");
        assert_eq!(config.services.llm.model, Some("qwen-max".to_string()));
        assert_eq!(config.services.image.timeout_seconds, 120);
        // Unspecified services fall back to defaults
        assert_eq!(config.services.video.timeout_seconds, 60);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.style.seed, 42);
    }

    #[test]
    fn test_defaults_without_file() {
        let config = ConfigFile::default();
        assert_eq!(config.style.model, "SDXL_Niji6");
        assert_eq!(config.style.seed, 777_312);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/home/user/project/state")
        );
    }
}
