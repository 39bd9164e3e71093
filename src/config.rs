use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::types::NewsCategory;
use crate::cache::RetryPolicy;
use crate::filters::{FilterPredicate, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub board: BoardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched result counts as fresh
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Retries for reads that fail with a network error
  #[serde(default = "default_read_retries")]
  pub read_retries: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      read_retries: default_read_retries(),
    }
  }
}

fn default_stale_secs() -> u64 {
  300
}

fn default_read_retries() -> u32 {
  2
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    i64::try_from(self.stale_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .unwrap_or(Duration::MAX)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      retries: self.read_retries,
      ..RetryPolicy::default()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Category filter applied at startup
  pub category: Option<NewsCategory>,
  /// Start with only favorites shown
  #[serde(default)]
  pub favorites_only: bool,
}

impl Default for BoardConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      category: None,
      favorites_only: false,
    }
  }
}

fn default_page_size() -> u32 {
  DEFAULT_PAGE_SIZE
}

impl BoardConfig {
  /// Predicate the board starts with
  pub fn initial_filters(&self) -> FilterPredicate {
    FilterPredicate {
      category: self.category,
      is_favorite: self.favorites_only.then_some(true),
      ..FilterPredicate::with_page_size(self.page_size)
    }
  }
}

impl Config {
  /// Defaults for everything but the API URL
  pub fn for_url(url: &str) -> Self {
    Self {
      api: ApiConfig {
        url: url.to_string(),
        timeout_secs: default_timeout_secs(),
      },
      title: None,
      cache: CacheConfig::default(),
      board: BoardConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./newsboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/newsboard/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/newsboard/config.yaml\n\
                 See newsboard.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("newsboard.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("newsboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.board.page_size == 0 {
      return Err(eyre!("board.page_size must be positive"));
    }
    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks NEWSBOARD_TOKEN first, then NEWSBOARD_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("NEWSBOARD_TOKEN")
      .or_else(|_| std::env::var("NEWSBOARD_API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set NEWSBOARD_TOKEN or NEWSBOARD_API_TOKEN environment variable.")
      })
  }

  /// Header title: the configured one, or the API host
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| "newsboard".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: http://localhost:8000\n").unwrap();
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.cache.read_retries, 2);
    assert_eq!(config.board.initial_filters(), FilterPredicate::default());
    assert_eq!(config.display_title(), "localhost");
  }

  #[test]
  fn test_board_section_sets_initial_filters() {
    let yaml = r#"
api:
  url: https://news.example.com
title: Team news
board:
  page_size: 50
  category: research
  favorites_only: true
cache:
  stale_secs: 60
  read_retries: 0
"#;
    let config = Config::parse(yaml).unwrap();
    let filters = config.board.initial_filters();
    assert_eq!(filters.category, Some(NewsCategory::Research));
    assert_eq!(filters.is_favorite, Some(true));
    assert_eq!(filters.page_size, 50);
    assert_eq!(config.cache.stale_time(), Duration::seconds(60));
    assert_eq!(config.cache.retry_policy().retries, 0);
    assert_eq!(config.display_title(), "Team news");
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    assert!(Config::parse("api:\n  url: http://x\nboard:\n  page_size: 0\n").is_err());
  }

  #[test]
  fn test_unknown_category_is_rejected() {
    assert!(Config::parse("api:\n  url: http://x\nboard:\n  category: sports\n").is_err());
  }
}
