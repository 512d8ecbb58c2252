use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default name of the site configuration file.
pub const CONFIG_FILE_NAME: &str = "quire.yaml";

/// Prefix for environment variable overrides, e.g. `QUIRE__SITE__TITLE`.
const ENV_PREFIX: &str = "QUIRE";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to encode config file path as a unicode string: {0}")]
    EncodePath(PathBuf),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("{0}")]
    Validation(String),
}

// =============================================================================
// Top-level config
// =============================================================================

/// Site-wide settings loaded from `quire.yaml`.
///
/// Everything here is read-only for the duration of a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    /// Directory holding the Markdown posts and static assets
    #[serde(default = "default_content_dir")]
    pub content: PathBuf,
    /// Directory holding the Tera layouts
    #[serde(default = "default_layouts_dir")]
    pub layouts: PathBuf,
    #[serde(default)]
    pub permalink: PermalinkConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub listings: ListingConfig,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    /// Arbitrary values passed to layouts as `site.params.*`
    #[serde(default = "default_params")]
    pub params: serde_json::Value,
    /// Development-specific settings (watch mode, etc.)
    #[serde(default)]
    pub dev: DevConfig,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_layouts_dir() -> PathBuf {
    PathBuf::from("layouts")
}

fn default_params() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

// =============================================================================
// Site configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    /// Public URL of the site, e.g. `https://blog.example.com`
    pub url: Option<String>,
    /// Path prefix the site is mounted under, e.g. `/blog`
    #[serde(default)]
    pub base_path: String,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from("_site")
}

// =============================================================================
// Permalinks
// =============================================================================

/// URL patterns for posts.
///
/// Supported tokens: `:year`, `:month`, `:day`, `:title`, `:slug`,
/// `:categories` and `:path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermalinkConfig {
    /// Pattern for dated posts
    #[serde(default = "default_post_permalink")]
    pub posts: String,
    /// Pattern for undated pages
    #[serde(default = "default_page_permalink")]
    pub pages: String,
}

fn default_post_permalink() -> String {
    "/:year/:month/:day/:title/".to_string()
}

fn default_page_permalink() -> String {
    "/:path/".to_string()
}

impl Default for PermalinkConfig {
    fn default() -> Self {
        Self {
            posts: default_post_permalink(),
            pages: default_page_permalink(),
        }
    }
}

// =============================================================================
// Front matter defaults
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Layout used by posts that don't name one
    #[serde(default = "default_layout")]
    pub layout: String,
}

fn default_layout() -> String {
    "post".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
        }
    }
}

// =============================================================================
// Listing pages
// =============================================================================

/// Generated listing pages. Each page is only written when its layout exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_home_layout")]
    pub home_layout: String,
    #[serde(default = "default_tag_layout")]
    pub tag_layout: String,
    #[serde(default = "default_category_layout")]
    pub category_layout: String,
    #[serde(default = "default_tags_path")]
    pub tags_path: String,
    #[serde(default = "default_categories_path")]
    pub categories_path: String,
}

fn default_home_layout() -> String {
    "home".to_string()
}

fn default_tag_layout() -> String {
    "tag".to_string()
}

fn default_category_layout() -> String {
    "category".to_string()
}

fn default_tags_path() -> String {
    "/tags".to_string()
}

fn default_categories_path() -> String {
    "/categories".to_string()
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            home_layout: default_home_layout(),
            tag_layout: default_tag_layout(),
            category_layout: default_category_layout(),
            tags_path: default_tags_path(),
            categories_path: default_categories_path(),
        }
    }
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Extensions to enable for markdown processing
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
    /// Syntax highlight code blocks (plain escaped `<pre>` otherwise)
    #[serde(default = "default_highlight")]
    pub highlight: bool,
    /// Highlighting theme, used for the generated stylesheet
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,
}

fn default_markdown_extensions() -> Vec<String> {
    vec![
        "footnotes".to_string(),
        "heading_attributes".to_string(),
        "strikethrough".to_string(),
        "tables".to_string(),
        "tasklists".to_string(),
    ]
}

fn default_highlight() -> bool {
    true
}

fn default_highlight_theme() -> String {
    "dracula".to_string()
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
            highlight: default_highlight(),
            highlight_theme: default_highlight_theme(),
        }
    }
}

// =============================================================================
// Development configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// File watching configuration
    #[serde(default)]
    pub watch: WatchConfig,
    /// Enable live reload in the browser when files change (default: true)
    #[serde(default = "default_live_reload")]
    pub live_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            live_reload: true,
        }
    }
}

fn default_live_reload() -> bool {
    true
}

/// Configuration for file watching during development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems, Docker volumes, or other situations
    /// where native events are unreliable.
    #[serde(default)]
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    /// Changes within this window are batched together.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

// =============================================================================
// Config loading
// =============================================================================

impl Config {
    /// A starter config, as written by `quire init`.
    pub fn starter(title: &str) -> Self {
        Self {
            site: SiteConfig {
                title: title.to_string(),
                url: Some("https://example.com".to_string()),
                base_path: String::new(),
                description: None,
                author: None,
                output: default_output(),
            },
            content: default_content_dir(),
            layouts: default_layouts_dir(),
            permalink: PermalinkConfig::default(),
            defaults: DefaultsConfig::default(),
            listings: ListingConfig::default(),
            markdown: MarkdownConfig::default(),
            params: default_params(),
            dev: DevConfig::default(),
        }
    }

    /// Resolve the config path from the command line argument, defaulting to `quire.yaml`
    /// in the current directory.
    pub fn resolve_path(config_file: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(CONFIG_FILE_NAME));
        if config_file.is_relative() {
            Ok(std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file))
        } else {
            Ok(config_file.to_path_buf())
        }
    }

    /// Load the config from a file path.
    ///
    /// Values from the file can be overridden with `QUIRE__`-prefixed environment
    /// variables, using `__` as the nesting separator.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let path_str = path
            .as_os_str()
            .to_str()
            .ok_or_else(|| ConfigError::EncodePath(path.to_path_buf()))?;

        let config = config::Config::builder()
            .add_source(config::File::new(path_str, config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, mid-build.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.site.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "invalid config: 'site.title' must not be empty".to_string(),
            ));
        }
        if !self.params.is_object() {
            return Err(ConfigError::Validation(
                "invalid config: 'params' must be a mapping".to_string(),
            ));
        }
        for (key, pattern) in [
            ("permalink.posts", &self.permalink.posts),
            ("permalink.pages", &self.permalink.pages),
        ] {
            if !pattern.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "invalid config: '{key}' must start with '/' (got '{pattern}')"
                )));
            }
        }
        Ok(())
    }

    /// Base directory for resolving relative paths (the config file's directory).
    pub fn base_path(config_path: &Path) -> PathBuf {
        config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "site:\n  title: Notes\n");

        let config = Config::load_from_file(&path).unwrap();

        assert_eq!(config.site.title, "Notes");
        assert_eq!(config.site.output, PathBuf::from("_site"));
        assert_eq!(config.content, PathBuf::from("content"));
        assert_eq!(config.permalink.posts, "/:year/:month/:day/:title/");
        assert_eq!(config.defaults.layout, "post");
        assert!(config.markdown.highlight);
        assert!(config.params.is_object());
    }

    #[test]
    fn test_load_params_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
site:
  title: Notes
  url: https://notes.example.com
  base_path: /blog
permalink:
  posts: /:categories/:title/
params:
  github: someone
"#,
        );

        let config = Config::load_from_file(&path).unwrap();

        assert_eq!(config.site.base_path, "/blog");
        assert_eq!(config.permalink.posts, "/:categories/:title/");
        assert_eq!(config.permalink.pages, "/:path/");
        assert_eq!(config.params["github"], "someone");
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_file(&dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_missing_site_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "content: posts\n");
        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn test_relative_permalink_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "site:\n  title: Notes\npermalink:\n  posts: ':title/'\n",
        );
        assert!(matches!(
            Config::load_from_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_starter_round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let text = serde_yaml::to_string(&Config::starter("Fresh")).unwrap();
        let path = write_config(dir.path(), &text);

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.site.title, "Fresh");
        assert_eq!(config.listings.tags_path, "/tags");
    }

    #[test]
    fn test_base_path() {
        assert_eq!(
            Config::base_path(Path::new("/blog/quire.yaml")),
            PathBuf::from("/blog")
        );
    }
}
