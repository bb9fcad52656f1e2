//! Configuration management for mmdgen.
//!
//! Parses `mmdgen.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `renderer.command`
//! - `content.root`

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override URL mount prefix.
    pub prefix: Option<String>,
    /// Override content root directory.
    pub root: Option<PathBuf>,
    /// Override renderer command line.
    pub command: Option<String>,
    /// Override default diagram width.
    pub width: Option<u32>,
    /// Override default diagram height.
    pub height: Option<u32>,
    /// Override render timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Override staleness policy.
    pub staleness: Option<StalenessMode>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mmdgen.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// External renderer configuration.
    pub renderer: RendererConfig,
    /// Content configuration (paths are relative strings from TOML).
    content: ContentConfigRaw,

    /// Resolved content configuration (set after loading).
    #[serde(skip)]
    pub content_resolved: ContentConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// URL prefix the diagram handler is mounted under.
    pub prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8100,
            prefix: "/mermaid/".to_owned(),
        }
    }
}

/// External renderer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer executable followed by extra arguments, split on whitespace.
    pub command: String,
    /// Width used when the request carries no explicit dimensions.
    pub width: u32,
    /// Height used when the request carries no explicit dimensions.
    pub height: u32,
    /// Wall-clock limit for a single renderer run.
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "mmdc".to_owned(),
            width: 980,
            height: 1080,
            timeout_secs: 10,
        }
    }
}

impl RendererConfig {
    /// Split `command` into the executable and its extra arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the command is blank.
    pub fn split_command(&self) -> Result<(String, Vec<String>), ConfigError> {
        let mut parts = self.command.split_whitespace().map(str::to_owned);
        let program = parts.next().ok_or_else(|| {
            ConfigError::Validation("renderer.command cannot be empty".to_owned())
        })?;
        Ok((program, parts.collect()))
    }

    /// Render timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the diagram definition for a logical name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Prefer `name.md`, fall back to `name.mmd`.
    #[default]
    Auto,
    /// Only `name.mmd` (pure diagram definition).
    Diagram,
    /// Only `name.md` (markdown with an embedded diagram block).
    Markdown,
}

/// When a previously rendered artifact must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessMode {
    /// Rebuild when the source is newer than the artifact.
    #[default]
    Simple,
    /// Additionally rebuild artifacts rendered before today (local time).
    CalendarDay,
}

impl FromStr for StalenessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "calendar-day" | "calendar_day" => Ok(Self::CalendarDay),
            other => Err(format!(
                "unknown staleness policy '{other}' (expected 'simple' or 'calendar-day')"
            )),
        }
    }
}

impl fmt::Display for StalenessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::CalendarDay => "calendar-day",
        })
    }
}

/// Raw content configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ContentConfigRaw {
    root: Option<String>,
    source: Option<SourceMode>,
    staleness: Option<StalenessMode>,
    diagram_tag: Option<String>,
    fallback_to_document: Option<bool>,
}

/// Resolved content configuration with absolute paths.
#[derive(Debug)]
pub struct ContentConfig {
    /// Directory holding sources, rendered artifacts and other static files.
    pub root: PathBuf,
    /// Source resolution strategy.
    pub source: SourceMode,
    /// Artifact invalidation policy.
    pub staleness: StalenessMode,
    /// Fence tag marking the diagram block inside markdown sources.
    pub diagram_tag: String,
    /// Render the whole markdown document when it has no diagram block.
    pub fallback_to_document: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source: SourceMode::default(),
            staleness: StalenessMode::default(),
            diagram_tag: "mermaid".to_owned(),
            fallback_to_document: true,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`renderer.command`").
        field: String,
        /// Error message (e.g., "${`MMDC_BIN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a numeric field to be non-zero.
fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `mmdgen.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The final result
    /// is validated, so an empty renderer command is rejected here rather than
    /// on the first request.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(prefix) = &settings.prefix {
            self.server.prefix.clone_from(prefix);
        }
        if let Some(root) = &settings.root {
            self.content_resolved.root.clone_from(root);
        }
        if let Some(command) = &settings.command {
            self.renderer.command.clone_from(command);
        }
        if let Some(width) = settings.width {
            self.renderer.width = width;
        }
        if let Some(height) = settings.height {
            self.renderer.height = height;
        }
        if let Some(timeout_secs) = settings.timeout_secs {
            self.renderer.timeout_secs = timeout_secs;
        }
        if let Some(staleness) = settings.staleness {
            self.content_resolved.staleness = staleness;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            renderer: RendererConfig::default(),
            content: ContentConfigRaw::default(),
            content_resolved: ContentConfig {
                root: base.to_path_buf(),
                ..ContentConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_renderer()?;
        require_non_empty(&self.content_resolved.diagram_tag, "content.diagram_tag")?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        let prefix = &self.server.prefix;
        if !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.prefix must start and end with '/' (got '{prefix}')"
            )));
        }

        Ok(())
    }

    /// Validate renderer configuration.
    fn validate_renderer(&self) -> Result<(), ConfigError> {
        self.renderer.split_command()?;
        require_positive(u64::from(self.renderer.width), "renderer.width")?;
        require_positive(u64::from(self.renderer.height), "renderer.height")?;
        require_positive(self.renderer.timeout_secs, "renderer.timeout_secs")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        self.renderer.command = expand::expand_env(&self.renderer.command, "renderer.command")?;

        if let Some(ref root) = self.content.root {
            self.content.root = Some(expand::expand_env(root, "content.root")?);
        }

        Ok(())
    }

    /// Resolve relative paths against the config directory and fill defaults.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let defaults = ContentConfig::default();
        let raw = &self.content;

        self.content_resolved = ContentConfig {
            root: raw
                .root
                .as_deref()
                .map_or_else(|| config_dir.to_path_buf(), |r| config_dir.join(r)),
            source: raw.source.unwrap_or(defaults.source),
            staleness: raw.staleness.unwrap_or(defaults.staleness),
            diagram_tag: raw.diagram_tag.clone().unwrap_or(defaults.diagram_tag),
            fallback_to_document: raw
                .fallback_to_document
                .unwrap_or(defaults.fallback_to_document),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/srv"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8100);
        assert_eq!(config.server.prefix, "/mermaid/");
        assert_eq!(config.renderer.command, "mmdc");
        assert_eq!(config.renderer.width, 980);
        assert_eq!(config.renderer.height, 1080);
        assert_eq!(config.renderer.timeout(), Duration::from_secs(10));
        assert_eq!(config.content_resolved.root, PathBuf::from("/srv"));
        assert_eq!(config.content_resolved.source, SourceMode::Auto);
        assert_eq!(config.content_resolved.staleness, StalenessMode::Simple);
        assert_eq!(config.content_resolved.diagram_tag, "mermaid");
        assert!(config.content_resolved.fallback_to_document);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8100);
        assert_eq!(config.renderer.command, "mmdc");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
prefix = "/diagrams/"

[renderer]
command = "npx mmdc -p puppeteer.json"
width = 640
height = 480
timeout_secs = 5

[content]
root = "site"
source = "markdown"
staleness = "calendar_day"
diagram_tag = "Mermaid"
fallback_to_document = false
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.prefix, "/diagrams/");
        assert_eq!(config.renderer.width, 640);
        assert_eq!(config.renderer.height, 480);
        assert_eq!(config.renderer.timeout_secs, 5);
        assert_eq!(config.content_resolved.root, PathBuf::from("/project/site"));
        assert_eq!(config.content_resolved.source, SourceMode::Markdown);
        assert_eq!(config.content_resolved.staleness, StalenessMode::CalendarDay);
        assert_eq!(config.content_resolved.diagram_tag, "Mermaid");
        assert!(!config.content_resolved.fallback_to_document);
    }

    #[test]
    fn test_resolve_paths_defaults_root_to_config_dir() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.content_resolved.root, PathBuf::from("/project"));
        assert_eq!(config.content_resolved.source, SourceMode::Auto);
    }

    #[test]
    fn test_unknown_source_mode_rejected() {
        let result: Result<Config, _> = toml::from_str("[content]\nsource = \"html\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_split_command() {
        let renderer = RendererConfig {
            command: "  mmdc   -p  puppeteer.json ".to_owned(),
            ..RendererConfig::default()
        };
        let (program, args) = renderer.split_command().unwrap();
        assert_eq!(program, "mmdc");
        assert_eq!(args, vec!["-p".to_owned(), "puppeteer.json".to_owned()]);
    }

    #[test]
    fn test_split_command_blank() {
        let renderer = RendererConfig {
            command: "   ".to_owned(),
            ..RendererConfig::default()
        };
        let err = renderer.split_command().unwrap_err();
        assert!(err.to_string().contains("renderer.command"));
    }

    #[test]
    fn test_staleness_mode_from_str() {
        assert_eq!("simple".parse(), Ok(StalenessMode::Simple));
        assert_eq!("calendar-day".parse(), Ok(StalenessMode::CalendarDay));
        assert_eq!("calendar_day".parse(), Ok(StalenessMode::CalendarDay));
        assert!("weekly".parse::<StalenessMode>().is_err());
        assert_eq!(StalenessMode::CalendarDay.to_string(), "calendar-day");
    }

    #[test]
    fn test_apply_cli_settings_multiple() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        let overrides = CliSettings {
            port: Some(9000),
            prefix: Some("/".to_owned()),
            root: Some(PathBuf::from("/data")),
            command: Some("mmdc --quiet".to_owned()),
            width: Some(300),
            timeout_secs: Some(3),
            staleness: Some(StalenessMode::CalendarDay),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1"); // Unchanged
        assert_eq!(config.server.prefix, "/");
        assert_eq!(config.content_resolved.root, PathBuf::from("/data"));
        assert_eq!(config.renderer.command, "mmdc --quiet");
        assert_eq!(config.renderer.width, 300);
        assert_eq!(config.renderer.height, 1080); // Unchanged
        assert_eq!(config.renderer.timeout_secs, 3);
        assert_eq!(config.content_resolved.staleness, StalenessMode::CalendarDay);
    }

    #[test]
    fn test_expand_env_vars_renderer_command() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("MMDGEN_CONFIG_TEST_BIN", "/usr/local/bin/mmdc");
        }

        let toml = r#"
[renderer]
command = "${MMDGEN_CONFIG_TEST_BIN} --quiet"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        assert_eq!(config.renderer.command, "/usr/local/bin/mmdc --quiet");

        unsafe {
            std::env::remove_var("MMDGEN_CONFIG_TEST_BIN");
        }
    }

    #[test]
    fn test_expand_env_vars_content_root_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MMDGEN_CONFIG_TEST_ROOT");
        }

        let toml = r#"
[content]
root = "${MMDGEN_CONFIG_TEST_ROOT:-public}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.content_resolved.root, PathBuf::from("/project/public"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/mmdgen.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/srv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.server.host = String::new();
        assert_validation_error(&config, &["server.host", "empty"]);
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.server.port = 0;
        assert_validation_error(&config, &["server.port"]);
    }

    #[test]
    fn test_validate_prefix_without_slashes() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.server.prefix = "mermaid".to_owned();
        assert_validation_error(&config, &["server.prefix", "'/'"]);

        config.server.prefix = "/mermaid".to_owned();
        assert_validation_error(&config, &["server.prefix"]);

        config.server.prefix = "/".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.renderer.command = " ".to_owned();
        assert_validation_error(&config, &["renderer.command", "empty"]);
    }

    #[test]
    fn test_validate_zero_dimensions() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.renderer.width = 0;
        assert_validation_error(&config, &["renderer.width", "greater than 0"]);

        let mut config = Config::default_with_base(Path::new("/srv"));
        config.renderer.height = 0;
        assert_validation_error(&config, &["renderer.height"]);
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.renderer.timeout_secs = 0;
        assert_validation_error(&config, &["renderer.timeout_secs"]);
    }

    #[test]
    fn test_validate_empty_diagram_tag() {
        let mut config = Config::default_with_base(Path::new("/srv"));
        config.content_resolved.diagram_tag = String::new();
        assert_validation_error(&config, &["content.diagram_tag"]);
    }
}
