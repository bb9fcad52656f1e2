//! CLI command implementations.

pub(crate) mod render;
pub(crate) mod serve;

use std::path::PathBuf;

use clap::Args;
use mmdgen_config::{CliSettings, Config, StalenessMode};

use crate::error::CliError;

pub(crate) use render::RenderArgs;
pub(crate) use serve::ServeArgs;

/// Configuration flags shared by all commands.
#[derive(Args)]
pub(crate) struct ConfigArgs {
    /// Path to configuration file (default: auto-discover mmdgen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content root holding sources and artifacts (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Renderer command line, split on whitespace (overrides config).
    #[arg(long, value_name = "CMD", env = "MMDGEN_EXEC")]
    exec: Option<String>,

    /// Default diagram width (overrides config).
    #[arg(long)]
    width: Option<u32>,

    /// Default diagram height (overrides config).
    #[arg(long)]
    height: Option<u32>,

    /// Render timeout in seconds (overrides config).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Artifact invalidation policy: simple or calendar-day (overrides config).
    #[arg(long)]
    staleness: Option<StalenessMode>,

    /// Enable verbose output (render timing and cache decisions).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl ConfigArgs {
    /// Load configuration, applying these flags and `extra` on top.
    pub(crate) fn load(&self, extra: CliSettings) -> Result<Config, CliError> {
        let settings = CliSettings {
            root: self.root.clone(),
            command: self.exec.clone(),
            width: self.width,
            height: self.height,
            timeout_secs: self.timeout,
            staleness: self.staleness,
            ..extra
        };
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> ConfigArgs {
        TestCli::try_parse_from(std::iter::once("mmdgen").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("mmdgen.toml");
        std::fs::write(
            &config_path,
            "[renderer]\ncommand = \"mmdc\"\nwidth = 640\n\n[content]\nstaleness = \"simple\"\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "--exec",
            "npx mmdc",
            "--height",
            "480",
            "--staleness",
            "calendar-day",
        ]);
        let config = args
            .load(CliSettings {
                port: Some(9000),
                ..CliSettings::default()
            })
            .unwrap();

        assert_eq!(config.renderer.command, "npx mmdc");
        assert_eq!(config.renderer.width, 640);
        assert_eq!(config.renderer.height, 480);
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.content_resolved.staleness,
            StalenessMode::CalendarDay
        );
        assert_eq!(config.content_resolved.root, tmp.path());
    }

    #[test]
    fn test_invalid_staleness_is_rejected() {
        let result = TestCli::try_parse_from(["mmdgen", "--staleness", "weekly"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_exec_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("mmdgen.toml");
        std::fs::write(&config_path, "").unwrap();

        let args = parse(&["--config", config_path.to_str().unwrap(), "--exec", "  "]);
        let err = args.load(CliSettings::default()).unwrap_err();

        assert!(matches!(err, CliError::Config(_)), "{err:?}");
    }
}
