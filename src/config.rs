use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const API_URL_ENV: &str = "PODCASTER_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub list_limit: usize,
    pub warm_limit: usize,
    pub revalidate_secs: u64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub attempts: usize,
    pub retry_delay_ms: u64,
    pub player_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3333".to_string(),
            list_limit: 12,
            warm_limit: 2,
            revalidate_secs: 60 * 60 * 24,
            connect_timeout_ms: 3_000,
            read_timeout_ms: 8_000,
            attempts: 3,
            retry_delay_ms: 400,
            player_command: vec!["mpv".to_string(), "--no-video".to_string()],
        }
    }
}

impl Config {
    /// Reads the config file when present, then applies the environment and
    /// the command line, in that order.
    pub fn load(path: &Path, api_url_flag: Option<&str>) -> Result<Self> {
        let env_url = env::var(API_URL_ENV).ok();
        Self::load_with(path, api_url_flag, env_url.as_deref())
    }

    pub fn load_with(
        path: &Path,
        api_url_flag: Option<&str>,
        api_url_env: Option<&str>,
    ) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::parse(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        } else {
            Self::default()
        };

        if let Some(url) = api_url_env
            && !url.trim().is_empty()
        {
            config.api_url = url.to_string();
        }
        if let Some(url) = api_url_flag {
            config.api_url = url.to_string();
        }
        config.api_url = config.api_url.trim().trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn revalidate_after(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").expect("empty toml parses");
        assert_eq!(config, Config::default());
        assert_eq!(config.revalidate_after(), Duration::from_secs(86_400));
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config = Config::parse(
            r#"
            api_url = "https://podcast.example.test/api"
            list_limit = 30
            player_command = ["vlc", "--intf", "dummy"]
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.api_url, "https://podcast.example.test/api");
        assert_eq!(config.list_limit, 30);
        assert_eq!(config.player_command, ["vlc", "--intf", "dummy"]);
        assert_eq!(config.warm_limit, 2);
        assert_eq!(config.attempts, 3);
    }

    #[test]
    fn rejects_wrong_value_types() {
        let err = Config::parse("list_limit = \"many\"").expect_err("string is not a usize");
        assert!(err.to_string().contains("list_limit"), "unexpected: {err}");
    }

    fn config_file(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!(
            "podcaster-config-{}-{name}.toml",
            std::process::id()
        ));
        fs::write(&path, contents).expect("write config file");
        path
    }

    #[test]
    fn flag_wins_and_trailing_slash_is_trimmed() {
        let missing = Path::new("/nonexistent/podcaster/config.toml");
        let config = Config::load_with(
            missing,
            Some("http://api.example.test/"),
            Some("http://env.example.test"),
        )
        .expect("defaults load");
        assert_eq!(config.api_url, "http://api.example.test");
    }

    #[test]
    fn api_url_precedence_is_flag_env_file_default() {
        let path = config_file("precedence", "api_url = \"http://file.example.test\"\n");

        let from_file = Config::load_with(&path, None, None).expect("file load");
        assert_eq!(from_file.api_url, "http://file.example.test");

        let from_env =
            Config::load_with(&path, None, Some("http://env.example.test/")).expect("env load");
        assert_eq!(from_env.api_url, "http://env.example.test");

        let blank_env = Config::load_with(&path, None, Some("  ")).expect("blank env load");
        assert_eq!(blank_env.api_url, "http://file.example.test");

        let from_flag = Config::load_with(
            &path,
            Some("http://flag.example.test"),
            Some("http://env.example.test"),
        )
        .expect("flag load");
        assert_eq!(from_flag.api_url, "http://flag.example.test");

        let _ = fs::remove_file(&path);

        let missing = Path::new("/nonexistent/podcaster/config.toml");
        let defaults = Config::load_with(missing, None, None).expect("defaults load");
        assert_eq!(defaults.api_url, "http://localhost:3333");
    }

    #[test]
    fn malformed_file_error_names_the_path() {
        let path = config_file("malformed", "attempts = [");
        let err = Config::load_with(&path, None, None).expect_err("invalid toml");
        let _ = fs::remove_file(&path);
        assert!(
            format!("{err:#}").contains(&path.display().to_string()),
            "unexpected: {err:#}"
        );
    }
}
