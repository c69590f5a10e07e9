// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use plancat_app::{PAGE_SIZE_OPTIONS, ScreenKind};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "plancat";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TOKEN_ENV: &str = "PLANCAT_TOKEN";
const DEFAULT_ROWS_PER_PAGE: usize = 10;
const DEFAULT_SCREEN: &str = "alignments";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            catalog: Catalog::default(),
            session: Session::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Some("10s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    pub user: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub rows_per_page: Option<usize>,
    pub default_screen: Option<String>,
    pub include_inactive: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            rows_per_page: Some(DEFAULT_ROWS_PER_PAGE),
            default_screen: Some(DEFAULT_SCREEN.to_owned()),
            include_inactive: Some(false),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("PLANCAT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set PLANCAT_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and place values under [catalog], [session], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(base_url) = &self.catalog.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "catalog.base_url in {} is empty; remove it or set a URL such as {}",
                path.display(),
                DEFAULT_BASE_URL
            );
        }

        if let Some(timeout) = &self.catalog.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("catalog.timeout in {}", path.display()))?;
            if parsed.is_zero() {
                bail!(
                    "catalog.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(token_env) = &self.session.token_env
            && token_env.trim().is_empty()
        {
            bail!(
                "session.token_env in {} must name an environment variable",
                path.display()
            );
        }

        if let Some(rows) = self.ui.rows_per_page
            && !PAGE_SIZE_OPTIONS.contains(&rows)
        {
            bail!(
                "ui.rows_per_page in {} must be one of {:?}, got {}",
                path.display(),
                PAGE_SIZE_OPTIONS,
                rows
            );
        }

        if let Some(screen) = &self.ui.default_screen
            && ScreenKind::parse(screen).is_none()
        {
            let known = ScreenKind::ALL
                .iter()
                .map(|screen| screen.label())
                .collect::<Vec<_>>()
                .join(", ");
            bail!(
                "ui.default_screen {:?} in {} is not a screen; use one of: {}",
                screen,
                path.display(),
                known
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {:?} in {} is not a valid filter directive",
                    level,
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    /// Configured URL first, then `PLANCAT_BASE_URL`, then the local default.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.catalog.base_url {
            return url.trim().trim_end_matches('/').to_owned();
        }
        match env::var("PLANCAT_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_owned(),
            _ => DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.catalog.timeout.as_deref().unwrap_or("10s"))
    }

    pub fn session_user(&self) -> &str {
        self.session.user.as_deref().unwrap_or("")
    }

    pub fn token_env(&self) -> &str {
        self.session.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV)
    }

    pub fn bearer_token(&self) -> Option<String> {
        env::var(self.token_env())
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn rows_per_page(&self) -> usize {
        self.ui.rows_per_page.unwrap_or(DEFAULT_ROWS_PER_PAGE)
    }

    pub fn default_screen(&self) -> ScreenKind {
        self.ui
            .default_screen
            .as_deref()
            .and_then(ScreenKind::parse)
            .unwrap_or(ScreenKind::Alignments)
    }

    pub fn include_inactive(&self) -> bool {
        self.ui.include_inactive.unwrap_or(false)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        match self.log.file.as_deref() {
            Some(file) if !file.trim().is_empty() => Ok(PathBuf::from(file)),
            _ => default_log_path(),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# plancat config\n# Place this file at: {}\n\nversion = 1\n\n[catalog]\n# PLANCAT_BASE_URL is used when base_url is not set here\nbase_url = \"{}\"\n# <N>ms, <N>s or <N>m\ntimeout = \"10s\"\n\n[session]\n# Shown in the status bar only\nuser = \"\"\n# Environment variable holding the bearer token\ntoken_env = \"{}\"\n\n[ui]\n# One of {:?}\nrows_per_page = {}\ndefault_screen = \"{}\"\n# Offer inactive catalog rows in pickers\ninclude_inactive = false\n\n[log]\n# tracing filter directive; RUST_LOG takes precedence\nlevel = \"{}\"\n# Default is the platform data dir (for example ~/.local/share/plancat/plancat.log)\n# file = \"/absolute/path/to/plancat.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TOKEN_ENV,
            PAGE_SIZE_OPTIONS,
            DEFAULT_ROWS_PER_PAGE,
            DEFAULT_SCREEN,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn default_log_path() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set [log].file in the config")
    })?;
    Ok(data_root.join(APP_NAME).join("plancat.log"))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use plancat_app::ScreenKind;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.rows_per_page(), 10);
        assert_eq!(config.default_screen(), ScreenKind::Alignments);
        assert!(!config.include_inactive());
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.token_env(), "PLANCAT_TOKEN");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[catalog]\nbase_url = \"http://x/api\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[catalog], [session], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[catalog]\nbase_url = \"https://plans.example/api/\"\ntimeout = \"2s\"\n[session]\nuser = \"ana\"\ntoken_env = \"PLANS_TOKEN\"\n[ui]\nrows_per_page = 25\ndefault_screen = \"links\"\ninclude_inactive = true\n[log]\nlevel = \"debug\"\nfile = \"/tmp/plancat-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://plans.example/api");
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        assert_eq!(config.session_user(), "ana");
        assert_eq!(config.token_env(), "PLANS_TOKEN");
        assert_eq!(config.rows_per_page(), 25);
        assert_eq!(config.default_screen(), ScreenKind::IndicatorLinks);
        assert!(config.include_inactive());
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_file()?, PathBuf::from("/tmp/plancat-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("PLANCAT_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("PLANCAT_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn base_url_prefers_config_over_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[catalog]\nbase_url = \"http://from-config/api\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("PLANCAT_BASE_URL", "http://from-env/api");
        }
        let config = Config::load(&path)?;
        let resolved = config.base_url();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("PLANCAT_BASE_URL");
        }
        assert_eq!(resolved, "http://from-config/api");
        Ok(())
    }

    #[test]
    fn base_url_falls_back_to_env_then_default() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        let config = Config::load(&path)?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("PLANCAT_BASE_URL", "http://from-env/api/");
        }
        let from_env = config.base_url();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("PLANCAT_BASE_URL");
        }
        assert_eq!(from_env, "http://from-env/api");
        assert_eq!(config.base_url(), "http://localhost:8080/api");
        Ok(())
    }

    #[test]
    fn bearer_token_reads_named_env_var() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[session]\ntoken_env = \"PLANCAT_TEST_TOKEN\"\n")?;
        let config = Config::load(&path)?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("PLANCAT_TEST_TOKEN", "secret");
        }
        let token = config.bearer_token();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::set_var("PLANCAT_TEST_TOKEN", "  ");
        }
        let blank = config.bearer_token();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("PLANCAT_TEST_TOKEN");
        }
        assert_eq!(token.as_deref(), Some("secret"));
        assert_eq!(blank, None);
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_invalid_duration() {
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        assert!(format!("{error:#}").contains("invalid"));
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[catalog]\ntimeout = \"0ms\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn rows_per_page_must_be_a_page_size_option() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\nrows_per_page = 7\n")?;
        let error = Config::load(&path).expect_err("odd page size should fail");
        let message = error.to_string();
        assert!(message.contains("ui.rows_per_page"));
        assert!(message.contains(&path.display().to_string()));
        Ok(())
    }

    #[test]
    fn unknown_default_screen_lists_choices() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\ndefault_screen = \"budgets\"\n")?;
        let error = Config::load(&path).expect_err("unknown screen should fail");
        let message = error.to_string();
        assert!(message.contains("budgets"));
        assert!(message.contains("alignments"));
        Ok(())
    }

    #[test]
    fn empty_base_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[catalog]\nbase_url = \"  \"\n")?;
        let error = Config::load(&path).expect_err("empty url should fail");
        assert!(error.to_string().contains("catalog.base_url"));
        Ok(())
    }

    #[test]
    fn blank_log_file_uses_default_location() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nfile = \"\"\n")?;
        let config = Config::load(&path)?;
        assert!(config.log_file()?.ends_with("plancat/plancat.log"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        for section in ["[catalog]", "[session]", "[ui]", "[log]"] {
            assert!(example.contains(section), "missing {section}");
        }
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.rows_per_page(), 10);
        assert_eq!(config.log_level(), "info");
        Ok(())
    }
}
