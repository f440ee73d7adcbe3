// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use studybuddy_app::MAX_IMAGE_SIZE;
use studybuddy_llm::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TEMPERATURE,
};

pub const APP_NAME: &str = "studybuddy";
const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "STUDYBUDDY_CONFIG_PATH";
const DEFAULT_TIMEOUT: &str = "60s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub llm: Llm,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            llm: Llm::default(),
            chat: Chat::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Llm {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<String>,
    pub max_tokens: Option<i64>,
    pub temperature: Option<f64>,
    pub system_prompt: Option<String>,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            model: Some(DEFAULT_MODEL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            max_tokens: Some(i64::from(DEFAULT_MAX_TOKENS)),
            temperature: Some(f64::from(DEFAULT_TEMPERATURE)),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub max_image_size: Option<i64>,
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            max_image_size: Some(MAX_IMAGE_SIZE as i64),
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
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
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
                    "config file {} is not versioned. Add `version = 1` and put values under [llm], [chat], and [log]",
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

        if let Some(timeout) = &self.llm.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "llm.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(max_tokens) = self.llm.max_tokens
            && !(1..=i64::from(u32::MAX)).contains(&max_tokens)
        {
            bail!(
                "llm.max_tokens in {} must be positive, got {}",
                path.display(),
                max_tokens
            );
        }

        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            bail!(
                "llm.temperature in {} must be between 0 and 2, got {}",
                path.display(),
                temperature
            );
        }

        if let Some(max_size) = self.chat.max_image_size
            && max_size <= 0
        {
            bail!(
                "chat.max_image_size in {} must be positive, got {}",
                path.display(),
                max_size
            );
        }

        if let Some(level) = &self.log.level
            && level.trim().is_empty()
        {
            bail!("log.level in {} must not be empty", path.display());
        }

        Ok(())
    }

    pub fn llm_base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn llm_timeout(&self) -> Result<Duration> {
        parse_duration(self.llm.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn llm_max_tokens(&self) -> u32 {
        self.llm
            .max_tokens
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn llm_temperature(&self) -> f32 {
        self.llm
            .temperature
            .map(|value| value as f32)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn llm_system_prompt(&self) -> &str {
        self.llm
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn max_image_size(&self) -> u64 {
        self.chat
            .max_image_size
            .and_then(|value| u64::try_from(value).ok())
            .unwrap_or(MAX_IMAGE_SIZE)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Explicit `[log] file`, else `<cache dir>/studybuddy/studybuddy.log`.
    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let cache_root = dirs::cache_dir().ok_or_else(|| {
            anyhow!("cannot resolve cache directory; set [log] file in the config")
        })?;
        Ok(cache_root.join(APP_NAME).join(format!("{APP_NAME}.log")))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# studybuddy config\n# Place this file at: {}\n# The OpenAI API key is never read from this file; type it into the chat screen.\n\nversion = 1\n\n[llm]\nbase_url = \"{}\"\nmodel = \"{}\"\ntimeout = \"{}\"\nmax_tokens = {}\ntemperature = {}\nsystem_prompt = \"{}\"\n\n[chat]\n# Largest image, in bytes, accepted as an attachment.\nmax_image_size = {}\n\n[log]\n# tracing EnvFilter directive, for example \"debug\" or \"studybuddy_llm=debug\"\nlevel = \"{}\"\n# Optional. Default is the platform cache dir (for example ~/.cache/studybuddy/studybuddy.log)\n# file = \"/absolute/path/to/studybuddy.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            DEFAULT_TIMEOUT,
            DEFAULT_MAX_TOKENS,
            DEFAULT_TEMPERATURE,
            DEFAULT_SYSTEM_PROMPT,
            MAX_IMAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
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

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 60s)")
}
