use directories::BaseDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::resolver::AUTO_LANGUAGE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auto_pause: bool,

    // Dual subtitle track
    pub dual_sub_enabled: bool,
    pub dual_sub_language: String,

    // Target for full-text and per-word translations
    pub translate_language: String,
    pub translate_timeout_ms: u64,
    pub translate_concurrency: usize,

    // Delay handling
    pub subs_delay_ms: i64,
    pub delay_step_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_pause: false,

            dual_sub_enabled: false,
            dual_sub_language: AUTO_LANGUAGE.to_string(),

            translate_language: "en".to_string(),
            translate_timeout_ms: 30_000,
            translate_concurrency: 4,

            subs_delay_ms: 0,
            delay_step_ms: 500,
        }
    }
}

/// The values the engine reads; owned by the host and pushed in as events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub auto_pause: bool,
    pub dual_sub_enabled: bool,
    pub dual_sub_language: String,
    pub translate_language: String,
    pub subs_delay_ms: i64,
    pub delay_step_ms: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    pub fn default_config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("dualsubs").join("config.toml"))
    }

    pub fn config_path_from_env() -> Option<PathBuf> {
        std::env::var_os("DUALSUBS_CONFIG").map(PathBuf::from)
    }

    pub fn load() -> Self {
        let config_path = Self::config_path_from_env().or_else(Self::default_config_path);
        Self::load_from(config_path)
    }

    pub fn load_from(config_path: Option<PathBuf>) -> Self {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_path.as_ref() {
            figment = figment.merge(Toml::file(path));
        }

        // Env should take precedence over file/defaults.
        figment = figment.merge(Env::prefixed("DUALSUBS_"));

        match figment.extract::<Config>() {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Failed to load config, using defaults: {err}");
                Config::default()
            }
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            auto_pause: self.auto_pause,
            dual_sub_enabled: self.dual_sub_enabled,
            dual_sub_language: self.dual_sub_language.clone(),
            translate_language: self.translate_language.clone(),
            subs_delay_ms: self.subs_delay_ms,
            delay_step_ms: self.delay_step_ms,
        }
    }
}
