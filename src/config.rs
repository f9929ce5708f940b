use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::field_registry::FieldCriteria;
use crate::service::StubDelays;

const BLUEPRINT: &str = include_str!("../lexipen.toml");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Stub,
    Gemini,
    Openai,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Settings {
    pub backend: Backend,
    pub gemini_model: String,
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub custom_prompt_path: Option<String>,
    pub blur_grace_ms: u64,
    pub min_field_width: i32,
    pub min_field_height: i32,
    pub indicator_offset: i32,
    pub stub_delay_ms: u64,
    pub generate_delay_ms: u64,
    pub detect_delay_ms: u64,
    pub log_level: String,
    pub log_path: Option<String>,
}

impl Settings {
    /// Blueprint defaults, then the user's global file, then `./lexipen.toml`,
    /// then `LEXIPEN_*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let user = get_user_config_path();
        Self::from_sources(user.as_deref(), Some(Path::new("lexipen.toml")))
    }

    pub fn from_sources(user: Option<&Path>, local: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // 1. Built-in blueprint. Always present.
            .add_source(File::from_str(BLUEPRINT, FileFormat::Toml));
        // 2. User's global config, if any.
        if let Some(user) = user {
            builder = builder.add_source(File::from(user.to_path_buf()).required(false));
        }
        // 3. Local file from CWD.
        if let Some(local) = local {
            builder = builder.add_source(File::from(local.to_path_buf()).required(false));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("LEXIPEN").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.blur_grace_ms == 0 {
            return Err(ConfigError::Message("blur_grace_ms must be greater than zero".into()));
        }
        if self.min_field_width <= 0 || self.min_field_height <= 0 {
            return Err(ConfigError::Message("minimum field size must be positive".into()));
        }
        if self.backend == Backend::Openai && self.api_base.trim().is_empty() {
            return Err(ConfigError::Message("api_base is required for the openai backend".into()));
        }
        Ok(())
    }

    pub fn blur_grace(&self) -> Duration {
        Duration::from_millis(self.blur_grace_ms)
    }

    pub fn field_criteria(&self) -> FieldCriteria {
        FieldCriteria {
            min_width: self.min_field_width,
            min_height: self.min_field_height,
        }
    }

    pub fn stub_delays(&self) -> StubDelays {
        StubDelays {
            transform: Duration::from_millis(self.stub_delay_ms),
            generate: Duration::from_millis(self.generate_delay_ms),
            detect: Duration::from_millis(self.detect_delay_ms),
        }
    }

    /// Why the configured backend cannot be called at all, if it cannot.
    pub fn unavailable_reason(&self) -> Option<String> {
        match self.backend {
            Backend::Stub | Backend::Openai => None,
            Backend::Gemini => match std::env::var("GEMINI_API_KEY") {
                Ok(key) if !key.trim().is_empty() => None,
                _ => Some("GEMINI_API_KEY is not set".to_string()),
            },
        }
    }
}

pub fn get_user_config_path() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    path.push(".config");
    path.push("lexipen");
    path.push("lexipen.toml");
    Some(path)
}

pub fn save_api_key(api_key: &str) -> Result<PathBuf, anyhow::Error> {
    let user_config_path =
        get_user_config_path().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?;
    write_key(&user_config_path, "api_key", toml::Value::String(api_key.to_string()))?;
    Ok(user_config_path)
}

fn write_key(path: &Path, key: &str, value: toml::Value) -> Result<(), anyhow::Error> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let mut doc = config_str.parse::<toml::Table>()?;

    doc.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_alone_is_valid() {
        let settings = Settings::from_sources(None, None).unwrap();
        assert_eq!(settings.backend, Backend::Stub);
        assert_eq!(settings.blur_grace(), Duration::from_millis(200));
        assert_eq!(settings.field_criteria(), FieldCriteria { min_width: 50, min_height: 20 });
        assert_eq!(settings.indicator_offset, 45);
    }

    #[test]
    fn user_file_overrides_blueprint() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("lexipen.toml");
        fs::write(&user, "backend = \"gemini\"\nblur_grace_ms = 350\n").unwrap();
        let settings = Settings::from_sources(Some(&user), None).unwrap();
        assert_eq!(settings.backend, Backend::Gemini);
        assert_eq!(settings.blur_grace_ms, 350);
        assert_eq!(settings.gemini_model, "gemini-2.0-flash");
    }

    #[test]
    fn offline_backends_are_always_available() {
        let mut settings = Settings::from_sources(None, None).unwrap();
        assert_eq!(settings.unavailable_reason(), None);
        settings.backend = Backend::Openai;
        assert_eq!(settings.unavailable_reason(), None);
    }

    #[test]
    fn zero_grace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("lexipen.toml");
        fs::write(&local, "blur_grace_ms = 0\n").unwrap();
        assert!(Settings::from_sources(None, Some(&local)).is_err());
    }

    #[test]
    fn write_key_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lexipen.toml");
        write_key(&path, "backend", toml::Value::String("openai".into())).unwrap();
        write_key(&path, "api_key", toml::Value::String("sk-test".into())).unwrap();
        let table: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(table["backend"].as_str(), Some("openai"));
        assert_eq!(table["api_key"].as_str(), Some("sk-test"));
    }
}
