use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use eyre::{bail, Result, WrapErr};
use scribe_core::model::default_models_dir;
use scribe_core::{DevicePreference, ModelVariant};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub models_dir: Option<PathBuf>,
    pub download_missing: bool,
    pub n_threads: Option<i32>,
    pub device: String,
    pub temp_dir: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model: ModelVariant::default().to_string(),
            models_dir: None,
            download_missing: true,
            n_threads: None,
            device: "auto".to_string(),
            temp_dir: None,
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn model_variant(&self) -> Result<ModelVariant> {
        self.model.parse()
    }

    pub fn device_preference(&self) -> Result<DevicePreference> {
        self.device.parse()
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(default_models_dir)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .wrap_err_with(|| format!("invalid host '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Overrides file values with environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = var("WHISPER_MODEL") {
            self.model = model;
        }
        if let Some(dir) = var("WHISPER_MODELS_DIR") {
            self.models_dir = Some(PathBuf::from(dir));
        }
        if let Some(device) = var("WHISPER_DEVICE") {
            self.device = device;
        }
        if let Some(host) = var("SCRIBE_HOST") {
            self.host = host;
        }
        if let Some(port) = var("SCRIBE_PORT") {
            self.port = port
                .parse()
                .wrap_err_with(|| format!("invalid SCRIBE_PORT '{}'", port))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.model_variant()?;
        self.device_preference()?;
        self.addr()?;
        if self.n_threads.is_some_and(|n| n < 1) {
            bail!("n_threads must be at least 1");
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).wrap_err_with(|| format!("invalid config {}", path.display()))
}

/// Reads `config.toml` (or `$SCRIBE_CONFIG`) when present, then applies
/// environment overrides.
pub fn load_config() -> Result<Config> {
    let mut config = match std::env::var("SCRIBE_CONFIG") {
        Ok(path) => read_config(Path::new(&path))?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            read_config(Path::new(DEFAULT_CONFIG_PATH))?
        }
        Err(_) => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
