use crate::config::types::{ConfigFile, SessionOptions};
use crate::session::libs::{Library, library_by_name};
use shellexpand::full;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::{env, fs};

use dirs::home_dir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("unknown standard library '{0}'")]
    UnknownLibrary(String),

    #[error("library '{0}' is unsafe and can't be opened")]
    UnsafeLibrary(String),

    #[error("failed to expand '{value}': {message}")]
    Expand { value: String, message: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load session options from `config_path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the default
    /// options.
    pub fn load(config_path: Option<&Path>) -> Result<SessionOptions, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        if config_path.is_none() && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(SessionOptions::default());
        }

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let cf: ConfigFile = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        Self::resolve(cf)
    }

    /// Parse options from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<SessionOptions, ConfigError> {
        let cf: ConfigFile = toml::from_str(source)
            .map_err(|e| ConfigError::ParseError("<inline>".to_string(), e))?;
        Self::resolve(cf)
    }

    fn resolve(cf: ConfigFile) -> Result<SessionOptions, ConfigError> {
        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }

        let mut options = cf.session;
        for name in options.load.iter().chain(&options.preload) {
            check_library(name)?;
        }
        options.package_path = options
            .package_path
            .iter()
            .map(|entry| expand(entry))
            .collect::<Result<_, _>>()?;

        Ok(options)
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("luaw").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("luaw").join("config.toml")
}

pub(crate) fn check_library(name: &str) -> Result<Library, ConfigError> {
    match library_by_name(name) {
        Some(Library::Debug) => Err(ConfigError::UnsafeLibrary(name.to_string())),
        Some(lib) => Ok(lib),
        None => Err(ConfigError::UnknownLibrary(name.to_string())),
    }
}

pub(crate) fn expand(input: &str) -> Result<String, ConfigError> {
    full(input)
        .map(Cow::into_owned)
        .map_err(|e| ConfigError::Expand {
            value: input.to_string(),
            message: e.to_string(),
        })
}
