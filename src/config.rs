use std::{
    fs::{self, create_dir_all},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{session::Session, tunefeed_error::TunefeedError};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const TOKEN_ENV: &str = "TUNEFEED_TOKEN";
pub const USER_ID_ENV: &str = "TUNEFEED_USER_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub channels: Vec<Channel>,
    pub session: Option<Session>,
}

/// A session handed over by whatever signed the user in; overrides the
/// config file.
fn session_from_env() -> Option<Session> {
    let token = std::env::var(TOKEN_ENV).ok().filter(|token| !token.is_empty())?;
    let user_id = std::env::var(USER_ID_ENV).ok().filter(|id| !id.is_empty())?;
    Some(Session::new(token, user_id))
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            page_size: DEFAULT_PAGE_SIZE,
            channels: Vec::new(),
            session: None,
        }
    }
}

impl Config {
    /// Loads the user's config, writing a default one on first run so
    /// there is a file to edit.
    pub fn load() -> Result<Self, TunefeedError> {
        let path = Self::path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            config
        };
        if let Some(session) = session_from_env() {
            config.session = Some(session);
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, TunefeedError> {
        match fs::read_to_string(path) {
            Ok(data) => {
                let mut config: Config = toml::from_str(&data)?;
                config.page_size = config.page_size.max(1);
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TunefeedError> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn path() -> Result<PathBuf, TunefeedError> {
        let home = dirs::home_dir()
            .ok_or_else(|| TunefeedError::Config("could not find home directory".to_string()))?;
        Ok(home.join(".config").join("tunefeed").join("config.toml"))
    }
}
