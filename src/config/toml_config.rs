use crate::utils::error::{Result, SqmError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ORDERS_HUB_PATH: &str = "/hubs/orders";
pub const DEFAULT_CHAT_HUB_PATH: &str = "/hubs/chat";
pub const DEFAULT_SESSION_PATH: &str = ".sqm/session.json";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
// Servers hold a long poll for up to 100 seconds.
const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 110;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub maps: MapsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    pub orders_path: Option<String>,
    pub chat_path: Option<String>,
    pub reconnect_delays_seconds: Option<Vec<u64>>,
    pub poll_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapsConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub path: Option<String>,
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| SqmError::config(format!("TOML parsing error: {}", e)))
    }

    /// Builds a configuration from `SQM_API_URL` and `SQM_MAPS_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SQM_API_URL").map_err(|_| SqmError::MissingConfig {
            field: "SQM_API_URL".to_string(),
        })?;

        Ok(Self {
            api: ApiConfig {
                base_url,
                timeout_seconds: None,
            },
            hub: HubConfig::default(),
            maps: MapsConfig {
                api_key: std::env::var("SQM_MAPS_API_KEY").ok(),
            },
            session: SessionConfig {
                path: std::env::var("SQM_SESSION_PATH").ok(),
            },
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| SqmError::config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;

        if let Some(timeout) = self.api.timeout_seconds {
            validation::validate_positive_number("api.timeout_seconds", timeout, 1)?;
        }
        if let Some(path) = &self.hub.orders_path {
            validation::validate_hub_path("hub.orders_path", path)?;
        }
        if let Some(path) = &self.hub.chat_path {
            validation::validate_hub_path("hub.chat_path", path)?;
        }
        if let Some(timeout) = self.hub.poll_timeout_seconds {
            validation::validate_positive_number("hub.poll_timeout_seconds", timeout, 1)?;
        }
        if let Some(delays) = &self.hub.reconnect_delays_seconds {
            for delay in delays {
                validation::validate_range("hub.reconnect_delays_seconds", *delay, 0, 3600)?;
            }
        }
        if let Some(key) = &self.maps.api_key {
            validation::validate_non_empty_string("maps.api_key", key)?;
        }
        if let Some(path) = &self.session.path {
            validation::validate_path("session.path", path)?;
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(
            self.hub
                .poll_timeout_seconds
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECONDS),
        )
    }

    pub fn orders_hub_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url(),
            self.hub.orders_path.as_deref().unwrap_or(DEFAULT_ORDERS_HUB_PATH)
        )
    }

    pub fn chat_hub_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url(),
            self.hub.chat_path.as_deref().unwrap_or(DEFAULT_CHAT_HUB_PATH)
        )
    }

    /// `None` means the built-in reconnect schedule.
    pub fn reconnect_delays(&self) -> Option<Vec<Duration>> {
        self.hub
            .reconnect_delays_seconds
            .as_ref()
            .map(|delays| delays.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    pub fn maps_api_key(&self) -> Option<&str> {
        self.maps.api_key.as_deref()
    }

    pub fn session_path(&self) -> &str {
        self.session.path.as_deref().unwrap_or(DEFAULT_SESSION_PATH)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
