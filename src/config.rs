use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{GatewayError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "sena_geo.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub collections: Collections,
}

/// Where the backend lives and how this client identifies itself to it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project_id: String,
    pub platform: String,
    pub timeout_seconds: u64,
}

/// Database, collection and bucket ids every gateway call is scoped to.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Collections {
    pub database_id: String,
    pub user_collection_id: String,
    pub restaurant_collection_id: String,
    pub reviews_collection_id: String,
    pub itineraries_collection_id: String,
    pub storage_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloud.appwrite.io/v1".to_string(),
            project_id: "66cc8d2c000d3335fd3d".to_string(),
            platform: "com.sena.geo".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            database_id: "66cc8f28002240054e44".to_string(),
            user_collection_id: "66cc8f98000395ea7171".to_string(),
            restaurant_collection_id: "66df52ee001bf89cc217".to_string(),
            reviews_collection_id: "66dfc280001113492c6f".to_string(),
            itineraries_collection_id: "66fdbc250014e8bebee6".to_string(),
            storage_id: "66cc90d0000c80983b59".to_string(),
        }
    }
}

impl Config {
    /// Loads `sena_geo.toml` from the working directory if it exists, then
    /// applies environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Like [`Config::load`] but reads `path` instead of the default file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("SENA_GEO_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Ok(project_id) = std::env::var("SENA_GEO_PROJECT_ID") {
            self.backend.project_id = project_id;
        }
        if let Ok(platform) = std::env::var("SENA_GEO_PLATFORM") {
            self.backend.platform = platform;
        }
        if let Ok(database_id) = std::env::var("SENA_GEO_DATABASE_ID") {
            self.collections.database_id = database_id;
        }
        if let Ok(raw) = std::env::var("SENA_GEO_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(timeout) => self.backend.timeout_seconds = timeout,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid SENA_GEO_TIMEOUT_SECS"),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.backend.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(GatewayError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.backend.endpoint
            )));
        }

        let required = [
            ("backend.project_id", &self.backend.project_id),
            ("backend.platform", &self.backend.platform),
            ("collections.database_id", &self.collections.database_id),
            ("collections.user_collection_id", &self.collections.user_collection_id),
            ("collections.restaurant_collection_id", &self.collections.restaurant_collection_id),
            ("collections.reviews_collection_id", &self.collections.reviews_collection_id),
            ("collections.itineraries_collection_id", &self.collections.itineraries_collection_id),
            ("collections.storage_id", &self.collections.storage_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(GatewayError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}
