use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::error::{PokedexError, Result};

pub const ENV_PREFIX: &str = "POKEDEX";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    #[default]
    Memory,
    Helix,
}

/// Runtime configuration, read from `POKEDEX_*` environment variables.
/// Unset variables keep the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PokedexConfig {
    pub store: StoreBackend,

    pub helix_host: String,
    pub helix_port: u16,
    pub max_retries: u32,

    /// HTTP client timeout in seconds.
    pub timeout: u64,
    pub pokeapi_url: String,
    pub seed_limit: u32,
    pub seed_concurrency: usize,
}

impl PokedexConfig {
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load(env: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<PokedexConfig>())
            .map_err(|e| PokedexError::Config(e.to_string()))
    }

    pub fn helix_url(&self) -> String {
        format!("http://{}:{}", self.helix_host, self.helix_port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for PokedexConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            helix_host: "localhost".to_string(),
            helix_port: crate::DEFAULT_HELIX_PORT,
            max_retries: 3,
            timeout: 30,
            pokeapi_url: crate::DEFAULT_POKEAPI_URL.to_string(),
            seed_limit: crate::DEFAULT_SEED_LIMIT,
            seed_concurrency: 8,
        }
    }
}
