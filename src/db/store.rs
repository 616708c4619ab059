use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::models::{NewPokemon, Pokemon, PokemonId, PokemonPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field (`no` or `name`) already belongs to another record.
    #[error("Duplicate key: {key_value}")]
    DuplicateKey { key_value: Value },
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store not connected")]
    NotConnected,
}

impl StoreError {
    pub fn duplicate(field: &str, value: impl Into<Value>) -> Self {
        let mut key_value = serde_json::Map::new();
        key_value.insert(field.to_string(), value.into());
        StoreError::DuplicateKey {
            key_value: Value::Object(key_value),
        }
    }
}

impl From<crate::db::HelixClientError> for StoreError {
    fn from(e: crate::db::HelixClientError) -> Self {
        match e {
            crate::db::HelixClientError::NotConnected => StoreError::NotConnected,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokemonFilter {
    All,
    No(u32),
    /// Matched verbatim; callers normalize first.
    Name(String),
}

impl PokemonFilter {
    pub fn matches(&self, pokemon: &Pokemon) -> bool {
        match self {
            PokemonFilter::All => true,
            PokemonFilter::No(no) => pokemon.no == *no,
            PokemonFilter::Name(name) => pokemon.name == *name,
        }
    }
}

/// Document store holding Pokemon records.
///
/// Implementations enforce uniqueness of `no` and `name`, reporting a
/// violation as [`StoreError::DuplicateKey`], and must be safe to share
/// across tasks.
#[async_trait]
pub trait PokemonStore: Send + Sync {
    async fn find(&self, filter: PokemonFilter) -> Result<Vec<Pokemon>, StoreError>;

    async fn find_by_id(&self, id: &PokemonId) -> Result<Option<Pokemon>, StoreError>;

    async fn find_one(&self, filter: PokemonFilter) -> Result<Option<Pokemon>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    async fn create(&self, doc: NewPokemon) -> Result<Pokemon, StoreError>;

    /// Returns whether a record with `id` existed.
    async fn update_one(&self, id: &PokemonId, patch: PokemonPatch) -> Result<bool, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: &PokemonId) -> Result<bool, StoreError>;

    fn is_valid_identifier(&self, raw: &str) -> bool {
        PokemonId::parse(raw).is_some()
    }

    fn backend_name(&self) -> &'static str;
}
