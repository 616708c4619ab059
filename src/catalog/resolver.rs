use std::sync::Arc;

use parking_lot::RwLock;
use strum::{Display, IntoStaticStr};
use tracing::{debug, error};

use super::error::CatalogError;
use super::models::{normalize_name, Pokemon, PokemonId};
use crate::db::{PokemonFilter, PokemonStore, StoreError};

/// Addressing scheme that produced a lookup match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LookupScheme {
    Number,
    Identifier,
    Name,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionStats {
    pub by_number: u64,
    pub by_identifier: u64,
    pub by_name: u64,
    pub misses: u64,
}

/// Maps one token to one stored record.
///
/// Schemes are tried in a fixed order and the first match wins:
/// 1. catalog number, when the token is numeric
/// 2. store identifier, when the token has the identifier format
/// 3. name, after trimming and lowercasing
pub struct LookupResolver {
    store: Arc<dyn PokemonStore>,
    stats: RwLock<ResolutionStats>,
}

impl LookupResolver {
    pub fn new(store: Arc<dyn PokemonStore>) -> Self {
        Self {
            store,
            stats: RwLock::new(ResolutionStats::default()),
        }
    }

    pub async fn resolve(&self, token: &str) -> Result<Pokemon, CatalogError> {
        self.resolve_with_scheme(token).await.map(|(pokemon, _)| pokemon)
    }

    pub async fn resolve_with_scheme(
        &self,
        token: &str,
    ) -> Result<(Pokemon, LookupScheme), CatalogError> {
        debug!("Resolving token: {:?}", token);

        let found = self.lookup(token).await.map_err(|e| {
            error!("Store failure while resolving {:?}: {}", token, e);
            CatalogError::internal("find")
        })?;

        let mut stats = self.stats.write();
        match found {
            Some((pokemon, scheme)) => {
                match scheme {
                    LookupScheme::Number => stats.by_number += 1,
                    LookupScheme::Identifier => stats.by_identifier += 1,
                    LookupScheme::Name => stats.by_name += 1,
                }
                debug!("Resolved {:?} by {} -> {}", token, scheme, pokemon.id);
                Ok((pokemon, scheme))
            }
            None => {
                stats.misses += 1;
                debug!("No scheme matched {:?}", token);
                Err(CatalogError::not_found(token))
            }
        }
    }

    async fn lookup(&self, token: &str) -> Result<Option<(Pokemon, LookupScheme)>, StoreError> {
        if let Some(no) = parse_numeric(token).and_then(as_catalog_no) {
            if let Some(pokemon) = self.store.find_one(PokemonFilter::No(no)).await? {
                return Ok(Some((pokemon, LookupScheme::Number)));
            }
        }

        if self.store.is_valid_identifier(token) {
            if let Some(id) = PokemonId::parse(token) {
                if let Some(pokemon) = self.store.find_by_id(&id).await? {
                    return Ok(Some((pokemon, LookupScheme::Identifier)));
                }
            }
        }

        let name = normalize_name(token);
        Ok(self
            .store
            .find_one(PokemonFilter::Name(name))
            .await?
            .map(|pokemon| (pokemon, LookupScheme::Name)))
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats.read().clone()
    }
}

/// Numeric value of `token` when the whole (trimmed) token is a finite number.
fn parse_numeric(token: &str) -> Option<f64> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn as_catalog_no(value: f64) -> Option<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}
