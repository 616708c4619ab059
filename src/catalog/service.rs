use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::CatalogError;
use super::models::{
    normalize_name, strip_reserved, DeleteAck, NewPokemon, Pokemon, PokemonId, PokemonPatch,
    UpdateOutcome,
};
use super::resolver::{LookupResolver, ResolutionStats};
use crate::db::{PokemonFilter, PokemonStore, StoreError};

/// CRUD operations over a [`PokemonStore`].
///
/// Names are trimmed and lowercased before every write, and attribute keys
/// that would shadow `id`, `no` or `name` are dropped. Store failures on
/// writes become [`CatalogError::Conflict`] (duplicate key) or
/// [`CatalogError::Internal`]; `NotFound` from the resolver passes through.
pub struct CatalogService {
    store: Arc<dyn PokemonStore>,
    resolver: LookupResolver,
}

impl CatalogService {
    pub fn new(store: Arc<dyn PokemonStore>) -> Self {
        info!("CatalogService initialized (store={})", store.backend_name());
        Self {
            resolver: LookupResolver::new(store.clone()),
            store,
        }
    }

    pub async fn create(&self, mut input: NewPokemon) -> Result<Pokemon, CatalogError> {
        input.name = normalize_name(&input.name);
        if strip_reserved(&mut input.attributes) > 0 {
            warn!("Dropped reserved attribute keys from new Pokemon #{}", input.no);
        }

        let pokemon = self
            .store
            .create(input)
            .await
            .map_err(|e| classify("create", e))?;

        info!("Created Pokemon #{} {} ({})", pokemon.no, pokemon.name, pokemon.id);
        Ok(pokemon)
    }

    pub async fn list(&self) -> Result<Vec<Pokemon>, CatalogError> {
        self.store.find(PokemonFilter::All).await.map_err(|e| {
            error!("Failed to list Pokemon: {}", e);
            CatalogError::internal("list")
        })
    }

    pub async fn find(&self, token: &str) -> Result<Pokemon, CatalogError> {
        self.resolver.resolve(token).await
    }

    /// Resolves `token`, writes the normalized patch and returns the
    /// pre-update record overlaid with the patch. The store is not re-read.
    /// A record removed between the lookup and the write is `NotFound`.
    pub async fn update(
        &self,
        token: &str,
        mut patch: PokemonPatch,
    ) -> Result<UpdateOutcome, CatalogError> {
        let pokemon = self.resolver.resolve(token).await?;

        if let Some(name) = patch.name.as_mut() {
            *name = normalize_name(name);
        }
        if strip_reserved(&mut patch.attributes) > 0 {
            warn!("Dropped reserved attribute keys from update of {}", pokemon.id);
        }

        let updated = self
            .store
            .update_one(&pokemon.id, patch.clone())
            .await
            .map_err(|e| classify("update", e))?;
        if !updated {
            return Err(CatalogError::not_found(token));
        }

        debug!("Updated Pokemon {} via token {:?}", pokemon.id, token);

        Ok(UpdateOutcome {
            ok: true,
            message: format!("Pokemon {} updated", pokemon.name),
            results: patch.overlay(&pokemon),
        })
    }

    /// Removes by store identifier without resolving or checking existence.
    pub async fn delete(&self, id: &str) -> Result<DeleteAck, CatalogError> {
        let Some(id) = PokemonId::parse(id) else {
            debug!("Delete of malformed id {:?} acknowledged without a store call", id);
            return Ok(DeleteAck::deleted());
        };

        let removed = self.store.delete_by_id(&id).await.map_err(|e| {
            error!("Failed to delete Pokemon {}: {}", id, e);
            CatalogError::internal("delete")
        })?;
        debug!("Delete {} (removed={})", id, removed);

        Ok(DeleteAck::deleted())
    }

    pub fn resolution_stats(&self) -> ResolutionStats {
        self.resolver.stats()
    }

    pub fn store(&self) -> &Arc<dyn PokemonStore> {
        &self.store
    }
}

fn classify(operation: &str, err: StoreError) -> CatalogError {
    match err {
        StoreError::DuplicateKey { key_value } => CatalogError::Conflict { key_value },
        other => {
            error!("Failed to {} Pokemon: {}", operation, other);
            CatalogError::internal(operation)
        }
    }
}
