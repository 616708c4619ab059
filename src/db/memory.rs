use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::store::{PokemonFilter, PokemonStore, StoreError};
use crate::catalog::models::{strip_reserved, NewPokemon, Pokemon, PokemonId, PokemonPatch};

/// Process-local store. Records keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Pokemon>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_unique(
        records: &[Pokemon],
        skip: Option<&PokemonId>,
        no: Option<u32>,
        name: Option<&str>,
    ) -> Result<(), StoreError> {
        for existing in records.iter().filter(|p| Some(&p.id) != skip) {
            if let Some(no) = no {
                if existing.no == no {
                    return Err(StoreError::duplicate("no", no));
                }
            }
            if let Some(name) = name {
                if existing.name == name {
                    return Err(StoreError::duplicate("name", name));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PokemonStore for MemoryStore {
    async fn find(&self, filter: PokemonFilter) -> Result<Vec<Pokemon>, StoreError> {
        let records = self.records.read();
        Ok(records.iter().filter(|p| filter.matches(p)).cloned().collect())
    }

    async fn find_by_id(&self, id: &PokemonId) -> Result<Option<Pokemon>, StoreError> {
        Ok(self.records.read().iter().find(|p| p.id == *id).cloned())
    }

    async fn find_one(&self, filter: PokemonFilter) -> Result<Option<Pokemon>, StoreError> {
        Ok(self.records.read().iter().find(|p| filter.matches(p)).cloned())
    }

    async fn create(&self, mut doc: NewPokemon) -> Result<Pokemon, StoreError> {
        let mut records = self.records.write();
        Self::check_unique(&records, None, Some(doc.no), Some(&doc.name))?;

        strip_reserved(&mut doc.attributes);
        let pokemon = Pokemon {
            id: PokemonId::new(),
            no: doc.no,
            name: doc.name,
            attributes: doc.attributes,
        };
        records.push(pokemon.clone());
        debug!("MemoryStore: inserted #{} {} ({})", pokemon.no, pokemon.name, pokemon.id);
        Ok(pokemon)
    }

    async fn update_one(&self, id: &PokemonId, patch: PokemonPatch) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        Self::check_unique(&records, Some(id), patch.no, patch.name.as_deref())?;

        match records.iter_mut().find(|p| p.id == *id) {
            Some(pokemon) => {
                patch.apply_to(pokemon);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: &PokemonId) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|p| p.id != *id);
        Ok(records.len() != before)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
