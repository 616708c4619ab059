use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::client::{HelixClient, HelixClientError};
use super::store::{PokemonFilter, PokemonStore, StoreError};
use crate::catalog::models::{strip_reserved, NewPokemon, Pokemon, PokemonId, PokemonPatch};

/// Pokemon node as returned by the queries in `schema/queries.hx`.
/// Extra attributes are stored as a JSON object string.
#[derive(Debug, Deserialize)]
struct PokemonNode {
    id: String,
    no: i64,
    name: String,
    #[serde(default)]
    attributes: String,
}

impl TryFrom<PokemonNode> for Pokemon {
    type Error = StoreError;

    fn try_from(node: PokemonNode) -> Result<Self, Self::Error> {
        let id = PokemonId::parse(&node.id)
            .ok_or_else(|| StoreError::Backend(format!("invalid node id {}", node.id)))?;
        let no = u32::try_from(node.no)
            .map_err(|_| StoreError::Backend(format!("invalid catalog number {}", node.no)))?;
        let mut attributes = if node.attributes.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&node.attributes)?
        };
        strip_reserved(&mut attributes);

        Ok(Pokemon {
            id,
            no,
            name: node.name,
            attributes,
        })
    }
}

/// Indexed lookups answer with a single node, scans with a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<PokemonNode>),
    One(PokemonNode),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<PokemonNode> {
        match self {
            OneOrMany::Many(nodes) => nodes,
            OneOrMany::One(node) => vec![node],
        }
    }
}

#[derive(Deserialize)]
struct ManyOutput {
    #[serde(default)]
    pokemon: Option<OneOrMany>,
}

#[derive(Deserialize)]
struct OneOutput {
    pokemon: Option<PokemonNode>,
}

#[derive(Serialize)]
struct IdInput<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct NoInput {
    no: i64,
}

#[derive(Serialize)]
struct NameInput<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct AddPokemonInput {
    no: i64,
    name: String,
    attributes: String,
}

#[derive(Serialize)]
struct UpdatePokemonInput {
    id: String,
    no: i64,
    name: String,
    attributes: String,
}

/// [`PokemonStore`] backed by HelixDB.
///
/// HelixDB has no unique indexes, so `no` and `name` uniqueness is checked
/// with lookups before each write. Two concurrent writers can both pass the
/// check.
pub struct HelixStore {
    client: Arc<HelixClient>,
}

impl HelixStore {
    pub fn new(client: Arc<HelixClient>) -> Self {
        info!("HelixStore initialized ({})", client.base_url());
        Self { client }
    }

    async fn query_many<P: Serialize + Sync>(
        &self,
        query_name: &str,
        params: &P,
    ) -> Result<Vec<Pokemon>, StoreError> {
        let output: ManyOutput = match self.client.query(query_name, params).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        output
            .pokemon
            .unwrap_or_default()
            .into_vec()
            .into_iter()
            .map(Pokemon::try_from)
            .collect()
    }

    async fn ensure_unique(
        &self,
        skip: Option<&PokemonId>,
        no: Option<u32>,
        name: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(no) = no {
            if let Some(existing) = self.find_one(PokemonFilter::No(no)).await? {
                if Some(&existing.id) != skip {
                    return Err(StoreError::duplicate("no", no));
                }
            }
        }
        if let Some(name) = name {
            if let Some(existing) = self.find_one(PokemonFilter::Name(name.to_string())).await? {
                if Some(&existing.id) != skip {
                    return Err(StoreError::duplicate("name", name));
                }
            }
        }
        Ok(())
    }
}

fn encode_attributes(attributes: &Map<String, Value>) -> Result<String, StoreError> {
    let mut attributes = attributes.clone();
    strip_reserved(&mut attributes);
    Ok(serde_json::to_string(&attributes)?)
}

/// A delete of a node the server cannot find removed nothing.
fn deleted(result: Result<Value, HelixClientError>) -> Result<bool, StoreError> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PokemonStore for HelixStore {
    async fn find(&self, filter: PokemonFilter) -> Result<Vec<Pokemon>, StoreError> {
        match &filter {
            PokemonFilter::All => self.query_many("listPokemon", &serde_json::json!({})).await,
            PokemonFilter::No(no) => {
                self.query_many("getPokemonByNo", &NoInput { no: i64::from(*no) })
                    .await
            }
            PokemonFilter::Name(name) => {
                self.query_many("getPokemonByName", &NameInput { name })
                    .await
            }
        }
    }

    async fn find_by_id(&self, id: &PokemonId) -> Result<Option<Pokemon>, StoreError> {
        let id = id.to_string();
        let result: Result<OneOutput, HelixClientError> =
            self.client.query("getPokemonById", &IdInput { id: &id }).await;

        match result {
            Ok(OneOutput { pokemon: Some(node) }) => Ok(Some(node.try_into()?)),
            Ok(OneOutput { pokemon: None }) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, doc: NewPokemon) -> Result<Pokemon, StoreError> {
        self.ensure_unique(None, Some(doc.no), Some(&doc.name)).await?;

        let input = AddPokemonInput {
            no: i64::from(doc.no),
            name: doc.name,
            attributes: encode_attributes(&doc.attributes)?,
        };
        let output: OneOutput = self.client.query_once("addPokemon", &input).await?;
        let pokemon: Pokemon = output
            .pokemon
            .ok_or_else(|| StoreError::Backend("addPokemon returned no node".to_string()))?
            .try_into()?;

        debug!("HelixStore: inserted #{} {} ({})", pokemon.no, pokemon.name, pokemon.id);
        Ok(pokemon)
    }

    async fn update_one(&self, id: &PokemonId, patch: PokemonPatch) -> Result<bool, StoreError> {
        let Some(mut current) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        self.ensure_unique(Some(id), patch.no, patch.name.as_deref()).await?;

        patch.apply_to(&mut current);
        let input = UpdatePokemonInput {
            id: id.to_string(),
            no: i64::from(current.no),
            name: current.name,
            attributes: encode_attributes(&current.attributes)?,
        };
        let _: Value = self.client.query_once("updatePokemon", &input).await?;
        debug!("HelixStore: updated {}", id);
        Ok(true)
    }

    async fn delete_by_id(&self, id: &PokemonId) -> Result<bool, StoreError> {
        let id = id.to_string();
        let removed = deleted(
            self.client
                .query_once("deletePokemon", &IdInput { id: &id })
                .await,
        )?;
        debug!("HelixStore: delete {} (removed={})", id, removed);
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "helix"
    }
}
