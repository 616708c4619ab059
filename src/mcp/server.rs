use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{CatalogError, CatalogService, NewPokemon, PokemonPatch};
use crate::core::config::PokedexConfig;
use crate::db::connect_store;
use crate::seed::{SeedError, SeedService};

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct CreatePokemonParams {
    #[schemars(description = "Catalog number (positive integer, unique)")]
    pub no: u32,
    #[schemars(description = "Pokemon name (stored lowercase, unique)")]
    pub name: String,
    #[schemars(description = "Optional extra descriptive fields")]
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct FindPokemonParams {
    #[schemars(description = "Catalog number, record id, or name")]
    pub term: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct UpdatePokemonParams {
    #[schemars(description = "Catalog number, record id, or name of the Pokemon to update")]
    pub term: String,
    #[schemars(description = "New catalog number")]
    pub no: Option<u32>,
    #[schemars(description = "New name")]
    pub name: Option<String>,
    #[schemars(description = "Extra fields to set")]
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct DeletePokemonParams {
    #[schemars(description = "Record id")]
    pub id: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SeedPokemonParams {
    #[schemars(description = "How many entries to import (default: configured seed limit)")]
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct PokedexMcpServer {
    catalog: Arc<CatalogService>,
    seeder: Arc<SeedService>,
    config: Arc<PokedexConfig>,
    tool_router: ToolRouter<Self>,
}

impl PokedexMcpServer {
    pub fn new(catalog: CatalogService, seeder: SeedService, config: PokedexConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            seeder: Arc::new(seeder),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn convert_error(err: CatalogError) -> McpError {
        let message = err.to_string();
        match err {
            CatalogError::NotFound { token } => {
                McpError::resource_not_found(message, Some(json!({ "term": token })))
            }
            CatalogError::Conflict { key_value } => {
                McpError::invalid_params(message, Some(json!({ "keyValue": key_value })))
            }
            CatalogError::Internal(_) => McpError::internal_error(message, None),
        }
    }

    fn convert_seed_error(err: SeedError) -> McpError {
        McpError::internal_error(format!("Seed failed: {}", err), None)
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn success<T: Serialize>(result: T) -> Result<CallToolResult, McpError> {
        let json = Self::result_to_json(result)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_router]
impl PokedexMcpServer {
    #[tool(description = "Create a Pokemon. Name is stored lowercase; no and name must be unique. Returns the stored record: {id, no, name, ...}")]
    async fn create_pokemon(
        &self,
        Parameters(params): Parameters<CreatePokemonParams>,
    ) -> Result<CallToolResult, McpError> {
        let input = NewPokemon {
            no: params.no,
            name: params.name,
            attributes: params.attributes.unwrap_or_default(),
        };
        input
            .validate()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        info!("Creating Pokemon #{} {}", input.no, input.name);
        let pokemon = self.catalog.create(input).await.map_err(Self::convert_error)?;
        Self::success(&pokemon)
    }

    #[tool(description = "List every Pokemon in the catalog. Returns: [{id, no, name, ...}]")]
    async fn list_pokemon(&self) -> Result<CallToolResult, McpError> {
        let pokemon = self.catalog.list().await.map_err(Self::convert_error)?;
        info!("Listing {} Pokemon", pokemon.len());
        Self::success(&pokemon)
    }

    #[tool(description = "Find one Pokemon by catalog number, record id, or name (tried in that order). Returns: {id, no, name, ...}")]
    async fn find_pokemon(
        &self,
        Parameters(params): Parameters<FindPokemonParams>,
    ) -> Result<CallToolResult, McpError> {
        let pokemon = self
            .catalog
            .find(&params.term)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&pokemon)
    }

    #[tool(description = "Update a Pokemon found by catalog number, record id, or name. Returns: {ok, message, results}")]
    async fn update_pokemon(
        &self,
        Parameters(params): Parameters<UpdatePokemonParams>,
    ) -> Result<CallToolResult, McpError> {
        let patch = PokemonPatch {
            no: params.no,
            name: params.name,
            attributes: params.attributes.unwrap_or_default(),
        };
        patch
            .validate()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        if patch.is_empty() {
            warn!("Empty update for {:?}", params.term);
        }

        info!("Updating Pokemon {:?}", params.term);
        let outcome = self
            .catalog
            .update(&params.term, patch)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&outcome)
    }

    #[tool(description = "Delete a Pokemon by record id. Succeeds even if no such record exists. Returns: {ok, message}")]
    async fn delete_pokemon(
        &self,
        Parameters(params): Parameters<DeletePokemonParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("Deleting Pokemon {}", params.id);
        let ack = self
            .catalog
            .delete(&params.id)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&ack)
    }

    #[tool(description = "Import Pokemon from PokeAPI into the catalog. Existing entries are counted as conflicts. Returns: {fetched, inserted, conflicts, skipped, failed}")]
    async fn seed_pokemon(
        &self,
        Parameters(params): Parameters<SeedPokemonParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or_else(|| self.seeder.limit());
        info!("Seeding up to {} Pokemon", limit);

        let report = self
            .seeder
            .populate(&self.catalog, Some(limit))
            .await
            .map_err(Self::convert_seed_error)?;
        Self::success(&report)
    }
}

#[tool_handler]
impl ServerHandler for PokedexMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "pokedex".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Pokemon catalog. Use find_pokemon with a catalog number, record id or name; \
                 create_pokemon/update_pokemon/delete_pokemon to edit; seed_pokemon to import \
                 from PokeAPI."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://pokedex", "pokedex-config".to_string()).no_annotation(),
                RawResource::new("status://store", "store-status".to_string()).no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let content = match uri.as_str() {
            "config://pokedex" => Self::result_to_json(&*self.config)?,
            "status://store" => {
                let records = self.catalog.list().await.map_err(Self::convert_error)?;
                let stats = self.catalog.resolution_stats();
                Self::result_to_json(json!({
                    "backend": self.catalog.store().backend_name(),
                    "records": records.len(),
                    "lookups": {
                        "by_number": stats.by_number,
                        "by_identifier": stats.by_identifier,
                        "by_name": stats.by_name,
                        "misses": stats.misses,
                    },
                }))?
            }
            _ => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {}", uri),
                    Some(json!({ "uri": uri })),
                ));
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(content, uri)],
        })
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    info!("Initializing Pokedex MCP Server...");

    let config = PokedexConfig::from_env()?;
    let store = connect_store(&config).await?;
    let catalog = CatalogService::new(store);
    let seeder = SeedService::from_config(&config)?;

    info!("Pokedex MCP Server ready");
    info!("   Store: {}", config.store);
    if config.store == crate::core::config::StoreBackend::Helix {
        info!("   HelixDB: {}", config.helix_url());
    }
    info!("   PokeAPI: {} (limit={})", config.pokeapi_url, config.seed_limit);

    let server = PokedexMcpServer::new(catalog, seeder, config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::time::Duration;

    fn server() -> PokedexMcpServer {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        let seeder =
            SeedService::new("https://pokeapi.co/api/v2", 650, 4, Duration::from_secs(5)).unwrap();
        PokedexMcpServer::new(catalog, seeder, PokedexConfig::default())
    }

    fn text_of(result: &CallToolResult) -> Value {
        let raw = serde_json::to_value(result).unwrap();
        let text = raw["content"][0]["text"].as_str().unwrap_or_default();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_find_by_each_scheme() {
        let server = server();
        let created = server
            .create_pokemon(Parameters(CreatePokemonParams {
                no: 25,
                name: "Pikachu".to_string(),
                attributes: None,
            }))
            .await
            .unwrap();
        let created = text_of(&created);
        assert_eq!(created["name"], json!("pikachu"));

        let id = created["id"].as_str().unwrap().to_string();
        for term in ["25", id.as_str(), " PIKACHU "] {
            let found = server
                .find_pokemon(Parameters(FindPokemonParams {
                    term: term.to_string(),
                }))
                .await
                .unwrap();
            assert_eq!(text_of(&found)["id"], json!(id));
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let server = server();
        let err = server
            .create_pokemon(Parameters(CreatePokemonParams {
                no: 0,
                name: "missingno".to_string(),
                attributes: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = server
            .create_pokemon(Parameters(CreatePokemonParams {
                no: 25,
                name: "pikachu".to_string(),
                attributes: Some(Map::from_iter([("id".to_string(), json!("hijacked"))])),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(server.catalog.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_error_mapping() {
        let not_found = PokedexMcpServer::convert_error(CatalogError::not_found("mew"));
        assert_eq!(not_found.code, ErrorCode::RESOURCE_NOT_FOUND);

        let conflict = PokedexMcpServer::convert_error(CatalogError::Conflict {
            key_value: json!({"no": 1}),
        });
        assert_eq!(conflict.code, ErrorCode::INVALID_PARAMS);

        let internal = PokedexMcpServer::convert_error(CatalogError::Internal("boom".into()));
        assert_eq!(internal.code, ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_update_and_delete_tools() {
        let server = server();
        server
            .create_pokemon(Parameters(CreatePokemonParams {
                no: 25,
                name: "pikachu".to_string(),
                attributes: None,
            }))
            .await
            .unwrap();

        let updated = server
            .update_pokemon(Parameters(UpdatePokemonParams {
                term: "pikachu".to_string(),
                no: None,
                name: Some("Raichu".to_string()),
                attributes: None,
            }))
            .await
            .unwrap();
        let updated = text_of(&updated);
        assert_eq!(updated["message"], json!("Pokemon pikachu updated"));
        assert_eq!(updated["results"]["name"], json!("raichu"));

        let deleted = server
            .delete_pokemon(Parameters(DeletePokemonParams {
                id: "not-an-id".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(text_of(&deleted), json!({"ok": true, "message": "Pokemon deleted"}));

        let listed = text_of(&server.list_pokemon().await.unwrap());
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }
}
