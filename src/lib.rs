pub mod catalog;
pub mod core;
pub mod db;
pub mod mcp;
pub mod seed;

pub use catalog::{
    CatalogError, CatalogService, LookupResolver, LookupScheme, NewPokemon, Pokemon, PokemonId,
    PokemonPatch,
};
pub use crate::core::config::{PokedexConfig, StoreBackend};
pub use crate::core::error::{PokedexError, Result};
pub use db::{HelixClient, HelixStore, MemoryStore, PokemonStore, StoreError};
pub use seed::{SeedReport, SeedService};


pub const DEFAULT_HELIX_PORT: u16 = 6969;


pub const DEFAULT_POKEAPI_URL: &str = "https://pokeapi.co/api/v2";


pub const DEFAULT_SEED_LIMIT: u32 = 650;
