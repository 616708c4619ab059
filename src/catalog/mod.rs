pub mod error;
pub mod models;
pub mod resolver;
pub mod service;

pub use error::CatalogError;
pub use models::{
    normalize_name, DeleteAck, NewPokemon, Pokemon, PokemonId, PokemonPatch, UpdateOutcome,
    ValidationError,
};
pub use resolver::{LookupResolver, LookupScheme, ResolutionStats};
pub use service::CatalogService;
