mod service;

pub use service::{pokemon_no_from_url, PokeListing, PokeResponse, SeedError, SeedReport, SeedService};
