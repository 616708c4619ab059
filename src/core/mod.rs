pub mod config;
pub mod error;

pub use self::config::{PokedexConfig, StoreBackend};
pub use self::error::{PokedexError, Result};
