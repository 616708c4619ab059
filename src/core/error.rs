use thiserror::Error;

use crate::catalog::CatalogError;
use crate::db::StoreError;
use crate::seed::SeedError;

#[derive(Error, Debug)]
pub enum PokedexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),
}

pub type Result<T> = std::result::Result<T, PokedexError>;
