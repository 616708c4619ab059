use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// No addressing scheme matched the token.
    #[error("Pokemon with id {token} not found")]
    NotFound { token: String },

    /// A unique field collided with an existing record.
    #[error("Pokemon exists in db {key_value}")]
    Conflict { key_value: Value },

    /// Any other store failure. The cause is logged, not carried.
    #[error("{0}")]
    Internal(String),
}

impl CatalogError {
    pub fn not_found(token: impl Into<String>) -> Self {
        Self::NotFound {
            token: token.into(),
        }
    }

    pub(crate) fn internal(operation: &str) -> Self {
        Self::Internal(format!("Can't {} Pokemon - Check server logs", operation))
    }
}
