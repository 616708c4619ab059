pub mod client;
pub mod helix;
pub mod memory;
pub mod store;

use std::sync::Arc;

use tracing::info;

pub use client::{HelixClient, HelixClientError};
pub use helix::HelixStore;
pub use memory::MemoryStore;
pub use store::{PokemonFilter, PokemonStore, StoreError};

use crate::core::config::{PokedexConfig, StoreBackend};

/// Builds the store selected by `config.store`, connecting first when the
/// backend is remote.
pub async fn connect_store(config: &PokedexConfig) -> Result<Arc<dyn PokemonStore>, StoreError> {
    let store: Arc<dyn PokemonStore> = match config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Helix => {
            let client = HelixClient::from_config(config);
            client
                .connect()
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            Arc::new(HelixStore::new(Arc::new(client)))
        }
    };

    info!("Store ready: {}", store.backend_name());
    Ok(store)
}
