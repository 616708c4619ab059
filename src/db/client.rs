use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::PokedexConfig;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10000;

#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query {query} failed: {message}")]
    Query { query: String, message: String },
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Client not connected")]
    NotConnected,
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

impl HelixClientError {
    /// The server answered, but the queried value does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            HelixClientError::Query { message, .. } => is_not_found(message),
            _ => false,
        }
    }
}

/// Named-query client for HelixDB.
///
/// Read queries go through [`HelixClient::query`], which retries with
/// exponential backoff. Writes use [`HelixClient::query_once`].
pub struct HelixClient {
    inner: HelixDB,
    is_connected: AtomicBool,
    base_url: String,
    max_retries: u32,
}

impl HelixClient {
    pub fn new(host: &str, port: u16, max_retries: u32) -> Self {
        let endpoint = format!("http://{}", host);
        let base_url = format!("http://{}:{}", host, port);

        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), None);

        info!("HelixClient created for {} (max_retries={})", base_url, max_retries);

        Self {
            inner,
            is_connected: AtomicBool::new(false),
            base_url,
            max_retries: max_retries.max(1),
        }
    }

    pub fn from_config(config: &PokedexConfig) -> Self {
        Self::new(&config.helix_host, config.helix_port, config.max_retries)
    }

    /// Probes the server once and marks the client connected.
    ///
    /// A "not found" answer for the probe query still proves the server is up.
    pub async fn connect(&self) -> Result<(), HelixClientError> {
        if self.is_connected() {
            return Ok(());
        }

        match self
            .query_once::<serde_json::Value, _>("health", &serde_json::json!({}))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!("Health query not deployed, server answered anyway");
            }
            Err(e) => return Err(HelixClientError::Connection(e.to_string())),
        }

        self.is_connected.store(true, Ordering::Relaxed);
        info!("HelixClient connected to {}", self.base_url);
        Ok(())
    }

    pub async fn query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=self.max_retries {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => {
                    self.is_connected.store(true, Ordering::Relaxed);
                    return Ok(result);
                }
                Err(e) => {
                    let message = e.to_string();

                    if is_not_found(&message) {
                        return Err(HelixClientError::Query {
                            query: query_name.to_string(),
                            message,
                        });
                    }

                    warn!("Query {} failed (attempt {}/{}): {}", query_name, attempt, self.max_retries, message);
                    last_error = Some(message);

                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(HelixClientError::RetryExhausted(
            self.max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    pub async fn query_once<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        debug!("Executing query once: {}", query_name);
        self.inner
            .query::<P, T>(query_name, params)
            .await
            .map_err(|e| HelixClientError::Query {
                query: query_name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn is_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not found") || lower.contains("no value") || lower.contains("couldn't find")
}
