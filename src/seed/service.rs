use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::{CatalogError, CatalogService, NewPokemon};
use crate::core::config::PokedexConfig;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),
}

/// Page returned by `GET /pokemon?limit=N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PokeResponse {
    #[serde(default)]
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<PokeListing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokeListing {
    pub name: String,
    pub url: String,
}

impl PokeListing {
    /// Catalog number carried by the listing url (`.../pokemon/25/` -> 25).
    pub fn catalog_no(&self) -> Option<u32> {
        pokemon_no_from_url(&self.url)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub fetched: usize,
    pub inserted: usize,
    pub conflicts: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum EntryOutcome {
    Inserted,
    Conflict,
    Skipped,
    Failed,
}

/// Pulls the PokeAPI listing and feeds it to the catalog.
pub struct SeedService {
    client: Client,
    base_url: Url,
    limit: u32,
    concurrency: usize,
}

impl SeedService {
    pub fn new(base_url: &str, limit: u32, concurrency: usize, timeout: Duration) -> Result<Self, SeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SeedError::InvalidBaseUrl(base_url.to_string()));
        }

        info!("SeedService initialized: {} (limit={})", base_url, limit);

        Ok(Self {
            client,
            base_url,
            limit,
            concurrency: concurrency.max(1),
        })
    }

    pub fn from_config(config: &PokedexConfig) -> Result<Self, SeedError> {
        Self::new(
            &config.pokeapi_url,
            config.seed_limit,
            config.seed_concurrency,
            config.http_timeout(),
        )
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn listing_url(&self, limit: u32) -> Result<Url, SeedError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SeedError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("pokemon");
        url.query_pairs_mut()
            .clear()
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    /// Fetches one page with the configured limit.
    pub async fn execute_seed(&self) -> Result<Vec<PokeListing>, SeedError> {
        self.fetch(self.limit).await
    }

    /// Fetches one page of `limit` entries. Transport and HTTP status
    /// failures are returned as-is.
    pub async fn fetch(&self, limit: u32) -> Result<Vec<PokeListing>, SeedError> {
        let url = self.listing_url(limit)?;
        debug!("Fetching seed listing from {}", url);

        let response: PokeResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(
            "Fetched {} entries ({} available upstream)",
            response.results.len(),
            response.count
        );
        Ok(response.results)
    }

    /// Fetches `limit` entries (the configured limit when `None`) and
    /// inserts them.
    pub async fn populate(
        &self,
        catalog: &CatalogService,
        limit: Option<u32>,
    ) -> Result<SeedReport, SeedError> {
        let listing = self.fetch(limit.unwrap_or(self.limit)).await?;
        Ok(self.insert_listing(catalog, listing).await)
    }

    /// Inserts each entry through the catalog. Entries already present are
    /// counted as conflicts, so repeated runs are harmless.
    pub async fn insert_listing(&self, catalog: &CatalogService, listing: Vec<PokeListing>) -> SeedReport {
        let mut report = SeedReport {
            fetched: listing.len(),
            ..Default::default()
        };

        let outcomes: Vec<EntryOutcome> = stream::iter(listing)
            .map(|entry| insert_entry(catalog, entry))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                EntryOutcome::Inserted => report.inserted += 1,
                EntryOutcome::Conflict => report.conflicts += 1,
                EntryOutcome::Skipped => report.skipped += 1,
                EntryOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            "Seed complete: {}/{} inserted, {} conflicts, {} skipped, {} failed",
            report.inserted, report.fetched, report.conflicts, report.skipped, report.failed
        );
        report
    }
}

async fn insert_entry(catalog: &CatalogService, entry: PokeListing) -> EntryOutcome {
    let Some(no) = entry.catalog_no() else {
        warn!("Skipping {}: no catalog number in {}", entry.name, entry.url);
        return EntryOutcome::Skipped;
    };

    let input = NewPokemon::new(no, entry.name);
    if let Err(e) = input.validate() {
        warn!("Skipping #{}: {}", no, e);
        return EntryOutcome::Skipped;
    }

    match catalog.create(input).await {
        Ok(_) => EntryOutcome::Inserted,
        Err(CatalogError::Conflict { key_value }) => {
            debug!("Already seeded: {}", key_value);
            EntryOutcome::Conflict
        }
        Err(e) => {
            warn!("Failed to seed #{}: {}", no, e);
            EntryOutcome::Failed
        }
    }
}

pub fn pokemon_no_from_url(raw: &str) -> Option<u32> {
    let url = Url::parse(raw).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .parse::<u32>()
        .ok()
        .filter(|no| *no > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single HTTP request with `status` and `body`, returning
    /// the raw request head.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });

        (format!("http://{}/api/v2", addr), handle)
    }

    fn listing(entries: &[(&str, u32)]) -> Vec<PokeListing> {
        entries
            .iter()
            .map(|(name, no)| PokeListing {
                name: name.to_string(),
                url: format!("https://pokeapi.co/api/v2/pokemon/{}/", no),
            })
            .collect()
    }

    fn seeder(base_url: &str, limit: u32) -> SeedService {
        let client = Client::builder().no_proxy().build().unwrap();
        SeedService::new(base_url, limit, 4, Duration::from_secs(5))
            .unwrap()
            .with_client(client)
    }

    #[test]
    fn test_listing_url() {
        let url = seeder("https://pokeapi.co/api/v2", 650).listing_url(650).unwrap();
        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon?limit=650");

        let url = seeder("https://pokeapi.co/api/v2/", 650).listing_url(10).unwrap();
        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon?limit=10");
    }

    #[test]
    fn test_rejects_non_base_url() {
        let err = SeedService::new("mailto:ash@example.com", 1, 1, Duration::from_secs(1));
        assert!(matches!(err, Err(SeedError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_pokemon_no_from_url() {
        assert_eq!(pokemon_no_from_url("https://pokeapi.co/api/v2/pokemon/25/"), Some(25));
        assert_eq!(pokemon_no_from_url("https://pokeapi.co/api/v2/pokemon/151"), Some(151));
        assert_eq!(pokemon_no_from_url("https://pokeapi.co/api/v2/pokemon/"), None);
        assert_eq!(pokemon_no_from_url("https://pokeapi.co/api/v2/pokemon/0/"), None);
        assert_eq!(pokemon_no_from_url("not a url"), None);
    }

    #[tokio::test]
    async fn test_execute_seed_fetches_results() {
        let body = serde_json::json!({
            "count": 1302,
            "next": "https://pokeapi.co/api/v2/pokemon?offset=2&limit=2",
            "previous": null,
            "results": [
                {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"},
                {"name": "ivysaur", "url": "https://pokeapi.co/api/v2/pokemon/2/"}
            ]
        })
        .to_string();
        let (base_url, server) = serve_once("200 OK", body).await;

        let results = seeder(&base_url, 2).execute_seed().await.unwrap();
        assert_eq!(results, listing(&[("bulbasaur", 1), ("ivysaur", 2)]));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v2/pokemon?limit=2 HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_execute_seed_propagates_http_status() {
        let (base_url, server) = serve_once("503 Service Unavailable", "{}".to_string()).await;

        let err = seeder(&base_url, 2).execute_seed().await.unwrap_err();
        assert!(matches!(err, SeedError::Http(ref e) if e.is_status()));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_listing_counts_outcomes() {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        let seed = seeder("https://pokeapi.co/api/v2", 650);

        let mut entries = listing(&[("Bulbasaur", 1), ("ivysaur", 2), ("venusaur", 3)]);
        entries.push(PokeListing {
            name: "unknown".to_string(),
            url: "https://pokeapi.co/api/v2/pokemon/".to_string(),
        });

        let report = seed.insert_listing(&catalog, entries.clone()).await;
        assert_eq!(
            report,
            SeedReport {
                fetched: 4,
                inserted: 3,
                conflicts: 0,
                skipped: 1,
                failed: 0,
            }
        );
        assert_eq!(catalog.find("1").await.unwrap().name, "bulbasaur");

        let rerun = seed.insert_listing(&catalog, entries).await;
        assert_eq!((rerun.inserted, rerun.conflicts, rerun.skipped), (0, 3, 1));
        assert_eq!(catalog.list().await.unwrap().len(), 3);
    }
}
