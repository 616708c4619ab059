use std::env;

use pokedex::db::connect_store;
use pokedex::{CatalogService, PokedexConfig, SeedService, StoreBackend};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("pokedex=info".parse()?))
        .init();

    let mut config = PokedexConfig::from_env()?;
    let mut dry_run = false;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-l" => {
                if let Some(value) = args.get(i + 1) {
                    config.seed_limit = value.parse()?;
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if let Some(value) = args.get(i + 1) {
                    config.store = value.parse::<StoreBackend>()?;
                    i += 1;
                }
            }
            "--host" | "-h" => {
                if let Some(value) = args.get(i + 1) {
                    config.helix_host = value.clone();
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if let Some(value) = args.get(i + 1) {
                    config.helix_port = value.parse()?;
                    i += 1;
                }
            }
            "--dry-run" => dry_run = true,
            "--help" => {
                print_help();
                return Ok(());
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
        i += 1;
    }

    println!("Pokedex seed");
    println!("   Source: {} (limit={})", config.pokeapi_url, config.seed_limit);
    println!("   Store:  {}", config.store);
    println!();

    let seeder = SeedService::from_config(&config)?;

    if dry_run {
        let listing = seeder.execute_seed().await?;
        for entry in &listing {
            match entry.catalog_no() {
                Some(no) => println!("   #{:<4} {}", no, entry.name),
                None => println!("   #?    {} ({})", entry.name, entry.url),
            }
        }
        println!();
        println!("{} entries fetched, nothing written", listing.len());
        return Ok(());
    }

    if config.store == StoreBackend::Memory {
        eprintln!("Warning: the memory store is discarded when this process exits");
    }

    let store = connect_store(&config).await?;
    let catalog = CatalogService::new(store);
    let report = seeder.populate(&catalog, None).await?;

    println!("Fetched:   {}", report.fetched);
    println!("Inserted:  {}", report.inserted);
    println!("Conflicts: {}", report.conflicts);
    println!("Skipped:   {}", report.skipped);
    println!("Failed:    {}", report.failed);

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_help() {
    println!(r#"
Pokedex seed CLI

USAGE:
    pokedex-seed [OPTIONS]

OPTIONS:
    -l, --limit <N>         Entries to import from PokeAPI (default: 650)
    -s, --store <BACKEND>   memory | helix (default: memory)
    -h, --host <HOST>       HelixDB host (default: localhost)
    -p, --port <PORT>       HelixDB port (default: 6969)
    --dry-run               Fetch and print the listing without writing
    --help                  Print this help

EXAMPLES:
    # Preview the first generation
    pokedex-seed --limit 151 --dry-run

    # Populate a local HelixDB
    pokedex-seed --store helix --host localhost --port 6969

ENVIRONMENT:
    POKEDEX_STORE, POKEDEX_HELIX_HOST, POKEDEX_HELIX_PORT, POKEDEX_POKEAPI_URL,
    POKEDEX_SEED_LIMIT, POKEDEX_SEED_CONCURRENCY, POKEDEX_TIMEOUT, RUST_LOG
"#);
}
