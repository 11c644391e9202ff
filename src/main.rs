pub mod config;
pub mod data;
pub mod enrich;
pub mod error;
pub mod region;
pub mod sampler;
pub mod server;
pub mod types;
pub mod view;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, GenerationConfig};
use crate::enrich::DateRange;
use crate::region::Region;
use crate::sampler::{PointSampler, SamplerConfig};
use crate::types::OrderRecord;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the synthetic order table from the configured regions
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the order table to the map dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating orders with config: {:?}", config);
            let app_config = AppConfig::load_from_file(config)?;
            let generation = app_config.generation()?.clone();

            // Sampling is CPU bound; keep it off the async workers.
            let written = tokio::task::spawn_blocking(move || generate_orders(&generation))
                .await
                .context("Generation task panicked")??;

            info!("Generation complete: {} orders", written);
        }
        Commands::Serve { config } => {
            info!("Serving orders with config: {:?}", config);
            let app_config = AppConfig::load_from_file(config)?;
            let server_config = app_config.server()?.clone();

            let store = data::OrderStore::load(&server_config.data)?;
            server::start_server(server_config, store).await?;
        }
    }

    Ok(())
}

/// Samples, enriches and writes every configured region. Returns the
/// number of orders written.
fn generate_orders(generation: &GenerationConfig) -> Result<usize> {
    let dates = DateRange::new(generation.start_date, generation.end_date)?;
    let mut all_orders: Vec<OrderRecord> = Vec::new();

    for (idx, region_config) in generation.regions.iter().enumerate() {
        let region = Region::from_path(&region_config.name, &region_config.polygon)
            .with_context(|| format!("Failed to load region '{}'", region_config.name))?;

        let sampler_config = SamplerConfig {
            // Distinct per region so identical polygons still differ.
            seed: generation.seed.map(|s| s.wrapping_add(idx as u64)),
            ..SamplerConfig::default()
        };

        let samples = PointSampler::new(&region, sampler_config)
            .sample(generation.points_per_region, generation.with_hotspots)?;

        let samples = if generation.strict {
            samples
                .require_complete()
                .with_context(|| format!("Region '{}' came up short", region.name()))?
        } else {
            if let Some(missing) = samples.shortfall() {
                warn!("Region '{}' is {} points short", region.name(), missing);
            }
            samples
        };

        let mut rng = ChaCha8Rng::seed_from_u64(samples.seed);
        // Sampling phases use the low streams.
        rng.set_stream(u64::MAX);
        let orders = enrich::enrich(&samples.points, dates, &mut rng);

        info!(
            "Region '{}': {} orders (seed {})",
            region.name(),
            orders.len(),
            samples.seed
        );
        all_orders.extend(orders);
    }

    data::write_orders(&generation.output, &all_orders)?;
    Ok(all_orders.len())
}
