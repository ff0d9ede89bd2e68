use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use arbscout::catalog::client::CatalogClient;
use arbscout::cleaner::Cleaner;
use arbscout::config::{AppConfig, Secrets};
use arbscout::db::store::Store;
use arbscout::ingest::Ingestor;
use arbscout::llm::openai::ChatClient;
use arbscout::matcher::JudgedSelector;
use arbscout::monitoring::logger;
use arbscout::pipeline::{CycleOptions, Pipeline};

#[derive(Parser)]
#[command(name = "arbscout", about = "Retail arbitrage matching and scoring", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull the retail deals feed into the store
    Ingest {
        /// Cap on products to fetch this run
        #[arg(long)]
        max_products: Option<u32>,
    },
    /// Clean raw product names into catalog search terms
    Clean,
    /// Run a matching and scoring cycle
    Match {
        /// Hard cap on products this cycle
        #[arg(long)]
        limit: Option<usize>,
        /// Override the scheduler's batch size
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the staleness window in days
        #[arg(long)]
        stale_days: Option<i64>,
        /// Abort if the catalog budget cannot cover the batch
        #[arg(long)]
        check_budget: bool,
    },
    /// Show the remaining catalog request budget
    Budget,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load()?;

    logger::init_logging(&config.monitoring)?;

    let store = Store::new(&config.database.path).await?;

    match cli.command {
        Command::Ingest { max_products } => run_ingest(&config, &secrets, &store, max_products).await,
        Command::Clean => run_clean(&config, &secrets, &store).await,
        Command::Match {
            limit,
            batch_size,
            stale_days,
            check_budget,
        } => {
            run_match(
                &config,
                &secrets,
                &store,
                limit,
                batch_size,
                stale_days,
                check_budget,
            )
            .await
        }
        Command::Budget => run_budget(&config, &secrets).await,
    }
}

async fn run_ingest(
    config: &AppConfig,
    secrets: &Secrets,
    store: &Store,
    max_products: Option<u32>,
) -> Result<()> {
    let ingestor = Ingestor::new(store, config.ingest.clone(), secrets.feed_api_key.clone())?;
    let max = max_products.unwrap_or(config.ingest.max_products);
    let summary = ingestor.run(max).await?;

    println!(
        "Ingested {} products ({} new, {} price updates, {} duplicates, {} errors)",
        summary.fetched, summary.saved, summary.price_updates, summary.skipped, summary.errors
    );
    Ok(())
}

async fn run_clean(config: &AppConfig, secrets: &Secrets, store: &Store) -> Result<()> {
    let chat = chat_client(config, secrets)?;
    let cleaner = Cleaner::new(&chat, store, config.cleaning.clone());
    let summary = cleaner.clean_pending().await?;

    println!(
        "Cleaned {} product names ({} failed batches)",
        summary.cleaned, summary.failed_batches
    );
    Ok(())
}

async fn run_match(
    config: &AppConfig,
    secrets: &Secrets,
    store: &Store,
    limit: Option<usize>,
    batch_size: Option<usize>,
    stale_days: Option<i64>,
    check_budget: bool,
) -> Result<()> {
    let catalog = catalog_client(config, secrets)?;
    let chat = chat_client(config, secrets)?;
    let strategy = JudgedSelector::new(&chat, config.matching.clone());

    let mut scheduler_config = config.scheduler.clone();
    if let Some(batch_size) = batch_size {
        scheduler_config.batch_size = batch_size;
    }
    if let Some(stale_days) = stale_days {
        scheduler_config.stale_days = stale_days;
    }

    let pipeline = Pipeline::new(
        store,
        &catalog,
        &strategy,
        config.profit.clone(),
        config.validation.clone(),
        scheduler_config,
    );
    let summary = pipeline
        .run_cycle(CycleOptions {
            limit,
            check_budget,
        })
        .await?;

    println!(
        "Run {}: {} processed, {} matched ({} profitable, {} potential), {} not found, {} errors",
        summary.run_id,
        summary.processed,
        summary.matched,
        summary.profitable,
        summary.potential,
        summary.not_found,
        summary.errors
    );
    Ok(())
}

async fn run_budget(config: &AppConfig, secrets: &Secrets) -> Result<()> {
    let catalog = catalog_client(config, secrets)?;
    let budget = catalog.budget().await?;

    println!(
        "Catalog budget: {} tokens left, refill in {}ms at {} tokens/min",
        budget.tokens_left, budget.refill_in_ms, budget.refill_rate
    );
    Ok(())
}

fn catalog_client(config: &AppConfig, secrets: &Secrets) -> Result<CatalogClient> {
    let api_key = secrets
        .catalog_api_key
        .clone()
        .context("KEEPA_API_KEY is not set")?;
    Ok(CatalogClient::new(
        config.catalog.clone(),
        &config.rate_limit,
        api_key,
    )?)
}

fn chat_client(config: &AppConfig, secrets: &Secrets) -> Result<ChatClient> {
    let api_key = secrets
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY is not set")?;
    ChatClient::new(&config.llm, api_key)
}
