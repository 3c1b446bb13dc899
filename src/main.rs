use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use url::Url;

use catalog_importer::db::SqliteCatalogStore;
use catalog_importer::importer::NullStore;
use catalog_importer::normalizer::{PriceSource, SkuSequence};
use catalog_importer::parser::process_document;
use catalog_importer::{
    sitemap, BatchImporter, CatalogStore, HttpFetcher, ImportBatchResult, ImportItem,
    ImporterConfig, ProductLookup, ProductTypeClass, SourceDocument, UrlResolver,
};

#[derive(Parser)]
#[command(name = "catalog_importer", about = "Jewelry catalog importer and normalizer")]
struct Cli {
    /// Settings file (default: ./importer.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and import products listed in a JSON-lines lookup file
    Import {
        /// One {"code","name","image_url"} object per line
        lookups: PathBuf,
        /// Max items to import (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Category label attached to every imported product
        #[arg(long)]
        category: Option<String>,
        /// Run the pipeline without writing to the catalog
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract and normalize one saved page, print the record as JSON
    Parse {
        file: PathBuf,
        /// URL the page was served from (resolves relative image links)
        #[arg(long)]
        url: String,
        /// Name to fall back on when the page has none
        #[arg(long)]
        name: Option<String>,
    },
    /// Discover product pages from the catalog sitemap
    Discover {
        /// Write lookups here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create a category if missing and print its id
    Category { label: String },
    /// Imported products table
    List {
        /// Filter by product type (ring, earring, necklace, bracelet, piercing, generic)
        #[arg(long)]
        class: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = ImporterConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Import {
            lookups,
            limit,
            category,
            dry_run,
        } => run_import(&config, &lookups, limit, category.as_deref(), dry_run).await,
        Commands::Parse { file, url, name } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document = SourceDocument::new(url, content);
            let record = process_document(
                &document,
                name.as_deref(),
                &config.pricing.estimator(),
                &SkuSequence::from_clock().next_suffix(),
            )?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Discover { output } => {
            let Some(sitemap_url) = config.catalog.sitemap_url.as_deref() else {
                bail!("catalog.sitemap_url is not configured");
            };
            let fetcher = HttpFetcher::new(&config.fetch)?;
            let lookups = sitemap::discover_products(
                &fetcher,
                &Url::parse(sitemap_url)?,
                &config.catalog.product_path,
            )
            .await?;

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(std::fs::File::create(path)?),
                None => Box::new(std::io::stdout().lock()),
            };
            for lookup in &lookups {
                writeln!(out, "{}", serde_json::to_string(lookup)?)?;
            }
            out.flush()?;
            if let Some(path) = output {
                println!("Wrote {} lookups to {}", lookups.len(), path.display());
            }
            Ok(())
        }
        Commands::Category { label } => {
            let store = SqliteCatalogStore::open(&config.database_path)?;
            let id = store.ensure_category(&label)?;
            println!("{}\t{}", id, label.trim());
            Ok(())
        }
        Commands::List { class, limit } => {
            let class = match class.as_deref() {
                Some(c) => Some(
                    ProductTypeClass::parse(c)
                        .with_context(|| format!("Unknown product type {:?}", c))?,
                ),
                None => None,
            };
            let store = SqliteCatalogStore::open(&config.database_path)?;
            let rows = store.list_products(class, limit)?;
            if rows.is_empty() {
                println!("No products found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<24} | {:<32} | {:<8} | {:>8} | {:>8} | {:>6} | {:<9}",
                "#", "SKU", "Name", "Type", "Cost", "Sale", "Grams", "Price src"
            );
            println!("{}", "-".repeat(118));
            for (i, r) in rows.iter().enumerate() {
                let weight = if r.weight_source == "estimated" {
                    format!("~{:.1}", r.weight_grams)
                } else {
                    format!("{:.1}", r.weight_grams)
                };
                println!(
                    "{:>3} | {:<24} | {:<32} | {:<8} | {:>8.2} | {:>8.2} | {:>6} | {:<9}",
                    i + 1,
                    truncate(&r.sku, 24),
                    truncate(&r.name, 32),
                    r.product_type,
                    r.cost_price,
                    r.sale_price,
                    weight,
                    r.price_source
                );
            }
            println!("\n{} products | page: /{}/<slug>/", rows.len(), config.catalog.product_path);
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteCatalogStore::open(&config.database_path)?;
            let s = store.stats()?;
            println!("Products:          {}", s.products);
            println!("Estimated prices:  {}", s.estimated_prices);
            println!("Rescued prices:    {}", s.rescued_prices);
            println!("Estimated weights: {}", s.estimated_weights);
            println!("Import runs:       {}", s.runs);
            println!("Failures:          {}", s.failures);
            if !s.by_type.is_empty() {
                println!("\n--- By type ---");
                for (class, count) in &s.by_type {
                    println!("  {:<10} {}", class, count);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_import(
    config: &ImporterConfig,
    lookups_path: &Path,
    limit: Option<usize>,
    category: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let mut items = read_lookups(lookups_path)?;
    if let Some(n) = limit {
        items.truncate(n);
    }
    if items.is_empty() {
        println!("No lookups in {}.", lookups_path.display());
        return Ok(());
    }

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let resolver = UrlResolver::from_config(&config.catalog).context("Invalid catalog URL")?;
    let delay = Duration::from_millis(config.fetch.politeness_delay_ms);

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("#>-"),
    );

    println!("Importing {} products{}...", items.len(), if dry_run { " (dry run)" } else { "" });

    if dry_run {
        let importer = BatchImporter::new(fetcher, NullStore, resolver, config.pricing.estimator())
            .with_delay(delay)
            .with_progress(pb);
        let (result, _) = drive(importer, items).await?;
        print_summary(&result);
        return Ok(());
    }

    let store = SqliteCatalogStore::open(&config.database_path)?;
    let category_id = match category {
        Some(label) => {
            let id = store.resolve_category_id(label)?;
            if id.is_none() {
                warn!(label, "category not found; run `category {}` first", label);
            }
            id
        }
        None => None,
    };
    let importer = BatchImporter::new(
        fetcher,
        store.with_category(category_id),
        resolver,
        config.pricing.estimator(),
    )
    .with_delay(delay)
    .with_progress(pb);

    let (result, store) = drive(importer, items).await?;
    let run_id = store.record_run(&result)?;
    print_summary(&result);
    println!("Recorded as run #{}", run_id);
    Ok(())
}

/// Run the batch with Ctrl-C wired to its cancellation token.
async fn drive<S: CatalogStore>(
    mut importer: BatchImporter<HttpFetcher, S>,
    items: Vec<ImportItem>,
) -> Result<(ImportBatchResult, S)> {
    let token = importer.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, finishing current item...");
            token.cancel();
        }
    });
    let result = importer.run(items).await;
    watcher.abort();
    Ok((result?, importer.into_store()))
}

fn read_lookups(path: &Path) -> Result<Vec<ImportItem>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut items = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let lookup: ProductLookup = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid lookup", path.display(), i + 1))?;
        items.push(lookup.into());
    }
    Ok(items)
}

fn print_summary(result: &ImportBatchResult) {
    println!(
        "Done: {} imported, {} failed{}.",
        result.succeeded.len(),
        result.failed.len(),
        if result.cancelled {
            format!(", {} skipped (cancelled)", result.skipped)
        } else {
            String::new()
        }
    );
    let estimated = result
        .succeeded
        .iter()
        .filter(|r| r.price_source != PriceSource::Extracted)
        .count();
    if estimated > 0 {
        println!("{} prices estimated or rescued; review before publishing.", estimated);
    }
    if !result.failed.is_empty() {
        println!("\n--- Failures ---");
        for f in &result.failed {
            println!("  {}: {}", truncate(&f.identifier, 40), f.reason);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
