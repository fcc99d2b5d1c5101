// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Brickscan CLI: scan photographs, review candidates, query the catalog

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use brickscan::catalog::{Catalog, CandidateEdits};
use brickscan::classify::ColorClassifier;
use brickscan::config::AppConfig;
use brickscan::parts::PartsClient;
use brickscan::pipeline::{ScanBatch, ScanPipeline};
use brickscan::query::{self, SortKey};
use brickscan::vision::remote::RemoteVision;
use brickscan::vision::{PieceClassifier, RegionDetector};
use brickscan::{BrickscanError, Result};

/// Brickscan CLI - photograph-to-catalog piece scanner
#[derive(Parser, Debug)]
#[command(name = "brickscan")]
#[command(version = "0.1.0")]
#[command(about = "Scan photographs of loose pieces into a searchable catalog", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a photograph and commit the detected pieces
    Scan {
        /// Image file to scan
        image: PathBuf,

        /// Storage location recorded on every committed piece
        #[arg(short, long)]
        location: Option<String>,

        /// Quantity recorded on every committed piece
        #[arg(short = 'n', long, default_value = "1")]
        quantity: i64,

        /// Show candidates without committing them
        #[arg(long)]
        dry_run: bool,

        /// Skip the vision service health check
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Catalog operations
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },

    /// Collection statistics and breakdowns
    Stats {
        /// Breakdown dimension
        #[arg(long, default_value = "category", value_parser = ["category", "color"])]
        by: String,
    },

    /// Part-metadata lookups
    Parts {
        #[command(subcommand)]
        action: PartsCommands,
    },

    /// Show vision service and catalog status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Initialize a new Brickscan project
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommands {
    /// List records, newest first
    List {
        /// Maximum number to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Sort order
        #[arg(long, default_value = "recent",
              value_parser = ["recent", "name-az", "name-za", "quantity-high", "quantity-low"])]
        sort: String,
    },

    /// Search records by free text
    Search {
        /// Search query (matches part number, name, color, location)
        query: String,
    },

    /// Update a record's quantity and/or location
    Update {
        /// Record id
        id: String,

        #[arg(short = 'n', long)]
        quantity: Option<i64>,

        #[arg(short, long)]
        location: Option<String>,
    },

    /// Delete a record
    Delete {
        /// Record id
        id: String,
    },

    /// Delete every record
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Export the catalog to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Vacuum the database (reclaim space)
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum PartsCommands {
    /// Look up one part number
    Lookup {
        part_number: String,
    },

    /// Search parts by free text
    Search {
        query: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Scan { image, location, quantity, dry_run, skip_health_check } => {
            run_scan(config, image, location, quantity, dry_run, skip_health_check, &cli.format)
                .await
        }
        Commands::Catalog { action } => run_catalog_command(config, action, &cli.format),
        Commands::Stats { by } => run_stats(config, &by, &cli.format),
        Commands::Parts { action } => run_parts_command(config, action).await,
        Commands::Status => run_status(config).await,
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

/// Run the scan pipeline against one photograph
async fn run_scan(
    config: AppConfig,
    image_path: PathBuf,
    location: Option<String>,
    quantity: i64,
    dry_run: bool,
    skip_health_check: bool,
    format: &str,
) -> Result<()> {
    let vision = Arc::new(RemoteVision::new(
        &config.vision.url,
        &config.vision.model,
        config.vision.timeout_secs,
        config.vision.retries,
    )?);

    if !skip_health_check {
        info!("Checking vision service availability...");
        vision.health_check().await?;
        if !vision.model_available().await.unwrap_or(false) {
            warn!("Model '{}' not reported by the vision service", config.vision.model);
        }
    }

    let detector: Arc<dyn RegionDetector> = vision.clone();
    let classifier: Arc<dyn PieceClassifier> = vision;
    let pipeline = ScanPipeline::new(
        detector,
        classifier,
        ColorClassifier::default(),
        config.vision.max_concurrent,
    );

    info!("Scanning {:?}", image_path);
    let bytes = std::fs::read(&image_path)?;
    let batch = pipeline.run(&bytes).await?;

    if batch.dropped_regions > 0 {
        warn!("{} region(s) could not be classified and were skipped", batch.dropped_regions);
    }

    print_batch(&batch, format)?;

    if batch.is_empty() {
        info!("No pieces found");
        return Ok(());
    }

    if dry_run {
        info!("DRY RUN - nothing committed");
        return Ok(());
    }

    // Apply the same quantity/location to every candidate; finer edits go
    // through `catalog update` afterwards.
    let mut edits = CandidateEdits::new();
    for candidate in &batch.candidates {
        edits.set_quantity(candidate.local_id, quantity);
        if let Some(ref loc) = location {
            edits.set_location(candidate.local_id, loc.clone());
        }
    }

    let catalog = Catalog::open(&config.database.path)?;
    let image_dir = config
        .images
        .store_crops
        .then(|| PathBuf::from(&config.images.dir));
    let records = catalog.commit_batch(&batch, &edits, image_dir.as_deref())?;

    info!("Committed {} piece(s) to the catalog", records.len());
    Ok(())
}

fn print_batch(batch: &ScanBatch, format: &str) -> Result<()> {
    match format {
        "json" => {
            let output: Vec<serde_json::Value> = batch
                .candidates
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "part_number": c.part_number,
                        "part_name": c.part_name,
                        "category": c.category,
                        "color": c.color_name,
                        "color_id": c.color_id,
                        "confidence": c.confidence,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("Detected {} piece(s):", batch.candidates.len());
            for (i, c) in batch.candidates.iter().enumerate() {
                println!(
                    "  {}. {} {} ({}, {:.0}%)",
                    i + 1,
                    c.part_number,
                    c.part_name,
                    c.color_name,
                    c.confidence * 100.0
                );
            }
        }
    }
    Ok(())
}

/// Run catalog commands
fn run_catalog_command(config: AppConfig, action: CatalogCommands, format: &str) -> Result<()> {
    let catalog = Catalog::open(&config.database.path)?;

    match action {
        CatalogCommands::List { limit, sort } => {
            let key = match sort.as_str() {
                "name-az" => SortKey::NameAsc,
                "name-za" => SortKey::NameDesc,
                "quantity-high" => SortKey::QuantityDesc,
                "quantity-low" => SortKey::QuantityAsc,
                _ => SortKey::DateAdded,
            };
            let records = query::sort(&catalog.all_records()?, key);
            print_records(records.iter().take(limit), format)?;
        }
        CatalogCommands::Search { query } => {
            let records = catalog.search(&query)?;
            println!("Search results for '{}':", query);
            print_records(records.iter(), format)?;
        }
        CatalogCommands::Update { id, quantity, location } => {
            if catalog.update(&id, quantity, location.as_deref())? {
                println!("Updated {}", id);
            } else {
                println!("No record with id {}", id);
            }
        }
        CatalogCommands::Delete { id } => {
            if catalog.delete(&id)? {
                println!("Deleted {}", id);
            } else {
                println!("No record with id {}", id);
            }
        }
        CatalogCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing the catalog");
                return Ok(());
            }
            let removed = catalog.clear()?;
            println!("Removed {} record(s)", removed);
        }
        CatalogCommands::Export { output } => {
            let records = catalog.all_records()?;
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, json)?;
            println!("Exported {} record(s) to {:?}", records.len(), output);
        }
        CatalogCommands::Vacuum => {
            catalog.vacuum()?;
            println!("Catalog vacuumed successfully");
        }
    }

    Ok(())
}

fn print_records<'a>(
    records: impl Iterator<Item = &'a brickscan::catalog::CatalogRecord>,
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            let records: Vec<_> = records.collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            for record in records {
                println!(
                    "  {}  {} {} ({}) x{}  {}",
                    record.id,
                    record.part_number,
                    record.part_name,
                    record.color_name,
                    record.quantity,
                    record.location.as_deref().unwrap_or("-"),
                );
            }
        }
    }
    Ok(())
}

/// Print collection statistics
fn run_stats(config: AppConfig, by: &str, format: &str) -> Result<()> {
    let catalog = Catalog::open(&config.database.path)?;
    let records = catalog.all_records()?;

    let stats = query::collection_stats(&records);
    let breakdown = match by {
        "color" => query::aggregate_by_color(&records),
        _ => query::aggregate_by_category(&records),
    };

    match format {
        "json" => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "total_pieces": stats.total_pieces,
                    "unique_parts": stats.unique_parts,
                    "categories": stats.categories,
                    "breakdown": breakdown,
                }))?
            );
        }
        _ => {
            println!("Collection:");
            println!("  Total pieces: {}", stats.total_pieces);
            println!("  Unique parts: {}", stats.unique_parts);
            println!("  Categories: {}", stats.categories);
            println!("\nBy {}:", by);
            for slice in &breakdown {
                println!(
                    "  {:<20} {:>5}  ({:.1}%)",
                    slice.label, slice.total_quantity, slice.percentage
                );
            }
        }
    }

    Ok(())
}

/// Run part-metadata commands
async fn run_parts_command(config: AppConfig, action: PartsCommands) -> Result<()> {
    if config.parts_api.api_key.is_empty() {
        return Err(BrickscanError::Config(
            "parts_api.api_key is not set in the configuration".to_string(),
        ));
    }
    let client = PartsClient::new(&config.parts_api.url, &config.parts_api.api_key)?;

    match action {
        PartsCommands::Lookup { part_number } => {
            let info = client.part_info(&part_number).await?;
            println!("{}: {} [{}]", info.part_num, info.name, info.category_name());
        }
        PartsCommands::Search { query } => {
            let results = client.search(&query).await?;
            println!("Found {} part(s):", results.len());
            for info in results {
                println!("  {}: {} [{}]", info.part_num, info.name, info.category_name());
            }
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Brickscan v0.1.0 Status");
    println!("=======================");

    let vision = RemoteVision::new(
        &config.vision.url,
        &config.vision.model,
        config.vision.timeout_secs,
        config.vision.retries,
    )?;

    match vision.health_check().await {
        Ok(()) => {
            println!("Vision service: Running");
            match vision.list_models().await {
                Ok(models) => {
                    println!("\nAvailable models:");
                    for m in &models {
                        let marker = if m.starts_with(&config.vision.model) { "→" } else { " " };
                        println!("  {} {}", marker, m);
                    }
                }
                Err(e) => println!("  Error listing models: {}", e),
            }
        }
        Err(e) => println!("Vision service: Error - {}", e),
    }

    match Catalog::open(&config.database.path) {
        Ok(catalog) => {
            let stats = catalog.stats()?;
            println!("\nCatalog ({}):", config.database.path);
            println!("  Records: {}", stats.record_count);
            println!("  Total quantity: {}", stats.total_quantity);
            println!("  Categories: {}", stats.category_count);
        }
        Err(e) => println!("\nCatalog: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Vision service: {}", config.vision.url);
    println!("  Model: {}", config.vision.model);
    println!("  Database: {}", config.database.path);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Vision service: {}", config.vision.url);
            println!("  Model: {}", config.vision.model);
            println!("  Database: {}", config.database.path);
        }
    }

    Ok(())
}

/// Initialize a new Brickscan project
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(BrickscanError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(target.join("crops"))?;
    AppConfig::default().save(&config_path)?;

    println!("Brickscan initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - crops/");
    println!("\nNext steps:");
    println!("  1. Point vision.url at a running vision service");
    println!("  2. Scan a photo: brickscan scan photo.jpg");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_scan_command() {
        let cli = Cli::try_parse_from([
            "brickscan", "scan", "/tmp/photo.jpg", "--dry-run", "--location", "Bin A",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan { image, dry_run, location, quantity, .. } => {
                assert_eq!(image, PathBuf::from("/tmp/photo.jpg"));
                assert!(dry_run);
                assert_eq!(location.as_deref(), Some("Bin A"));
                assert_eq!(quantity, 1);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_catalog_update_command() {
        let cli = Cli::try_parse_from([
            "brickscan", "catalog", "update", "some-id", "--quantity", "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Catalog { action: CatalogCommands::Update { id, quantity, location } } => {
                assert_eq!(id, "some-id");
                assert_eq!(quantity, Some(4));
                assert_eq!(location, None);
            }
            _ => panic!("Expected Catalog update command"),
        }
    }

    #[test]
    fn test_cli_stats_defaults_to_category() {
        let cli = Cli::try_parse_from(["brickscan", "stats"]).unwrap();
        match cli.command {
            Commands::Stats { by } => assert_eq!(by, "category"),
            _ => panic!("Expected Stats command"),
        }
    }
}
