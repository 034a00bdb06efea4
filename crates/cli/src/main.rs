//! QuardCube CLI - database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront migrations (tables and the session store)
//! qc-cli migrate
//!
//! # Upsert catalog products from a YAML file
//! qc-cli seed products crates/cli/seed/products.yaml
//! ```
//!
//! Both commands read `STOREFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qc-cli")]
#[command(author, version, about = "QuardCube storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert catalog products from a YAML file
    Products {
        /// Path to the products YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_seed_products() {
        let cli = Cli::try_parse_from(["qc-cli", "seed", "products", "catalog.yaml"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Seed { target: SeedTarget::Products { file } }) if file == "catalog.yaml"
        ));
    }
}
