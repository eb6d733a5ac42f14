use anyhow::{bail, Context, Result};
use fieldtrans::catalog::{self, CatalogHeader};
use fieldtrans::config::Config;
use fieldtrans::db::Database;
use fieldtrans::i18n::LanguageRegistry;
use tracing::info;

const USAGE: &str = "Usage:
  fieldtrans export <language> [path]   Write the catalog of <language> (default path: <language>.po)
  fieldtrans stats                      Print record counts per language";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldtrans=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_env()?;

    match args.first().map(String::as_str) {
        Some("export") => {
            let Some(code) = args.get(1) else {
                bail!("Missing language\n{}", USAGE);
            };
            export(&config, code, args.get(2).map(String::as_str)).await
        }
        Some("stats") => stats(&config).await,
        _ => bail!(USAGE),
    }
}

async fn export(config: &Config, code: &str, path: Option<&str>) -> Result<()> {
    let languages = LanguageRegistry::new(config.languages.as_slice(), &config.default_language)?;
    let language = languages.translation_language(code)?;

    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to open translation database")?;

    let header = CatalogHeader {
        project: std::env::var("CATALOG_PROJECT").ok(),
        last_translator: std::env::var("CATALOG_TRANSLATOR").ok(),
    };
    let text = catalog::export(&db, &language, &header, config.page_size).await?;

    let path = path
        .map(String::from)
        .unwrap_or_else(|| catalog::file_name(&language));
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path))?;

    info!("Catalog for {} written to {}", language, path);
    Ok(())
}

async fn stats(config: &Config) -> Result<()> {
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to open translation database")?;

    let stats = db.stats().await?;
    for entry in &stats {
        info!(
            "{}: {} completed, {} fuzzy",
            entry.language, entry.completed, entry.fuzzy
        );
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
