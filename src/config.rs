use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub database_url: String,

    // Languages
    pub default_language: String,
    pub languages: Vec<String>,

    // Batches
    pub page_size: usize,

    // Synchronization
    pub sync_context: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            // Store
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://fieldtrans.db?mode=rwc".to_string()),

            // Languages
            default_language: var("DEFAULT_LANGUAGE")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| "en".to_string()),
            languages: var("LANGUAGES")
                .unwrap_or_else(|| "en,es,fr".to_string())
                .split(',')
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty())
                .collect(),

            // Batches
            page_size: match var("PAGE_SIZE") {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("PAGE_SIZE is not a number: {}", value))?,
                None => 200,
            },

            // Synchronization
            sync_context: var("SYNC_CONTEXT")
                .unwrap_or_else(|| crate::sync::DEFAULT_CONTEXT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            bail!("LANGUAGES must name at least one language");
        }
        if !self.languages.contains(&self.default_language) {
            bail!(
                "DEFAULT_LANGUAGE '{}' is not among LANGUAGES ({})",
                self.default_language,
                self.languages.join(",")
            );
        }
        if self.page_size == 0 {
            bail!("PAGE_SIZE must be greater than zero");
        }
        Ok(())
    }
}
