//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::error::{Error, Result};
use crate::extractor::{JsonLinesSink, Message, Sink};
use crate::loader::{build_driver, load_definition, match_url, ExtractorDefinition, RunOptions};
use crate::pagination::Cursor;
use crate::template::TemplateContext;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                url,
                config_json,
                cursor,
                limit,
            } => {
                self.run_extractor(
                    url.as_deref(),
                    config_json.as_deref(),
                    cursor.as_deref(),
                    *limit,
                )
                .await
            }
            Commands::Validate => self.validate(),
        }
    }

    /// Load extractor definition
    fn load_definition(&self) -> Result<ExtractorDefinition> {
        let path = self
            .cli
            .extractor
            .as_ref()
            .ok_or_else(|| Error::config("No extractor specified. Use --extractor <path>"))?;
        load_definition(path)
    }

    /// Load configuration
    fn load_config(&self, inline: Option<&str>) -> Result<Value> {
        // Inline config takes precedence
        if let Some(json_str) = inline {
            return serde_json::from_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
            return serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        Ok(json!({}))
    }

    /// Run an extractor, printing messages to stdout
    async fn run_extractor(
        &self,
        url: Option<&str>,
        config_json: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u64>,
    ) -> Result<()> {
        let def = self.load_definition()?;
        let config = self.load_config(config_json)?;

        let matched = match url {
            Some(url) => match_url(&def, url)?,
            None if def.pattern.is_some() => {
                return Err(Error::config(format!(
                    "Extractor '{}' needs an input URL",
                    def.name
                )))
            }
            None => json!({}),
        };
        let ctx = TemplateContext::with_config(config).with_match(matched);

        let options = RunOptions {
            cursor: cursor.map(str::parse::<Cursor>).transpose()?,
            limit,
            ..RunOptions::default()
        };

        let cancel = options.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping");
                cancel.cancel();
            }
        });

        let mut driver = build_driver(&def, &ctx, &options)?;
        info!("Running extractor '{}'", def.name);

        let summary = match self.cli.format {
            OutputFormat::Json => {
                let mut sink = JsonLinesSink::new(std::io::stdout());
                driver.run(&mut sink).await?
            }
            OutputFormat::Pretty => {
                let mut sink = PrettySink(std::io::stdout());
                driver.run(&mut sink).await?
            }
        };

        info!(
            "{} pages, {} retries, {} skipped groups, {}ms",
            summary.stats.pages_fetched,
            summary.stats.retries,
            summary.stats.skipped_groups,
            summary.stats.duration_ms
        );
        if let Some(cursor) = summary.cursor {
            info!("Continue with --cursor {cursor}");
        }
        Ok(())
    }

    /// Validate extractor definition
    fn validate(&self) -> Result<()> {
        let def = self.load_definition()?;
        let output = json!({
            "type": "validation",
            "status": "valid",
            "extractor": def.name,
        });
        println!("{}", serde_json::to_string(&output)?);
        Ok(())
    }
}

/// Pretty-printed JSON, one block per message
struct PrettySink<W: Write + Send>(W);

impl<W: Write + Send> Sink for PrettySink<W> {
    fn send(&mut self, message: Message) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.0, &message)?;
        self.0.write_all(b"\n")?;
        Ok(())
    }
}
