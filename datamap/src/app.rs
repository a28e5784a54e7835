//! Core application

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, MAX_ROWS_INPUT_SIZE};
use crate::data::cursor::MemoryCursor;
use crate::data::filter::{MAX_CONDITION_JSON_SIZE, compile_query, parse_conditions};
use crate::data::mapper::RecordMapper;
use crate::data::value::Value;
use crate::utils::file::read_input;
use crate::utils::json::{document_to_json, json_to_cell};

/// Raw result set as read by `datamap map`
#[derive(Debug, Deserialize)]
struct RowSet {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<JsonValue>>,
}

pub struct CoreApp {
    pub config: AppConfig,
}

impl CoreApp {
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.debug);

        tracing::debug!("Application starting");
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;
        let app = Self { config };

        let output = match command {
            Commands::Compile { input } => {
                let json = read_input(input.as_deref(), MAX_CONDITION_JSON_SIZE)?;
                app.compile(&json)?
            }
            Commands::Map {
                collection,
                input,
                insert,
            } => {
                let json = read_input(input.as_deref(), MAX_ROWS_INPUT_SIZE)?;
                app.map(&collection, &json, insert)?
            }
        };

        println!("{}", output);
        Ok(())
    }

    /// Compile a condition document into a filter document
    fn compile(&self, json: &str) -> Result<String> {
        let conditions = parse_conditions(json).context("Failed to parse conditions")?;
        let filter = compile_query(&conditions, self.config.top_level);

        if self.config.debug {
            tracing::info!(filter = %filter, top_level = %self.config.top_level, "Compiled filter");
        }

        Ok(serde_json::to_string_pretty(&filter)?)
    }

    /// Map a raw row set into documents, or into insert column/value lists
    fn map(&self, collection: &str, json: &str, insert: bool) -> Result<String> {
        let column_types = self.config.column_types(collection)?;
        let row_set: RowSet = serde_json::from_str(json).context("Failed to parse row set")?;

        let rows = row_set
            .rows
            .iter()
            .map(|row| row.iter().map(json_to_cell).collect())
            .collect();
        let mut cursor = MemoryCursor::new(row_set.columns, rows);

        let mapper = RecordMapper::new(column_types.clone()).with_policy(self.config.coercion);
        let mut documents: Vec<BTreeMap<String, Value>> = Vec::new();
        mapper
            .fetch_all(&mut documents, &mut cursor)
            .with_context(|| format!("Failed to map rows of collection '{}'", collection))?;

        tracing::debug!(
            collection,
            rows = documents.len(),
            coercion = %mapper.policy(),
            "Mapped rows"
        );

        let output: Vec<JsonValue> = if insert {
            documents
                .iter()
                .map(|document| -> Result<JsonValue> {
                    let (fields, values) = mapper.to_field_values(document, JsonValue::from)?;
                    Ok(serde_json::json!({ "fields": fields, "values": values }))
                })
                .collect::<Result<_>>()?
        } else {
            documents.into_iter().map(document_to_json).collect()
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }

    fn init_logging(debug: bool) {
        let level = if debug { "debug" } else { "info" };
        let default_filter = format!("info,{}={}", APP_NAME_LOWER, level);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries command output
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
