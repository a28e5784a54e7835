use clap::{Parser, Subcommand};

use std::path::PathBuf;

use crate::data::coerce::CoercionPolicy;
use crate::data::filter::TopLevel;

use super::constants::{ENV_COERCION, ENV_CONFIG, ENV_DEBUG, ENV_TOP_LEVEL};

#[derive(Parser)]
#[command(name = "datamap")]
#[command(version, about = "Row mapper and condition compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug mode (debug logging, compiled filters logged)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Coercion policy for cells that fail to convert (lenient or strict)
    #[arg(long, global = true, env = ENV_COERCION, value_parser = parse_coercion_policy)]
    pub coercion: Option<CoercionPolicy>,

    /// How several top-level conditions are combined (merge or and)
    #[arg(long, global = true, env = ENV_TOP_LEVEL, value_parser = parse_top_level)]
    pub top_level: Option<TopLevel>,
}

/// Parse coercion policy from CLI/env string
fn parse_coercion_policy(s: &str) -> Result<CoercionPolicy, String> {
    match s.to_lowercase().as_str() {
        "lenient" => Ok(CoercionPolicy::Lenient),
        "strict" => Ok(CoercionPolicy::Strict),
        _ => Err(format!(
            "Invalid coercion policy '{}'. Valid options: lenient, strict",
            s
        )),
    }
}

/// Parse top-level combination mode from CLI/env string
fn parse_top_level(s: &str) -> Result<TopLevel, String> {
    match s.to_lowercase().as_str() {
        "merge" => Ok(TopLevel::Merge),
        "and" => Ok(TopLevel::And),
        _ => Err(format!(
            "Invalid top-level mode '{}'. Valid options: merge, and",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compile a condition tree (JSON) into a filter document
    Compile {
        /// Read conditions from this file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
    /// Map raw rows of a collection into documents
    Map {
        /// Collection whose column types drive conversion
        #[arg(long)]
        collection: String,

        /// Read rows from this file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Print the column and value lists a driver would insert
        #[arg(long)]
        insert: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub coercion: Option<CoercionPolicy>,
    pub top_level: Option<TopLevel>,
}

impl Cli {
    /// Split into the config overrides and the command to run
    pub fn into_parts(self) -> (CliConfig, Commands) {
        let config = CliConfig {
            debug: self.debug,
            config: self.config,
            coercion: self.coercion,
            top_level: self.top_level,
        };
        (config, self.command)
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    Cli::parse().into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coercion_policy() {
        assert_eq!(parse_coercion_policy("STRICT"), Ok(CoercionPolicy::Strict));
        assert_eq!(parse_coercion_policy("lenient"), Ok(CoercionPolicy::Lenient));
        assert!(parse_coercion_policy("loose").is_err());
    }

    #[test]
    fn test_parse_top_level() {
        assert_eq!(parse_top_level("and"), Ok(TopLevel::And));
        assert_eq!(parse_top_level("Merge"), Ok(TopLevel::Merge));
        assert!(parse_top_level("or").is_err());
    }

    #[test]
    fn test_cli_map_command() {
        let cli = Cli::try_parse_from([
            "datamap",
            "map",
            "--collection",
            "users",
            "--insert",
            "--coercion",
            "strict",
        ])
        .unwrap();
        let (config, command) = cli.into_parts();

        assert_eq!(config.coercion, Some(CoercionPolicy::Strict));
        match command {
            Commands::Map {
                collection,
                input,
                insert,
            } => {
                assert_eq!(collection, "users");
                assert!(input.is_none());
                assert!(insert);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_compile_command() {
        let cli =
            Cli::try_parse_from(["datamap", "compile", "-i", "q.json", "--top-level", "and"])
                .unwrap();
        let (config, command) = cli.into_parts();

        assert_eq!(config.top_level, Some(TopLevel::And));
        assert!(matches!(command, Commands::Compile { input: Some(path) } if path == PathBuf::from("q.json")));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["datamap"]).is_err());
    }
}
