use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rindex",
    about = "rindex - cached secondary indexes over a key-value store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the todos walkthrough against an in-memory store
    Scenario,
    /// Check an entity against a schema
    Validate(ValidateArgs),
    /// Load a runtime configuration and bootstrap it
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Schema as JSON, or @path to a JSON file
    #[arg(long)]
    pub schema: String,
    /// Entity as JSON, or @path to a JSON file
    #[arg(long)]
    pub entity: String,
    /// Collection name used as the root of violation paths
    #[arg(long, default_value = "entity")]
    pub collection: String,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to the TOML configuration
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scenario() {
        let cli = Cli::try_parse_from(["rindex", "scenario"]).unwrap();
        assert!(matches!(cli.command, Command::Scenario));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_validate() {
        let cli = Cli::try_parse_from([
            "rindex",
            "validate",
            "--schema",
            "{}",
            "--entity",
            "@todo.json",
            "--collection",
            "todos",
        ])
        .unwrap();
        if let Command::Validate(args) = cli.command {
            assert_eq!(args.schema, "{}");
            assert_eq!(args.entity, "@todo.json");
            assert_eq!(args.collection, "todos");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_check_config_with_globals() {
        let cli =
            Cli::try_parse_from(["rindex", "check-config", "rindex.toml", "-v", "--format", "json"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        if let Command::CheckConfig(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("rindex.toml"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn validate_requires_schema() {
        assert!(Cli::try_parse_from(["rindex", "validate", "--entity", "{}"]).is_err());
    }
}
