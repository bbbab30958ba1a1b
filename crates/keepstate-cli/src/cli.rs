use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keepstate",
    about = "Inspect and edit persisted state records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage configuration file (TOML). Overrides --backend and --path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "file")]
    pub backend: Backend,

    /// Backend location. Each backend has its own default.
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    Memory,
    File,
    Dir,
    Sqlite,
    Redb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the raw stored record
    Get(KeyArgs),
    /// Decode a record and print its state tree
    Show(KeyArgs),
    /// Report whether a record exists
    Has(KeyArgs),
    /// Remove a record
    Clear(KeyArgs),
    /// Store a plain JSON document as a record
    Put(PutArgs),
    /// Compare a stored record with a JSON document
    Diff(PutArgs),
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    /// JSON document
    pub json: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["keepstate", "get", "settings"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "settings");
        } else { panic!("wrong command"); }
        assert_eq!(cli.backend, Backend::File);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from(["keepstate", "put", "k", r#"{"count":1}"#]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.key, "k");
            assert_eq!(args.json, r#"{"count":1}"#);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "keepstate", "show", "k", "--backend", "dir", "--path", "/tmp/s", "--format", "json", "-v",
        ])
        .unwrap();
        assert_eq!(cli.backend, Backend::Dir);
        assert_eq!(cli.path, Some(PathBuf::from("/tmp/s")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config() {
        let cli = Cli::try_parse_from(["keepstate", "--config", "store.toml", "has", "k"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("store.toml")));
        assert!(matches!(cli.command, Command::Has(_)));
    }

    #[test]
    fn parse_clear_and_diff() {
        let cli = Cli::try_parse_from(["keepstate", "clear", "k"]).unwrap();
        assert!(matches!(cli.command, Command::Clear(_)));
        let cli = Cli::try_parse_from(["keepstate", "diff", "k", "{}"]).unwrap();
        assert!(matches!(cli.command, Command::Diff(_)));
    }

    #[test]
    fn missing_key_rejected() {
        assert!(Cli::try_parse_from(["keepstate", "get"]).is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["keepstate", "--backend", "cloud", "get", "k"]).is_err());
    }
}
