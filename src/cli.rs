use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bonita-importfile",
    author,
    version,
    about = "Start Bonita BPM processes from the rows of a typed CSV file",
    long_about = None
)]
pub struct Cli {
    /// Show talkative (trace) logging
    #[arg(short = 't', long = "talkative", global = true, conflicts_with = "quiet")]
    pub talkative: bool,
    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start one process instance per CSV row
    Import(ImportArgs),
    /// Print the document each CSV row maps to, without contacting a server
    Map(MapArgs),
    /// List the processes deployed on the server
    Processes(ProcessesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CsvArgs {
    /// CSV file to read ('-' for stdin); asked for when omitted
    #[arg(short = 'c', long = "csv-file")]
    pub csv_file: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the CSV file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// URL of the Bonita BPM server
    #[arg(short = 's', long = "server-url")]
    pub server_url: Option<String>,
    /// Name of the Bonita BPM application
    #[arg(short = 'a', long = "application-name")]
    pub application_name: Option<String>,
    /// Username of the Bonita BPM user
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,
    /// Password of the Bonita BPM user
    #[arg(short = 'p', long = "password")]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub csv: CsvArgs,
    #[command(flatten)]
    pub server: ServerArgs,
    /// Name of the Bonita BPM process
    #[arg(short = 'n', long = "process-name")]
    pub process_name: Option<String>,
    /// Version of the Bonita BPM process
    #[arg(short = 'v', long = "process-version")]
    pub process_version: Option<String>,
    /// YAML file with boolean literals, date pattern and connection defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub csv: CsvArgs,
    /// Write JSON lines here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// YAML file with boolean literals and date pattern
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProcessesArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    /// YAML file with connection defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_accepts_short_options() {
        let cli = Cli::try_parse_from([
            "bonita-importfile",
            "import",
            "-s",
            "http://bpm:8080",
            "-a",
            "bonita",
            "-u",
            "walter.bates",
            "-p",
            "bpm",
            "-n",
            "Claim",
            "-v",
            "1.0",
            "-c",
            "claims.csv",
            "-t",
        ])
        .unwrap();
        assert!(cli.talkative);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.server.server_url.as_deref(), Some("http://bpm:8080"));
                assert_eq!(args.process_version.as_deref(), Some("1.0"));
                assert_eq!(args.csv.csv_file, Some(PathBuf::from("claims.csv")));
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn csv_file_is_optional() {
        let cli = Cli::try_parse_from(["bonita-importfile", "map"]).unwrap();
        match cli.command {
            Commands::Map(args) => assert!(args.csv.csv_file.is_none()),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn talkative_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["bonita-importfile", "-t", "-q", "map", "-c", "a.csv"]).is_err());
    }

    #[test]
    fn parse_delimiter_accepts_names() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter("ab").is_err());
    }
}
