use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Detect, map and normalize movie tables from IMDb, TMDB, MovieLens and friends",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Map a movie table onto the canonical schema and write the cleaned rows
    Normalize(NormalizeArgs),
    /// Show the detected source, proposed column mapping and dropped columns
    Report(ReportArgs),
    /// Score an input's columns against every known source
    Detect(DetectArgs),
    /// List registered sources and the canonical schema
    Sources,
}

/// Options shared by every command that reads a table.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (.csv, .tsv or .json; '-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML file overriding the default source and missing-value tokens
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Options that steer column mapping.
#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Skip detection and treat the input as this source
    #[arg(short = 's', long)]
    pub source: Option<String>,
    /// YAML or JSON file of `raw_column: canonical_field` pairs
    #[arg(short = 'm', long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Inline `raw_column=canonical_field` pair; repeatable, applied after --mapping
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Output file (stdout when omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
    /// Delimiter for CSV output (defaults to the output extension, then comma)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Log the normalization summary as JSON
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
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

    #[test]
    fn named_delimiters_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn normalize_arguments_parse() {
        let cli = Cli::try_parse_from([
            "movie-normalize",
            "normalize",
            "-i",
            "movies.tsv",
            "--source",
            "imdb",
            "--map",
            "Yr=release_year",
            "--map",
            "Name=title",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Normalize(args) = cli.command else {
            panic!("expected normalize");
        };
        assert_eq!(args.mapping.source.as_deref(), Some("imdb"));
        assert_eq!(args.mapping.map, ["Yr=release_year", "Name=title"]);
        assert_eq!(args.format, OutputFormat::Json);
    }
}
