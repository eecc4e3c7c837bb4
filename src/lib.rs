pub mod cli;
pub mod config;
pub mod data;
pub mod detect;
pub mod engine;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod mapping;
pub mod normalize;
pub mod registry;
pub mod report;
pub mod table;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs, MappingArgs, OutputFormat, ReportFormat},
    config::EngineConfig,
    engine::Engine,
    frame::{LoadOptions, RawTable},
    mapping::ExplicitMapping,
    normalize::CanonicalTable,
    registry::CanonicalField,
    table::{Align, TextTable},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("movie_normalize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Report(args) => handle_report(&args),
        Commands::Detect(args) => handle_detect(&args),
        Commands::Sources => handle_sources(),
    }
}

fn handle_normalize(args: &cli::NormalizeArgs) -> Result<()> {
    let engine = build_engine(&args.input)?;
    let source = checked_source(&engine, &args.mapping)?;
    let explicit = explicit_mapping(&args.mapping)?;
    let options = load_options(&engine, &args.input)?;
    let input = &args.input.input;
    info!(
        "Normalizing '{}' with delimiter '{}'",
        input.display(),
        printable_delimiter(io_utils::resolve_input_delimiter(input, options.delimiter))
    );

    let result = engine
        .load_and_map(input, &options, source, explicit.as_ref())
        .with_context(|| format!("Loading input {input:?}"))?;
    info!(
        "Source '{}': {} field(s) mapped, {} duplicate row(s) removed",
        result.source,
        result.mapping.len(),
        result.summary.duplicates_removed
    );
    if args.summary {
        info!("Summary: {}", serde_json::to_string(&result.summary)?);
    }

    let output = args.output.as_deref();
    let written = match args.format {
        OutputFormat::Csv => {
            let delimiter = io_utils::resolve_output_delimiter(
                output,
                args.output_delimiter,
                io_utils::DEFAULT_CSV_DELIMITER,
            );
            write_csv(&result.table, output, delimiter)
        }
        OutputFormat::Json => write_json(&result.table, output),
    };
    written.with_context(|| match output {
        Some(path) => format!("Writing output to {path:?}"),
        None => "Writing output to stdout".to_string(),
    })?;
    info!("Wrote {} row(s)", result.table.row_count());
    Ok(())
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let engine = build_engine(&args.input)?;
    let source = checked_source(&engine, &args.mapping)?;
    let explicit = explicit_mapping(&args.mapping)?;
    let raw = load_raw(&engine, &args.input)?;
    let report = engine
        .report(&raw, source, explicit.as_ref())
        .with_input(args.input.input.display().to_string());
    match args.format {
        ReportFormat::Text => print!("{}", report.render()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    let engine = build_engine(&args.input)?;
    let raw = load_raw(&engine, &args.input)?;
    let detection = engine.detect(&raw);
    if detection.fallback {
        println!("Detected source: {} (default)", detection.source);
    } else {
        println!("Detected source: {}", detection.source);
    }
    print!("{}", detection.render_scores());
    Ok(())
}

fn handle_sources() -> Result<()> {
    let engine = Engine::builtin();
    let mut sources = TextTable::new(["source", "diagnostic columns", "dictionary entries"])
        .align(2, Align::Right);
    for source in engine.registry().sources() {
        sources.push_row([
            source.name.to_string(),
            source.diagnostic_columns.join(", "),
            source.dictionary.len().to_string(),
        ]);
    }
    print!("{}", sources.render());
    println!();

    let mut schema = TextTable::new(["canonical field", "type"]);
    for field in CanonicalField::ALL {
        schema.push_row([field.as_str(), field.field_type().as_str()]);
    }
    print!("{}", schema.render());
    Ok(())
}

fn build_engine(input: &InputArgs) -> Result<Engine> {
    let config = match &input.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    debug!("Engine config: {config:?}");
    Engine::new(config)
}

/// Canonical registry spelling of `--source`, rejecting unknown names.
fn checked_source<'a>(engine: &'a Engine, args: &MappingArgs) -> Result<Option<&'a str>> {
    let Some(name) = args.source.as_deref() else {
        return Ok(None);
    };
    engine.ensure_known_source(name)?;
    Ok(engine.registry().source(name).map(|source| source.name))
}

/// Mapping file first, then inline `--map` pairs on top.
fn explicit_mapping(args: &MappingArgs) -> Result<Option<ExplicitMapping>> {
    let mut mapping = match &args.mapping {
        Some(path) => config::load_explicit_mapping(path)?,
        None => ExplicitMapping::new(),
    };
    mapping.extend(config::parse_mapping_pairs(&args.map)?);
    if mapping.is_empty() {
        Ok(None)
    } else {
        debug!("Explicit mapping: {mapping:?}");
        Ok(Some(mapping))
    }
}

fn load_options(engine: &Engine, input: &InputArgs) -> Result<LoadOptions> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    Ok(engine.config().load_options(input.delimiter, encoding))
}

fn load_raw(engine: &Engine, input: &InputArgs) -> Result<RawTable> {
    let options = load_options(engine, input)?;
    RawTable::load(&input.input, &options)
        .with_context(|| format!("Loading input {:?}", input.input))
}

fn write_csv(table: &CanonicalTable, output: Option<&Path>, delimiter: u8) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(output, delimiter)?;
    if !table.fields().is_empty() {
        writer.write_record(table.headers())?;
        for row in table.text_rows() {
            writer.write_record(&row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_json(table: &CanonicalTable, output: Option<&Path>) -> Result<()> {
    let mut writer = io_utils::open_output(output)?;
    serde_json::to_writer_pretty(&mut writer, &table.to_json_records())?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
