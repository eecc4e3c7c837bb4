//! The raw input relation handed to the engine.
//!
//! A [`RawTable`] is immutable once built: the engine only ever reads from it
//! and produces new tables. Cells are `None` when missing, either because the
//! source left them blank or because they held one of the configured
//! missing-value tokens.

use std::{
    collections::{HashMap, HashSet},
    io::Read,
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};
use log::info;
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::{DEFAULT_MISSING_TOKENS, is_missing_token},
    error::LoadError,
    io_utils::{self, InputFormat},
};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub missing_tokens: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self, LoadError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LoadError::RaggedRow {
                    row: idx + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Builds a table from text cells, treating empty strings as missing.
    pub fn from_text_rows<S: AsRef<str>>(columns: &[S], rows: &[Vec<S>]) -> Result<Self, LoadError> {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        let cell = cell.as_ref();
                        (!cell.trim().is_empty()).then(|| cell.to_string())
                    })
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .and_then(|cell| cell.as_deref())
    }

    /// First non-missing value in a column, in row order.
    pub fn first_present(&self, column: usize) -> Option<&str> {
        self.rows
            .iter()
            .find_map(|row| row.get(column).and_then(|cell| cell.as_deref()))
    }

    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let table = match io_utils::detect_input_format(path) {
            InputFormat::Json => Self::from_json_path(path, options)?,
            InputFormat::Delimited => Self::from_csv_path(path, options)?,
        };
        info!(
            "Loaded {} row(s), {} column(s) from {:?}",
            table.row_count(),
            table.column_count(),
            path
        );
        Ok(table)
    }

    pub fn from_csv_path(path: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
        let reader = io_utils::open_input(path)?;
        Self::from_csv_reader(reader, delimiter, options.encoding, &options.missing_tokens)
    }

    pub fn from_json_path(path: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let reader = io_utils::open_input(path)?;
        Self::from_json_reader(reader, &options.missing_tokens)
    }

    pub fn from_csv_reader<R: Read>(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
        missing_tokens: &[String],
    ) -> Result<Self, LoadError> {
        let mut reader = io_utils::open_csv_reader(reader, delimiter);
        let headers = reader.byte_headers()?.clone();
        let columns = io_utils::decode_record(&headers, encoding, 1)?;
        let mut rows = Vec::new();
        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            let row_number = rows.len() + 2;
            let decoded = io_utils::decode_record(&record, encoding, row_number)?;
            rows.push(
                decoded
                    .into_iter()
                    .map(|cell| (!is_missing_token(&cell, missing_tokens)).then_some(cell))
                    .collect(),
            );
        }
        Self::new(columns, rows)
    }

    /// Reads either an array of records or an object of columns. Column
    /// objects may hold arrays or index-keyed objects.
    pub fn from_json_reader<R: Read>(reader: R, missing_tokens: &[String]) -> Result<Self, LoadError> {
        let document: JsonValue = serde_json::from_reader(reader)?;
        match document {
            JsonValue::Array(records) => Self::from_json_records(records, missing_tokens),
            JsonValue::Object(columns) => Self::from_json_columns(columns, missing_tokens),
            other => Err(LoadError::JsonShape(format!(
                "expected an array of records or an object of columns, found {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_json_records(records: Vec<JsonValue>, missing_tokens: &[String]) -> Result<Self, LoadError> {
        let mut columns: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let object = match record {
                JsonValue::Object(object) => object,
                other => {
                    return Err(LoadError::JsonShape(format!(
                        "record {} is {}, expected an object",
                        idx + 1,
                        json_kind(&other)
                    )));
                }
            };
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            objects.push(object);
        }
        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|column| object.get(column).and_then(|v| json_cell(v, missing_tokens)))
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Column-oriented JSON. Index-keyed objects are aligned on their keys,
    /// in first-seen order; array columns are keyed by position. A column
    /// lacking a key gets a missing cell there. Documents made only of arrays
    /// must have equal lengths.
    fn from_json_columns(
        object: Map<String, JsonValue>,
        missing_tokens: &[String],
    ) -> Result<Self, LoadError> {
        let mut columns = Vec::with_capacity(object.len());
        let mut keyed: Vec<HashMap<String, Option<String>>> = Vec::with_capacity(object.len());
        let mut index: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut array_lengths = Some(Vec::with_capacity(object.len()));
        for (name, values) in object {
            let entries: Vec<(String, Option<String>)> = match values {
                JsonValue::Array(items) => {
                    if let Some(lengths) = array_lengths.as_mut() {
                        lengths.push(items.len());
                    }
                    items
                        .iter()
                        .enumerate()
                        .map(|(pos, v)| (pos.to_string(), json_cell(v, missing_tokens)))
                        .collect()
                }
                JsonValue::Object(indexed) => {
                    array_lengths = None;
                    indexed
                        .iter()
                        .map(|(key, v)| (key.clone(), json_cell(v, missing_tokens)))
                        .collect()
                }
                other => {
                    return Err(LoadError::JsonShape(format!(
                        "column '{name}' is {}, expected an array or object",
                        json_kind(&other)
                    )));
                }
            };
            for (key, _) in &entries {
                if seen.insert(key.clone()) {
                    index.push(key.clone());
                }
            }
            columns.push(name);
            keyed.push(entries.into_iter().collect());
        }
        if let Some(lengths) = array_lengths {
            let row_count = lengths.iter().copied().max().unwrap_or(0);
            if let Some((idx, short)) = lengths.iter().enumerate().find(|(_, l)| **l != row_count)
            {
                return Err(LoadError::JsonShape(format!(
                    "column '{}' has {short} value(s) but other columns have {row_count}",
                    columns[idx]
                )));
            }
        }
        let rows = index
            .iter()
            .map(|key| {
                keyed
                    .iter()
                    .map(|column| column.get(key).cloned().flatten())
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn json_cell(value: &JsonValue, missing_tokens: &[String]) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if is_missing_token(s, missing_tokens) => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => Some(list_literal(items)),
        JsonValue::Object(_) => Some(value.to_string()),
    }
}

/// Renders a JSON array the way list-valued cells appear in exported CSVs,
/// e.g. `['Action', 'Drama']`.
fn list_literal(items: &[JsonValue]) -> String {
    let rendered = items
        .iter()
        .map(|item| match item {
            JsonValue::String(s) => format!("'{s}'"),
            JsonValue::Object(object) => object
                .get("name")
                .and_then(JsonValue::as_str)
                .map(|name| format!("'{name}'"))
                .unwrap_or_else(|| item.to_string()),
            other => other.to_string(),
        })
        .collect::<Vec<_>>();
    format!("[{}]", rendered.join(", "))
}
