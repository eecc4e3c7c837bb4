//! Record normalization: turning a raw table plus a resolved mapping into a
//! canonical table.
//!
//! Steps run in a fixed order: projection and rename, de-duplication on
//! `(title, release_year)`, numeric coercion, imputation, identity backfill,
//! and genre normalization. Only de-duplication removes rows; every other
//! step is per cell or per column and keeps row order.

use std::{
    collections::{BTreeMap, HashSet},
    sync::OnceLock,
};

use itertools::Itertools;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::{Value, median, parse_integer, parse_number, parse_year, round_to_integer},
    frame::RawTable,
    mapping::ResolvedMapping,
    registry::{CanonicalField, FieldType},
};

pub const UNKNOWN_GENRE: &str = "Unknown";
pub const GENRE_DELIMITER: &str = "|";
const SYNTHETIC_ID_PREFIX: &str = "MOV";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalTable {
    fields: Vec<CanonicalField>,
    rows: Vec<Vec<Option<Value>>>,
}

impl CanonicalTable {
    pub fn fields(&self) -> &[CanonicalField] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() || self.rows.is_empty()
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.fields.contains(&field)
    }

    pub fn headers(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.as_str().to_string()).collect()
    }

    pub fn value(&self, row: usize, field: CanonicalField) -> Option<&Value> {
        let idx = self.fields.iter().position(|f| *f == field)?;
        self.rows.get(row).and_then(|cells| cells[idx].as_ref())
    }

    pub fn column(&self, field: CanonicalField) -> Option<Vec<Option<&Value>>> {
        let idx = self.fields.iter().position(|f| *f == field)?;
        Some(self.rows.iter().map(|cells| cells[idx].as_ref()).collect())
    }

    /// Rows rendered as text, missing cells as empty strings.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Rows as JSON objects keyed by field name, missing cells as `null`.
    pub fn to_json_records(&self) -> JsonValue {
        let records = self
            .rows
            .iter()
            .map(|cells| {
                let mut object = Map::new();
                for (field, cell) in self.fields.iter().zip(cells) {
                    let value = match cell {
                        Some(value) => serde_json::to_value(value).unwrap_or(JsonValue::Null),
                        None => JsonValue::Null,
                    };
                    object.insert(field.as_str().to_string(), value);
                }
                JsonValue::Object(object)
            })
            .collect();
        JsonValue::Array(records)
    }
}

/// What normalization did to a table, for logging and callers who want to
/// audit data quality.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeSummary {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_removed: usize,
    pub dropped_columns: Vec<String>,
    /// Cells present in the input that failed numeric coercion.
    pub coercion_failures: BTreeMap<CanonicalField, usize>,
    /// Cells filled by the imputation policy.
    pub imputed: BTreeMap<CanonicalField, usize>,
    pub synthesized_ids: bool,
}

/// Normalizes `raw` using `mapping` and discards the summary.
pub fn normalize(raw: &RawTable, mapping: &ResolvedMapping) -> CanonicalTable {
    normalize_with_summary(raw, mapping).0
}

pub fn normalize_with_summary(
    raw: &RawTable,
    mapping: &ResolvedMapping,
) -> (CanonicalTable, NormalizeSummary) {
    let mut summary = NormalizeSummary {
        input_rows: raw.row_count(),
        ..NormalizeSummary::default()
    };

    let projection = project(raw, mapping, &mut summary);
    if projection.is_empty() {
        warn!("No input column maps to a canonical field; returning an empty table");
        return (CanonicalTable::default(), summary);
    }
    let kept_rows = deduplicate(raw, &projection);
    summary.duplicates_removed = raw.row_count() - kept_rows.len();
    if summary.duplicates_removed > 0 {
        info!("Removed {} duplicate row(s)", summary.duplicates_removed);
    }

    let mut fields = Vec::with_capacity(projection.len() + 1);
    let mut columns: Vec<Vec<Option<Value>>> = Vec::with_capacity(projection.len() + 1);

    if !projection.iter().any(|(f, _)| *f == CanonicalField::MovieId) {
        fields.push(CanonicalField::MovieId);
        columns.push(synthesize_ids(kept_rows.len()));
        summary.synthesized_ids = true;
        info!("Generated movie_id values for {} row(s)", kept_rows.len());
    }

    for (field, source_idx) in &projection {
        let raw_cells = kept_rows
            .iter()
            .map(|row| raw.cell(*row, *source_idx))
            .collect::<Vec<_>>();
        let (column, failures) = coerce_column(*field, &raw_cells);
        if failures > 0 {
            debug!("{failures} value(s) in '{field}' could not be coerced");
            summary.coercion_failures.insert(*field, failures);
        }
        let (column, imputed) = impute_column(*field, column);
        if imputed > 0 {
            summary.imputed.insert(*field, imputed);
        }
        fields.push(*field);
        columns.push(column);
    }

    let rows = (0..kept_rows.len())
        .map(|row| columns.iter().map(|column| column[row].clone()).collect())
        .collect::<Vec<_>>();
    summary.output_rows = rows.len();

    info!(
        "Normalized {} row(s) into {} canonical field(s): {}",
        summary.output_rows,
        fields.len(),
        fields.iter().join(", ")
    );
    (CanonicalTable { fields, rows }, summary)
}

/// Picks, for each canonical field in schema order, the first raw column (in
/// table order) that the mapping sends to it.
fn project(
    raw: &RawTable,
    mapping: &ResolvedMapping,
    summary: &mut NormalizeSummary,
) -> Vec<(CanonicalField, usize)> {
    for entry in mapping.entries() {
        if entry.field().is_none() {
            warn!(
                "Ignoring mapping '{}' -> '{}': not a canonical field",
                entry.raw, entry.target
            );
        } else if raw.column_index(&entry.raw).is_none() {
            debug!("Mapped column '{}' is not present in the input", entry.raw);
        }
    }

    let mut projection = Vec::new();
    let mut used = HashSet::new();
    for field in CanonicalField::ALL {
        let source = raw.columns().iter().position(|column| {
            mapping
                .entries()
                .iter()
                .find(|entry| entry.raw == *column)
                .and_then(|entry| entry.field())
                == Some(field)
        });
        if let Some(idx) = source {
            projection.push((field, idx));
            used.insert(idx);
        }
    }

    summary.dropped_columns = raw
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !used.contains(idx))
        .map(|(_, name)| name.clone())
        .collect();
    if !summary.dropped_columns.is_empty() {
        debug!("Dropping unmapped column(s): {:?}", summary.dropped_columns);
    }
    projection
}

/// Row indices to keep, first occurrence of each `(title, release_year)`
/// pair. Without both fields every row is kept.
fn deduplicate(raw: &RawTable, projection: &[(CanonicalField, usize)]) -> Vec<usize> {
    let source_of = |wanted: CanonicalField| {
        projection
            .iter()
            .find(|(field, _)| *field == wanted)
            .map(|(_, idx)| *idx)
    };
    let (Some(title), Some(year)) = (
        source_of(CanonicalField::Title),
        source_of(CanonicalField::ReleaseYear),
    ) else {
        return (0..raw.row_count()).collect();
    };

    let mut seen = HashSet::new();
    (0..raw.row_count())
        .filter(|row| {
            let title_key = raw
                .cell(*row, title)
                .map(str::trim)
                .filter(|text| !text.is_empty());
            let year_key = raw.cell(*row, year).map(|cell| match parse_year(cell) {
                Some(parsed) => YearKey::Parsed(parsed),
                None => YearKey::Text(cell.trim()),
            });
            seen.insert((title_key, year_key))
        })
        .collect()
}

/// Years compare by value when they parse, by trimmed text otherwise.
#[derive(Debug, PartialEq, Eq, Hash)]
enum YearKey<'a> {
    Parsed(i64),
    Text(&'a str),
}

fn coerce_column(field: CanonicalField, cells: &[Option<&str>]) -> (Vec<Option<Value>>, usize) {
    let mut failures = 0usize;
    let column: Vec<Option<Value>> = cells
        .iter()
        .map(|cell| {
            let value = coerce_cell(field, *cell);
            if cell.is_some() && value.is_none() && field.field_type() != FieldType::Text {
                failures += 1;
            }
            value
        })
        .collect();
    (column, failures)
}

fn coerce_cell(field: CanonicalField, cell: Option<&str>) -> Option<Value> {
    match field {
        CanonicalField::Genres => Some(Value::Text(normalize_genres(cell))),
        CanonicalField::ReleaseYear => cell.and_then(parse_year).map(Value::Integer),
        CanonicalField::Runtime | CanonicalField::VoteCount => {
            cell.and_then(parse_integer).map(Value::Integer)
        }
        CanonicalField::Rating | CanonicalField::Popularity => {
            cell.and_then(parse_number).map(Value::Real)
        }
        CanonicalField::MovieId | CanonicalField::Title | CanonicalField::Overview => cell
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| Value::Text(text.to_string())),
    }
}

/// Median for rating and runtime, zero for counts and popularity, nothing
/// for the year.
fn impute_column(field: CanonicalField, mut column: Vec<Option<Value>>) -> (Vec<Option<Value>>, usize) {
    let missing = column.iter().filter(|cell| cell.is_none()).count();
    if missing == 0 {
        return (column, 0);
    }
    let fill = match field {
        CanonicalField::Rating => column_median(&column).map(Value::Real),
        CanonicalField::Runtime => column_median(&column)
            .and_then(round_to_integer)
            .map(Value::Integer),
        CanonicalField::VoteCount => Some(Value::Integer(0)),
        CanonicalField::Popularity => Some(Value::Real(0.0)),
        _ => None,
    };
    let Some(fill) = fill else {
        return (column, 0);
    };
    debug!("Filling {missing} missing '{field}' value(s) with {fill}");
    for cell in column.iter_mut().filter(|cell| cell.is_none()) {
        *cell = Some(fill.clone());
    }
    (column, missing)
}

fn column_median(column: &[Option<Value>]) -> Option<f64> {
    let present = column
        .iter()
        .flatten()
        .filter_map(Value::as_f64)
        .collect::<Vec<_>>();
    median(&present)
}

fn synthesize_ids(count: usize) -> Vec<Option<Value>> {
    (1..=count)
        .map(|n| Some(Value::Text(format!("{SYNTHETIC_ID_PREFIX}{n:05}"))))
        .collect()
}

fn genre_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[|,;]").expect("genre separator pattern is valid"))
}

/// Strips list-literal punctuation and rejoins the tags with `|`. Missing or
/// tag-less values become [`UNKNOWN_GENRE`].
pub fn normalize_genres(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN_GENRE.to_string();
    };
    let stripped = raw.replace(['[', ']', '\'', '"'], "");
    let tags = genre_separator()
        .split(&stripped)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>();
    if tags.is_empty() {
        UNKNOWN_GENRE.to_string()
    } else {
        tags.join(GENRE_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ExplicitMapping;

    fn table(columns: &[&str], rows: &[Vec<&str>]) -> RawTable {
        RawTable::from_text_rows(columns, rows).expect("valid table")
    }

    #[test]
    fn genres_lose_list_punctuation() {
        assert_eq!(normalize_genres(Some("['Action', 'Drama']")), "Action|Drama");
        assert_eq!(normalize_genres(Some("Comedy|Romance")), "Comedy|Romance");
        assert_eq!(normalize_genres(Some("[\"Horror\"]")), "Horror");
        assert_eq!(normalize_genres(Some("[]")), UNKNOWN_GENRE);
        assert_eq!(normalize_genres(None), UNKNOWN_GENRE);
    }

    #[test]
    fn projection_follows_schema_order_and_drops_unmapped() {
        let raw = table(&["score", "junk", "name"], &[vec!["7.0", "x", "Heat"]]);
        let mapping = ResolvedMapping::from_explicit(
            &[("score", "rating"), ("name", "title")].into_iter().collect(),
        );
        let (canonical, summary) = normalize_with_summary(&raw, &mapping);
        assert_eq!(
            canonical.fields(),
            [CanonicalField::MovieId, CanonicalField::Title, CanonicalField::Rating]
        );
        assert_eq!(summary.dropped_columns, vec!["junk".to_string()]);
    }

    #[test]
    fn explicit_duplicates_take_the_first_column() {
        let raw = table(&["a", "b"], &[vec!["First", "Second"]]);
        let explicit: ExplicitMapping = [("b", "title"), ("a", "title")].into_iter().collect();
        let canonical = normalize(&raw, &ResolvedMapping::from_explicit(&explicit));
        assert_eq!(
            canonical.value(0, CanonicalField::Title),
            Some(&Value::Text("First".into()))
        );
    }

    #[test]
    fn non_canonical_targets_are_ignored() {
        let raw = table(&["a", "b"], &[vec!["x", "Heat"]]);
        let explicit: ExplicitMapping = [("a", "director"), ("b", "title")].into_iter().collect();
        let canonical = normalize(&raw, &ResolvedMapping::from_explicit(&explicit));
        assert_eq!(
            canonical.fields(),
            [CanonicalField::MovieId, CanonicalField::Title]
        );
    }

    #[test]
    fn empty_mapping_yields_an_empty_table() {
        let raw = table(&["a"], &[vec!["x"], vec!["y"]]);
        let (canonical, summary) = normalize_with_summary(&raw, &ResolvedMapping::default());
        assert!(canonical.is_empty());
        assert!(canonical.fields().is_empty());
        assert_eq!(summary.input_rows, 2);
        assert_eq!(summary.dropped_columns, vec!["a".to_string()]);
    }

    #[test]
    fn runtime_median_is_rounded() {
        let raw = table(&["runtime"], &[vec!["90"], vec!["95"], vec![""]]);
        let canonical = normalize(&raw, &ResolvedMapping::identity(&["runtime"]));
        assert_eq!(
            canonical.value(2, CanonicalField::Runtime),
            Some(&Value::Integer(93))
        );
    }

    #[test]
    fn release_year_stays_unknown_when_unparseable() {
        let raw = table(
            &["title", "release_year"],
            &[vec!["Alien", "1979"], vec!["Heat", "soon"]],
        );
        let (canonical, summary) =
            normalize_with_summary(&raw, &ResolvedMapping::identity(&["title", "release_year"]));
        assert_eq!(canonical.value(1, CanonicalField::ReleaseYear), None);
        assert_eq!(summary.coercion_failures.get(&CanonicalField::ReleaseYear), Some(&1));
        assert!(summary.imputed.is_empty());
    }

    #[test]
    fn json_records_use_null_for_missing() {
        let raw = table(&["title", "release_year"], &[vec!["Alien", ""]]);
        let canonical = normalize(&raw, &ResolvedMapping::identity(&["title", "release_year"]));
        let json = canonical.to_json_records();
        assert_eq!(json[0]["title"], "Alien");
        assert!(json[0]["release_year"].is_null());
        assert_eq!(json[0]["movie_id"], "MOV00001");
    }
}
