//! Mapping report: what source was chosen, which raw columns feed which
//! canonical fields, and what would be dropped.
//!
//! Building a report only detects and resolves. It never normalizes, so
//! inspecting a table cannot change it.

use std::fmt::{self, Write as _};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    detect::{self, SourceScore},
    frame::RawTable,
    mapping::{self, ExplicitMapping, MatchStrategy},
    registry::Registry,
    table::{TextTable, truncate_chars},
};

pub const SAMPLE_WIDTH: usize = 40;
pub const MISSING_SAMPLE: &str = "N/A";

const BANNER_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    /// Named by the caller.
    Supplied,
    /// Won on diagnostic columns.
    Detected,
    /// Nothing scored; the configured default was used.
    Fallback,
}

impl SourceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrigin::Supplied => "supplied",
            SourceOrigin::Detected => "detected",
            SourceOrigin::Fallback => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedPair {
    pub raw: String,
    pub target: String,
    pub strategy: MatchStrategy,
    pub sample: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub source: String,
    pub origin: SourceOrigin,
    pub scores: Vec<SourceScore>,
    pub row_count: usize,
    pub column_count: usize,
    pub pairs: Vec<ReportedPair>,
    pub unmapped: Vec<String>,
}

/// Builds the report for `raw`. `source` overrides detection when present.
pub fn build_report(
    registry: &Registry,
    raw: &RawTable,
    source: Option<&str>,
    default_source: &str,
    explicit: Option<&ExplicitMapping>,
) -> MappingReport {
    let detection = detect::detect(registry, raw.columns(), default_source);
    let (source, origin) = match source {
        Some(name) => (name.to_string(), SourceOrigin::Supplied),
        None if detection.fallback => (detection.source.clone(), SourceOrigin::Fallback),
        None => (detection.source.clone(), SourceOrigin::Detected),
    };
    let resolved = mapping::resolve(registry, raw.columns(), &source, explicit);

    let pairs = resolved
        .entries()
        .iter()
        .map(|entry| ReportedPair {
            raw: entry.raw.clone(),
            target: entry.target.clone(),
            strategy: entry.strategy,
            sample: sample_for(raw, &entry.raw),
        })
        .collect();
    let unmapped = resolved
        .unmapped(raw.columns())
        .into_iter()
        .map(str::to_string)
        .collect();

    MappingReport {
        input: None,
        source,
        origin,
        scores: detection.scores,
        row_count: raw.row_count(),
        column_count: raw.column_count(),
        pairs,
        unmapped,
    }
}

fn sample_for(raw: &RawTable, column: &str) -> String {
    raw.column_index(column)
        .and_then(|idx| raw.first_present(idx))
        .map(|value| truncate_chars(value, SAMPLE_WIDTH).to_string())
        .unwrap_or_else(|| MISSING_SAMPLE.to_string())
}

impl MappingReport {
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn render(&self) -> String {
        let heavy = "=".repeat(BANNER_WIDTH);
        let light = "-".repeat(BANNER_WIDTH);
        let mut out = String::new();

        let _ = writeln!(out, "{heavy}");
        let _ = writeln!(out, "DATA SOURCE MAPPING REPORT");
        let _ = writeln!(out, "{heavy}");
        if let Some(input) = &self.input {
            let _ = writeln!(out, "File: {input}");
        }
        let _ = writeln!(out, "Source: {} ({})", self.source, self.origin.as_str());
        let scores = self
            .scores
            .iter()
            .map(|s| format!("{}={}", s.source, s.score))
            .join(", ");
        let _ = writeln!(out, "Detection scores: {scores}");
        let _ = writeln!(out, "Total Columns: {}", self.column_count);
        let _ = writeln!(out, "Total Rows: {}", self.row_count);

        let _ = writeln!(out, "\n{light}\nCOLUMN MAPPINGS\n{light}");
        if self.pairs.is_empty() {
            let _ = writeln!(out, "(no columns mapped)");
        } else {
            let mut table = TextTable::new(["raw column", "canonical field", "strategy", "sample"]);
            for pair in &self.pairs {
                table.push_row([
                    pair.raw.as_str(),
                    pair.target.as_str(),
                    pair.strategy.as_str(),
                    pair.sample.as_str(),
                ]);
            }
            out.push_str(&table.render());
        }

        if !self.unmapped.is_empty() {
            let _ = writeln!(out, "\n{light}\nUNMAPPED COLUMNS (will be dropped)\n{light}");
            for column in &self.unmapped {
                let _ = writeln!(out, "  {column}");
            }
        }
        let _ = writeln!(out, "\n{heavy}");
        out
    }
}

impl fmt::Display for MappingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imdb_table() -> RawTable {
        RawTable::from_text_rows(
            &["tconst", "primary_title", "start_year", "title_type"],
            &[
                vec!["tt0078748", "", "1979", "movie"],
                vec!["tt0113277", "Heat", "1995", "movie"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn detected_source_and_pairs_are_reported() {
        let report = build_report(&Registry::builtin(), &imdb_table(), None, "kaggle", None);
        assert_eq!(report.source, "imdb");
        assert_eq!(report.origin, SourceOrigin::Detected);
        assert_eq!(report.row_count, 2);
        assert_eq!(report.column_count, 4);
        let title = report.pairs.iter().find(|p| p.target == "title").unwrap();
        assert_eq!(title.raw, "primary_title");
        assert_eq!(title.sample, "Heat");
        assert_eq!(report.unmapped, ["title_type"]);
    }

    #[test]
    fn supplied_source_is_marked() {
        let report = build_report(
            &Registry::builtin(),
            &imdb_table(),
            Some("imdb"),
            "kaggle",
            None,
        );
        assert_eq!(report.origin, SourceOrigin::Supplied);
    }

    #[test]
    fn all_missing_columns_sample_as_na() {
        let raw = RawTable::from_text_rows(&["title", "overview"], &[vec!["Up", ""]]).unwrap();
        let report = build_report(&Registry::builtin(), &raw, None, "kaggle", None);
        assert_eq!(report.origin, SourceOrigin::Fallback);
        let overview = report.pairs.iter().find(|p| p.target == "overview").unwrap();
        assert_eq!(overview.sample, MISSING_SAMPLE);
    }

    #[test]
    fn long_samples_are_cut() {
        let long = "x".repeat(100);
        let raw = RawTable::from_text_rows(&["overview"], &[vec![long.as_str()]]).unwrap();
        let report = build_report(&Registry::builtin(), &raw, None, "kaggle", None);
        assert_eq!(report.pairs[0].sample.len(), SAMPLE_WIDTH);
    }

    #[test]
    fn rendering_lists_pairs_and_unmapped_columns() {
        let text = build_report(&Registry::builtin(), &imdb_table(), None, "kaggle", None)
            .with_input("basics.tsv")
            .render();
        assert!(text.contains("DATA SOURCE MAPPING REPORT"));
        assert!(text.contains("File: basics.tsv"));
        assert!(text.contains("Source: imdb (detected)"));
        assert!(text.contains(
            "Detection scores: imdb=3, tmdb=0, movielens=0, rotten_tomatoes=0, letterboxd=0, kaggle=0"
        ));
        assert!(text.contains("primary_title"));
        assert!(text.contains("UNMAPPED COLUMNS"));
        assert!(text.contains("  title_type"));
    }
}
