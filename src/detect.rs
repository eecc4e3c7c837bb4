use std::collections::HashSet;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    data::fold_name,
    registry::Registry,
    table::{Align, TextTable},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceScore {
    pub source: &'static str,
    pub score: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub source: String,
    /// One entry per registered source, in registry order.
    pub scores: Vec<SourceScore>,
    /// True when no source scored and the default was used.
    pub fallback: bool,
}

/// Scores every registered source by how many of its diagnostic columns
/// appear in `raw_columns` (case-insensitively).
pub fn score_sources<S: AsRef<str>>(registry: &Registry, raw_columns: &[S]) -> Vec<SourceScore> {
    let folded = raw_columns
        .iter()
        .map(|column| fold_name(column.as_ref()))
        .collect::<HashSet<_>>();
    registry
        .sources()
        .iter()
        .map(|source| SourceScore {
            source: source.name,
            score: source
                .diagnostic_columns
                .iter()
                .filter(|column| folded.contains(&fold_name(column)))
                .count(),
        })
        .collect()
}

/// Picks the source with the strictly highest score; the first registered
/// source wins ties. Falls back to `default_source` when nothing scores.
pub fn detect<S: AsRef<str>>(
    registry: &Registry,
    raw_columns: &[S],
    default_source: &str,
) -> Detection {
    let scores = score_sources(registry, raw_columns);
    let mut best: Option<&SourceScore> = None;
    for candidate in &scores {
        if best.is_none_or(|current| candidate.score > current.score) {
            best = Some(candidate);
        }
    }
    debug!(
        "Source detection scores: {}",
        scores
            .iter()
            .map(|s| format!("{}={}", s.source, s.score))
            .join(", ")
    );
    match best {
        Some(winner) if winner.score > 0 => Detection {
            source: winner.source.to_string(),
            scores,
            fallback: false,
        },
        _ => Detection {
            source: default_source.to_string(),
            scores,
            fallback: true,
        },
    }
}

impl Detection {
    /// Scores as a two-column table, highest first. Equal scores keep
    /// registry order.
    pub fn render_scores(&self) -> String {
        let mut ranked = self.scores.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        let mut table = TextTable::new(["source", "score"]).align(1, Align::Right);
        for score in ranked {
            table.push_row([score.source.to_string(), score.score.to_string()]);
        }
        table.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imdb_columns_detect_imdb() {
        let registry = Registry::builtin();
        let detection = detect(
            &registry,
            &["tconst", "primary_title", "start_year", "average_rating"],
            "kaggle",
        );
        assert_eq!(detection.source, "imdb");
        assert!(!detection.fallback);
        assert_eq!(detection.scores[0].score, 3);
    }

    #[test]
    fn detection_folds_case() {
        let registry = Registry::builtin();
        let detection = detect(&registry, &["MovieId", "UserId", "Timestamp"], "kaggle");
        assert_eq!(detection.source, "movielens");
    }

    #[test]
    fn ties_go_to_the_earlier_source() {
        let registry = Registry::builtin();
        // imdb and tmdb both score two
        let detection = detect(
            &registry,
            &["tconst", "primary_title", "id", "vote_average"],
            "kaggle",
        );
        assert_eq!(detection.source, "imdb");
    }

    #[test]
    fn no_signal_falls_back_to_default() {
        let registry = Registry::builtin();
        let detection = detect(&registry, &["foo", "bar"], "letterboxd");
        assert_eq!(detection.source, "letterboxd");
        assert!(detection.fallback);
        assert!(detection.scores.iter().all(|s| s.score == 0));
    }

    #[test]
    fn rendered_scores_put_the_winner_first() {
        let registry = Registry::builtin();
        let detection = detect(&registry, &["movieId", "userId"], "kaggle");
        let rendered = detection.render_scores();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert!(lines[2].starts_with("movielens ") && lines[2].ends_with(" 2"));
        assert!(lines[3].starts_with("imdb ") && lines[3].ends_with(" 0"));
    }

    #[test]
    fn empty_column_set_falls_back() {
        let registry = Registry::builtin();
        let columns: [&str; 0] = [];
        assert!(detect(&registry, &columns, "kaggle").fallback);
    }
}
