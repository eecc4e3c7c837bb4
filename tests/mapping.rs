mod common;

use common::column_names;
use movie_normalize::{
    mapping::{ExplicitMapping, MatchStrategy, resolve},
    registry::{CanonicalField, Registry},
};
use proptest::prelude::*;

#[test]
fn tmdb_columns_resolve_through_the_dictionary() {
    let raw = column_names(&[
        "id",
        "title",
        "release_date",
        "vote_average",
        "vote_count",
        "popularity",
        "overview",
        "adult",
    ]);
    let mapping = resolve(&Registry::builtin(), &raw, "tmdb", None);
    assert_eq!(mapping.raw_for(CanonicalField::ReleaseYear), Some("release_date"));
    assert_eq!(mapping.raw_for(CanonicalField::Rating), Some("vote_average"));
    assert!(
        mapping
            .entries()
            .iter()
            .all(|entry| entry.strategy == MatchStrategy::Exact)
    );
    assert_eq!(mapping.unmapped(&raw), ["adult"]);
}

#[test]
fn fuzzy_patterns_fill_fields_the_dictionary_missed() {
    let raw = column_names(&["movieId", "title", "duration", "plot"]);
    let mapping = resolve(&Registry::builtin(), &raw, "movielens", None);
    let runtime = mapping
        .entries()
        .iter()
        .find(|entry| entry.raw == "duration")
        .expect("duration mapped");
    assert_eq!(runtime.target, "runtime");
    assert_eq!(runtime.strategy, MatchStrategy::Fuzzy);
    assert_eq!(mapping.raw_for(CanonicalField::Overview), Some("plot"));
}

#[test]
fn unknown_source_still_resolves_by_pattern() {
    let raw = column_names(&["Title", "Genre", "Year"]);
    let mapping = resolve(&Registry::builtin(), &raw, "criterion", None);
    assert_eq!(mapping.raw_for(CanonicalField::Title), Some("Title"));
    assert_eq!(mapping.raw_for(CanonicalField::Genres), Some("Genre"));
    assert_eq!(mapping.raw_for(CanonicalField::ReleaseYear), Some("Year"));
}

#[test]
fn explicit_mapping_may_name_non_canonical_targets() {
    let raw = column_names(&["Film", "Maker"]);
    let explicit: ExplicitMapping = [("Film", "title"), ("Maker", "director")]
        .into_iter()
        .collect();
    let mapping = resolve(&Registry::builtin(), &raw, "kaggle", Some(&explicit));
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.target_for("Maker"), Some("director"));
    assert!(mapping.entries()[1].field().is_none());
}

fn column_strategy() -> impl Strategy<Value = Vec<String>> {
    let names = prop::sample::select(vec![
        "id", "ID", "title", "Title", "name", "film_name", "genres", "genre", "year",
        "release_year", "Release Year", "runtime", "duration", "rating", "score", "votes",
        "vote_count", "popularity", "overview", "plot", "tconst", "movieId", "userId",
        "audience_score", "imdb_id", "misc",
    ]);
    prop::collection::vec(names, 0..12).prop_map(|picked| {
        let mut unique = Vec::new();
        for name in picked {
            if !unique.iter().any(|existing: &String| existing == name) {
                unique.push(name.to_string());
            }
        }
        unique
    })
}

proptest! {
    #[test]
    fn inferred_mappings_are_one_to_one(
        columns in column_strategy(),
        source in prop::sample::select(vec!["imdb", "tmdb", "movielens", "rotten_tomatoes", "letterboxd", "kaggle", "unknown"]),
    ) {
        let mapping = resolve(&Registry::builtin(), &columns, source, None);
        let mut raws = mapping.entries().iter().map(|e| e.raw.as_str()).collect::<Vec<_>>();
        let mut targets = mapping.entries().iter().map(|e| e.target.as_str()).collect::<Vec<_>>();
        raws.sort_unstable();
        raws.dedup();
        targets.sort_unstable();
        targets.dedup();
        prop_assert_eq!(raws.len(), mapping.len());
        prop_assert_eq!(targets.len(), mapping.len());
        for entry in mapping.entries() {
            prop_assert!(columns.contains(&entry.raw));
            prop_assert!(entry.field().is_some());
        }
    }

    #[test]
    fn explicit_mappings_pass_through_unchanged(
        columns in column_strategy(),
        pairs in prop::collection::vec(("[a-z]{1,8}", "[a-z_]{1,12}"), 1..6),
        source in prop::sample::select(vec!["imdb", "tmdb", "kaggle", "nowhere"]),
    ) {
        let explicit = pairs.iter().cloned().collect::<ExplicitMapping>();
        let mapping = resolve(&Registry::builtin(), &columns, source, Some(&explicit));
        let resolved = mapping
            .entries()
            .iter()
            .map(|e| (e.raw.as_str(), e.target.as_str()))
            .collect::<Vec<_>>();
        let expected = explicit.iter().collect::<Vec<_>>();
        prop_assert_eq!(resolved, expected);
        prop_assert!(mapping.entries().iter().all(|e| e.strategy == MatchStrategy::Explicit));
    }
}
