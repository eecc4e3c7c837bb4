//! Static reference data shared by detection, mapping, and normalization.
//!
//! The registry holds three tables, all `'static` and immutable for the life
//! of the process:
//!
//! - the canonical schema ([`CanonicalField`] in declaration order),
//! - the known upstream [`SourceSignature`]s, whose order is the detection
//!   tie-break order,
//! - the [`FuzzyPattern`] table consulted when exact dictionaries leave a
//!   field unresolved. Variant order is match priority.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    MovieId,
    Title,
    Genres,
    ReleaseYear,
    Runtime,
    Rating,
    VoteCount,
    Popularity,
    Overview,
}

/// Semantic type declared for a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    /// Pipe-delimited set of tags.
    TagSet,
    Integer,
    Real,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::TagSet => "text(pipe-delimited)",
            FieldType::Integer => "integer",
            FieldType::Real => "real",
        }
    }
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::MovieId,
        CanonicalField::Title,
        CanonicalField::Genres,
        CanonicalField::ReleaseYear,
        CanonicalField::Runtime,
        CanonicalField::Rating,
        CanonicalField::VoteCount,
        CanonicalField::Popularity,
        CanonicalField::Overview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::MovieId => "movie_id",
            CanonicalField::Title => "title",
            CanonicalField::Genres => "genres",
            CanonicalField::ReleaseYear => "release_year",
            CanonicalField::Runtime => "runtime",
            CanonicalField::Rating => "rating",
            CanonicalField::VoteCount => "vote_count",
            CanonicalField::Popularity => "popularity",
            CanonicalField::Overview => "overview",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            CanonicalField::MovieId | CanonicalField::Title | CanonicalField::Overview => {
                FieldType::Text
            }
            CanonicalField::Genres => FieldType::TagSet,
            CanonicalField::ReleaseYear | CanonicalField::Runtime | CanonicalField::VoteCount => {
                FieldType::Integer
            }
            CanonicalField::Rating | CanonicalField::Popularity => FieldType::Real,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CanonicalField::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| anyhow!("'{wanted}' is not a canonical field"))
    }
}

#[derive(Debug)]
pub struct SourceSignature {
    pub name: &'static str,
    /// Column names whose presence is diagnostic of this source.
    pub diagnostic_columns: &'static [&'static str],
    /// Known column names in declaration order; the first present name wins
    /// when two entries share a destination.
    pub dictionary: &'static [(&'static str, CanonicalField)],
}

#[derive(Debug)]
pub struct FuzzyPattern {
    pub field: CanonicalField,
    pub variants: &'static [&'static str],
}

use self::CanonicalField as F;

pub static BUILTIN_SOURCES: &[SourceSignature] = &[
    SourceSignature {
        name: "imdb",
        diagnostic_columns: &["tconst", "primary_title", "start_year"],
        dictionary: &[
            ("tconst", F::MovieId),
            ("title_id", F::MovieId),
            ("primary_title", F::Title),
            ("original_title", F::Title),
            ("genres", F::Genres),
            ("start_year", F::ReleaseYear),
            ("runtime_minutes", F::Runtime),
            ("average_rating", F::Rating),
            ("num_votes", F::VoteCount),
        ],
    },
    SourceSignature {
        name: "tmdb",
        diagnostic_columns: &["id", "vote_average", "vote_count"],
        dictionary: &[
            ("id", F::MovieId),
            ("title", F::Title),
            ("genres", F::Genres),
            ("release_date", F::ReleaseYear),
            ("runtime", F::Runtime),
            ("vote_average", F::Rating),
            ("vote_count", F::VoteCount),
            ("popularity", F::Popularity),
            ("overview", F::Overview),
        ],
    },
    SourceSignature {
        name: "movielens",
        diagnostic_columns: &["movieid", "userid", "timestamp"],
        dictionary: &[
            ("movieid", F::MovieId),
            ("movie_id", F::MovieId),
            ("title", F::Title),
            ("genres", F::Genres),
            ("rating", F::Rating),
            ("timestamp", F::VoteCount),
        ],
    },
    SourceSignature {
        name: "rotten_tomatoes",
        diagnostic_columns: &["audience_score", "critics_score"],
        dictionary: &[
            ("id", F::MovieId),
            ("name", F::Title),
            ("title", F::Title),
            ("genre", F::Genres),
            ("genres", F::Genres),
            ("year", F::ReleaseYear),
            ("rating", F::Rating),
            ("audience_score", F::Rating),
            ("imdb_rating", F::Rating),
        ],
    },
    SourceSignature {
        name: "letterboxd",
        diagnostic_columns: &["imdb_code", "imdb_id"],
        dictionary: &[
            ("id", F::MovieId),
            ("name", F::Title),
            ("year", F::ReleaseYear),
            ("genre", F::Genres),
            ("rating", F::Rating),
            ("rating_count", F::VoteCount),
            ("description", F::Overview),
        ],
    },
    SourceSignature {
        name: "kaggle",
        diagnostic_columns: &["film_name", "movie_name", "name"],
        dictionary: &[
            ("movie_id", F::MovieId),
            ("film_name", F::Title),
            ("movie_name", F::Title),
            ("name", F::Title),
            ("genre", F::Genres),
            ("release_year", F::ReleaseYear),
            ("year", F::ReleaseYear),
            ("rating", F::Rating),
            ("votes", F::VoteCount),
            ("runtime", F::Runtime),
        ],
    },
];

pub static BUILTIN_PATTERNS: &[FuzzyPattern] = &[
    FuzzyPattern {
        field: F::MovieId,
        variants: &["id", "movie_id", "tconst", "imdb_id", "film_id"],
    },
    FuzzyPattern {
        field: F::Title,
        variants: &[
            "title",
            "name",
            "film_name",
            "movie_name",
            "primary_title",
            "original_title",
        ],
    },
    FuzzyPattern {
        field: F::Genres,
        variants: &["genre", "genres", "genre_list", "category"],
    },
    FuzzyPattern {
        field: F::ReleaseYear,
        variants: &[
            "year",
            "release_year",
            "release_date",
            "start_year",
            "release_date_published",
        ],
    },
    FuzzyPattern {
        field: F::Runtime,
        variants: &["runtime", "duration", "length", "running_time"],
    },
    FuzzyPattern {
        field: F::Rating,
        variants: &[
            "rating",
            "score",
            "imdb_rating",
            "average_rating",
            "audience_score",
            "vote_average",
        ],
    },
    FuzzyPattern {
        field: F::VoteCount,
        variants: &[
            "votes",
            "vote_count",
            "num_votes",
            "number_of_votes",
            "rating_count",
            "count",
        ],
    },
    FuzzyPattern {
        field: F::Popularity,
        variants: &["popularity", "popular", "score"],
    },
    FuzzyPattern {
        field: F::Overview,
        variants: &["overview", "description", "synopsis", "summary", "plot"],
    },
];

/// Read-only view over a source table and a pattern table.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    sources: &'static [SourceSignature],
    patterns: &'static [FuzzyPattern],
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub const fn new(
        sources: &'static [SourceSignature],
        patterns: &'static [FuzzyPattern],
    ) -> Self {
        Self { sources, patterns }
    }

    pub const fn builtin() -> Self {
        Self::new(BUILTIN_SOURCES, BUILTIN_PATTERNS)
    }

    pub fn sources(&self) -> &'static [SourceSignature] {
        self.sources
    }

    pub fn patterns(&self) -> &'static [FuzzyPattern] {
        self.patterns
    }

    pub fn source(&self, name: &str) -> Option<&'static SourceSignature> {
        let wanted = name.trim();
        self.sources
            .iter()
            .find(|source| source.name.eq_ignore_ascii_case(wanted))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name).collect()
    }
}
