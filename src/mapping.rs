//! Column mapping: resolving raw column names to canonical fields.
//!
//! A caller-supplied [`ExplicitMapping`] short-circuits inference entirely.
//! Otherwise resolution runs an ordered list of resolver steps, each of which
//! may only fill fields that earlier steps left open:
//!
//! 1. exact match against the selected source's dictionary,
//! 2. fuzzy match against the generic pattern table,
//! 3. best-effort match on normalized names, only when nothing matched yet.
//!
//! Inferred mappings are one-to-one: a raw column feeds at most one field and
//! a field receives at most one raw column. Only column names are consulted,
//! never row values.

use std::{fmt, str::FromStr};

use log::{debug, info, warn};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{MapAccess, Visitor},
};

use crate::{
    data::{fold_name, normalize_column_name},
    registry::{CanonicalField, Registry, SourceSignature},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Explicit,
    Exact,
    Fuzzy,
    BestEffort,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Explicit => "explicit",
            MatchStrategy::Exact => "exact",
            MatchStrategy::Fuzzy => "fuzzy",
            MatchStrategy::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied `raw column -> target field` pairs, kept in insertion
/// order. Re-inserting a raw column replaces its target in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitMapping {
    pairs: Vec<(String, String)>,
}

impl ExplicitMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: impl Into<String>, target: impl Into<String>) {
        let raw = raw.into();
        let target = target.into();
        match self.pairs.iter_mut().find(|(existing, _)| *existing == raw) {
            Some(pair) => pair.1 = target,
            None => self.pairs.push((raw, target)),
        }
    }

    pub fn extend(&mut self, other: ExplicitMapping) {
        for (raw, target) in other.pairs {
            self.insert(raw, target);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(existing, _)| existing == raw)
            .map(|(_, target)| target.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(raw, target)| (raw.as_str(), target.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExplicitMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = ExplicitMapping::new();
        for (raw, target) in iter {
            mapping.insert(raw, target);
        }
        mapping
    }
}

impl<'de> Deserialize<'de> for ExplicitMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = ExplicitMapping;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of raw column names to canonical field names")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = ExplicitMapping::new();
                while let Some((raw, target)) = access.next_entry::<String, String>()? {
                    mapping.insert(raw, target);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedColumn {
    pub raw: String,
    /// Canonical field name for inferred entries; any caller-chosen name for
    /// explicit ones.
    pub target: String,
    pub strategy: MatchStrategy,
}

impl MappedColumn {
    pub fn field(&self) -> Option<CanonicalField> {
        CanonicalField::from_str(&self.target).ok()
    }
}

/// The per-invocation `raw column -> canonical field` assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedMapping {
    entries: Vec<MappedColumn>,
}

impl ResolvedMapping {
    pub fn from_explicit(explicit: &ExplicitMapping) -> Self {
        let entries = explicit
            .iter()
            .map(|(raw, target)| MappedColumn {
                raw: raw.to_string(),
                target: target.to_string(),
                strategy: MatchStrategy::Explicit,
            })
            .collect();
        Self { entries }
    }

    /// Identity mapping over every column that already carries a canonical
    /// name.
    pub fn identity<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut mapping = Self::default();
        for column in columns {
            if let Ok(field) = CanonicalField::from_str(column.as_ref()) {
                mapping.assign(column.as_ref(), field, MatchStrategy::Explicit);
            }
        }
        mapping
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[MappedColumn] {
        &self.entries
    }

    pub fn target_for(&self, raw: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.raw == raw)
            .map(|entry| entry.target.as_str())
    }

    pub fn raw_for(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.target == field.as_str())
            .map(|entry| entry.raw.as_str())
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.raw_for(field).is_some()
    }

    pub fn consumes(&self, raw: &str) -> bool {
        self.target_for(raw).is_some()
    }

    /// Raw columns with no mapping entry, in table order.
    pub fn unmapped<'a, S: AsRef<str>>(&self, columns: &'a [S]) -> Vec<&'a str> {
        columns
            .iter()
            .map(|column| column.as_ref())
            .filter(|column| !self.consumes(column))
            .collect()
    }

    /// Records `raw -> field` unless either side is already taken.
    fn assign(&mut self, raw: &str, field: CanonicalField, strategy: MatchStrategy) -> bool {
        if self.has_field(field) || self.consumes(raw) {
            return false;
        }
        debug!("  {strategy} match: {raw} -> {field}");
        self.entries.push(MappedColumn {
            raw: raw.to_string(),
            target: field.as_str().to_string(),
            strategy,
        });
        true
    }
}

/// Inputs shared by every resolver step.
struct ResolveContext<'a> {
    registry: &'a Registry,
    columns: &'a [String],
    folded: Vec<String>,
    source: Option<&'static SourceSignature>,
}

impl ResolveContext<'_> {
    /// First raw column, in table order, whose folded name equals `wanted`
    /// and which no earlier match consumed.
    fn find_folded(&self, wanted: &str, mapping: &ResolvedMapping) -> Option<&str> {
        let wanted = fold_name(wanted);
        self.columns
            .iter()
            .zip(&self.folded)
            .find(|(raw, folded)| **folded == wanted && !mapping.consumes(raw))
            .map(|(raw, _)| raw.as_str())
    }

    fn find_normalized(&self, wanted: &str, mapping: &ResolvedMapping) -> Option<&str> {
        let wanted = normalize_column_name(wanted);
        self.columns
            .iter()
            .find(|raw| normalize_column_name(raw) == wanted && !mapping.consumes(raw))
            .map(|raw| raw.as_str())
    }
}

type Resolver = fn(&ResolveContext<'_>, &mut ResolvedMapping);

#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Always,
    OnlyWhenEmpty,
}

struct ResolverStep {
    strategy: MatchStrategy,
    gate: Gate,
    apply: Resolver,
}

const INFERENCE_STEPS: &[ResolverStep] = &[
    ResolverStep {
        strategy: MatchStrategy::Exact,
        gate: Gate::Always,
        apply: resolve_exact,
    },
    ResolverStep {
        strategy: MatchStrategy::Fuzzy,
        gate: Gate::Always,
        apply: resolve_fuzzy,
    },
    ResolverStep {
        strategy: MatchStrategy::BestEffort,
        gate: Gate::OnlyWhenEmpty,
        apply: resolve_best_effort,
    },
];

fn resolve_exact(ctx: &ResolveContext<'_>, mapping: &mut ResolvedMapping) {
    let Some(source) = ctx.source else {
        return;
    };
    for (known, field) in source.dictionary {
        if mapping.has_field(*field) {
            continue;
        }
        if let Some(raw) = ctx.find_folded(known, mapping) {
            mapping.assign(raw, *field, MatchStrategy::Exact);
        }
    }
}

fn resolve_fuzzy(ctx: &ResolveContext<'_>, mapping: &mut ResolvedMapping) {
    for pattern in ctx.registry.patterns() {
        if mapping.has_field(pattern.field) {
            continue;
        }
        let hit = pattern
            .variants
            .iter()
            .find_map(|variant| ctx.find_folded(variant, mapping))
            .map(str::to_string);
        if let Some(raw) = hit {
            mapping.assign(&raw, pattern.field, MatchStrategy::Fuzzy);
        }
    }
}

fn resolve_best_effort(ctx: &ResolveContext<'_>, mapping: &mut ResolvedMapping) {
    warn!("No column mappings found; falling back to best-effort matching on normalized names");
    for pattern in ctx.registry.patterns() {
        if mapping.has_field(pattern.field) {
            continue;
        }
        let hit = pattern
            .variants
            .iter()
            .find_map(|variant| ctx.find_normalized(variant, mapping))
            .map(str::to_string);
        if let Some(raw) = hit {
            mapping.assign(&raw, pattern.field, MatchStrategy::BestEffort);
        }
    }
}

/// Resolves `raw_columns` to canonical fields for `source`.
///
/// A non-empty `explicit` mapping is returned verbatim. An unknown `source`
/// simply contributes no exact matches.
pub fn resolve(
    registry: &Registry,
    raw_columns: &[String],
    source: &str,
    explicit: Option<&ExplicitMapping>,
) -> ResolvedMapping {
    if let Some(explicit) = explicit.filter(|mapping| !mapping.is_empty()) {
        info!("Using custom column mapping with {} entr(ies)", explicit.len());
        return ResolvedMapping::from_explicit(explicit);
    }

    let ctx = ResolveContext {
        registry,
        columns: raw_columns,
        folded: raw_columns.iter().map(|c| fold_name(c)).collect(),
        source: registry.source(source),
    };
    if ctx.source.is_none() {
        warn!("Source '{source}' is not registered; skipping exact dictionary matching");
    }

    let mut mapping = ResolvedMapping::default();
    for step in INFERENCE_STEPS {
        if step.gate == Gate::OnlyWhenEmpty && !mapping.is_empty() {
            continue;
        }
        let before = mapping.len();
        (step.apply)(&ctx, &mut mapping);
        debug!(
            "{} step resolved {} field(s)",
            step.strategy,
            mapping.len() - before
        );
    }

    if mapping.is_empty() {
        warn!("No columns could be mapped to the canonical schema");
    } else {
        info!(
            "Resolved {} of {} canonical field(s) for source '{source}'",
            mapping.len(),
            CanonicalField::ALL.len()
        );
    }
    mapping
}
