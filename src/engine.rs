//! Entry point tying the registry and configuration to the detect, resolve,
//! normalize and report operations.
//!
//! An [`Engine`] holds no mutable state. Any number of threads may share one
//! as long as each call owns its own [`RawTable`].

use std::path::Path;

use anyhow::{Result, bail};
use encoding_rs::UTF_8;
use log::info;

use crate::{
    config::EngineConfig,
    detect::{self, Detection},
    error::LoadError,
    frame::{LoadOptions, RawTable},
    mapping::{self, ExplicitMapping, ResolvedMapping},
    normalize::{self, CanonicalTable, NormalizeSummary},
    registry::Registry,
    report::{self, MappingReport},
};

#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: Registry,
    config: EngineConfig,
}

/// Everything one normalization pass produced.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub source: String,
    /// Present only when the source was detected rather than supplied.
    pub detection: Option<Detection>,
    pub mapping: ResolvedMapping,
    pub table: CanonicalTable,
    pub summary: NormalizeSummary,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(Registry::builtin(), config)
    }

    pub fn with_registry(registry: Registry, config: EngineConfig) -> Result<Self> {
        config.validate(&registry)?;
        Ok(Self { registry, config })
    }

    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rejects source names the registry does not know.
    pub fn ensure_known_source(&self, name: &str) -> Result<()> {
        if self.registry.source(name).is_none() {
            bail!(
                "Unknown source '{name}' (known sources: {})",
                self.registry.source_names().join(", ")
            );
        }
        Ok(())
    }

    pub fn detect(&self, raw: &RawTable) -> Detection {
        detect::detect(&self.registry, raw.columns(), &self.config.default_source)
    }

    pub fn resolve(
        &self,
        raw: &RawTable,
        source: &str,
        explicit: Option<&ExplicitMapping>,
    ) -> ResolvedMapping {
        mapping::resolve(&self.registry, raw.columns(), source, explicit)
    }

    pub fn normalize(&self, raw: &RawTable, mapping: &ResolvedMapping) -> CanonicalTable {
        normalize::normalize(raw, mapping)
    }

    /// Detects (unless `source` is given), resolves and normalizes `raw`.
    pub fn run(
        &self,
        raw: &RawTable,
        source: Option<&str>,
        explicit: Option<&ExplicitMapping>,
    ) -> Normalized {
        let (source, detection) = match source {
            Some(name) => (name.to_string(), None),
            None => {
                let detection = self.detect(raw);
                if detection.fallback {
                    info!(
                        "No source signature matched; using default source '{}'",
                        detection.source
                    );
                } else {
                    info!("Detected source: {}", detection.source);
                }
                (detection.source.clone(), Some(detection))
            }
        };
        let mapping = self.resolve(raw, &source, explicit);
        let (table, summary) = normalize::normalize_with_summary(raw, &mapping);
        Normalized {
            source,
            detection,
            mapping,
            table,
            summary,
        }
    }

    /// Loads `path` and runs it through [`Engine::run`]. Only load failures
    /// are errors.
    pub fn load_and_map(
        &self,
        path: &Path,
        options: &LoadOptions,
        source: Option<&str>,
        explicit: Option<&ExplicitMapping>,
    ) -> Result<Normalized, LoadError> {
        let raw = RawTable::load(path, options)?;
        Ok(self.run(&raw, source, explicit))
    }

    pub fn report(
        &self,
        raw: &RawTable,
        source: Option<&str>,
        explicit: Option<&ExplicitMapping>,
    ) -> MappingReport {
        report::build_report(
            &self.registry,
            raw,
            source,
            &self.config.default_source,
            explicit,
        )
    }

    /// Load options carrying the configured missing-value tokens.
    pub fn load_options(&self) -> LoadOptions {
        self.config.load_options(None, UTF_8)
    }
}
