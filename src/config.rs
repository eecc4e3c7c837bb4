use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{
    data::DEFAULT_MISSING_TOKENS, frame::LoadOptions, io_utils, mapping::ExplicitMapping,
    registry::Registry,
};

pub const DEFAULT_SOURCE: &str = "kaggle";

/// Engine settings that are not part of the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Source used when detection finds no diagnostic columns.
    pub default_source: String,
    /// Cell values read as missing at load time.
    pub missing_tokens: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self, registry: &Registry) -> Result<()> {
        ensure!(
            registry.source(&self.default_source).is_some(),
            "Default source '{}' is not registered (known sources: {})",
            self.default_source,
            registry.source_names().join(", ")
        );
        Ok(())
    }

    pub fn load_options(&self, delimiter: Option<u8>, encoding: &'static Encoding) -> LoadOptions {
        LoadOptions {
            delimiter,
            encoding,
            missing_tokens: self.missing_tokens.clone(),
        }
    }
}

/// Reads a `raw_column: canonical_field` mapping file. `.json` files are read
/// as JSON, anything else as YAML.
pub fn load_explicit_mapping(path: &Path) -> Result<ExplicitMapping> {
    let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
    let reader = BufReader::new(file);
    let mapping = if io_utils::has_extension(path, "json") {
        serde_json::from_reader(reader)
            .with_context(|| format!("Parsing JSON mapping file {path:?}"))?
    } else {
        serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing YAML mapping file {path:?}"))?
    };
    Ok(mapping)
}

/// Parses inline `raw=field` pairs. The raw side may itself contain `=`; the
/// last one separates the target.
pub fn parse_mapping_pairs(pairs: &[String]) -> Result<ExplicitMapping> {
    let mut mapping = ExplicitMapping::new();
    for pair in pairs {
        let (raw, target) = pair
            .rsplit_once('=')
            .ok_or_else(|| anyhow!("Mapping '{pair}' must look like raw_column=canonical_field"))?;
        let (raw, target) = (raw.trim(), target.trim());
        if raw.is_empty() || target.is_empty() {
            bail!("Mapping '{pair}' has an empty side");
        }
        mapping.insert(raw, target);
    }
    Ok(mapping)
}
