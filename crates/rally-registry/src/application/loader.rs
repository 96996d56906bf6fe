//! Loads the registry from YAML.
//!
//! A malformed or invalid definition excludes only itself; the rest of the
//! file still loads. Only an unreadable or unparsable file fails as a whole.

use std::fmt::Write as _;
use std::path::Path;

use rally_core::error::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::registry::EventRegistry;
use crate::domain::definition::EventDefinition;

/// A definition that was excluded at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    /// The registry key of the excluded definition.
    pub event_id: String,
    /// Why it was excluded.
    pub reason: String,
}

/// Outcome of a load: the usable registry plus every exclusion.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Definitions that passed validation.
    pub registry: EventRegistry,
    /// Definitions that did not.
    pub issues: Vec<ConfigIssue>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    events: serde_yaml::Mapping,
}

/// Parses a registry document.
///
/// # Errors
///
/// Returns `EngineError::Configuration` if the document is not valid YAML or
/// does not have the expected top-level shape.
pub fn load_from_str(source: &str) -> Result<LoadReport, EngineError> {
    let file: RegistryFile = serde_yaml::from_str(source)
        .map_err(|e| EngineError::Configuration(format!("registry is not valid YAML: {e}")))?;

    let mut definitions = Vec::new();
    let mut issues = Vec::new();

    for (key, value) in file.events {
        let Some(key) = key.as_str().map(str::to_owned) else {
            warn!(?key, "skipping event definition with a non-string key");
            issues.push(ConfigIssue {
                event_id: format!("{key:?}"),
                reason: "event keys must be strings".to_owned(),
            });
            continue;
        };

        match parse_definition(&key, value) {
            Ok(definition) => definitions.push(definition),
            Err(reason) => {
                warn!(event_id = %key, %reason, "excluding invalid event definition");
                issues.push(ConfigIssue {
                    event_id: key,
                    reason,
                });
            }
        }
    }

    let registry = EventRegistry::new(definitions, fingerprint(source));
    info!(
        definitions = registry.len(),
        excluded = issues.len(),
        fingerprint = registry.fingerprint(),
        "event registry loaded"
    );
    Ok(LoadReport { registry, issues })
}

/// Reads and parses a registry file.
///
/// # Errors
///
/// Returns `EngineError::Configuration` if the file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> Result<LoadReport, EngineError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Configuration(format!("cannot read registry {}: {e}", path.display()))
    })?;
    load_from_str(&source)
}

fn parse_definition(key: &str, value: serde_yaml::Value) -> Result<EventDefinition, String> {
    let mut definition: EventDefinition =
        serde_yaml::from_value(value).map_err(|e| format!("malformed definition: {e}"))?;
    if definition.id.is_empty() {
        definition.id = key.to_owned();
    } else if definition.id != key {
        return Err(format!("id {} does not match its key", definition.id));
    }
    definition.validate()?;
    Ok(definition)
}

fn fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
