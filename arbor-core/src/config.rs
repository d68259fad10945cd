//! Reconciler Configuration
//!
//! A small set of switches that change how the children and node differs
//! behave. Every field has a default, so an empty JSON object is a valid
//! configuration.
//!
//! ```rust,ignore
//! let config = ReconcilerConfig::from_json(r#"{ "prune_unclaimed": false }"#)?;
//! let reconciler = Reconciler::with_config(MemoryHost::new(), config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Remove former children that no new description claimed at the end of
    /// each children pass.
    ///
    /// When disabled, such children are only removed if the position
    /// correction step happens to hit them.
    pub prune_unclaimed: bool,

    /// Compare element tags ignoring ASCII case.
    pub case_insensitive_tags: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            prune_unclaimed: true,
            case_insensitive_tags: true,
        }
    }
}

impl ReconcilerConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether a live element tag matches a description tag.
    pub fn tags_match(&self, live: &str, wanted: &str) -> bool {
        if self.case_insensitive_tags {
            live.eq_ignore_ascii_case(wanted)
        } else {
            live == wanted
        }
    }
}
