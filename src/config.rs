//! Deep-copy configuration

use crate::ir::AllocTracker;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one deep-copy call (or one [`crate::CopySession`])
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Maximum nodes the destination arena may hold (default: unlimited)
    pub node_limit: Option<usize>,
    /// Maximum expression nesting before the source is treated as cyclic (default: 512)
    pub max_depth: usize,
    /// Reject temps not bound in the enclosing type environment (default: true)
    pub check_temps: bool,
    /// Copy each shared callee/reg array/type env once per call (default: true)
    pub dedup_shared: bool,
    /// Allocation accounting attached to every arena this config creates
    #[serde(skip)]
    pub tracker: Option<AllocTracker>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            node_limit: None,
            max_depth: 512,
            check_temps: true,
            dedup_shared: true,
            tracker: None,
        }
    }
}

impl CopyConfig {
    /// Caps the destination arena at `limit` nodes
    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = Some(limit);
        self
    }

    /// Sets the maximum expression nesting
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enables or disables temp binding checks
    pub fn with_temp_checks(mut self, enabled: bool) -> Self {
        self.check_temps = enabled;
        self
    }

    /// Enables or disables deduplication of shared substructures
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup_shared = enabled;
        self
    }

    /// Attaches allocation accounting
    pub fn with_tracker(mut self, tracker: AllocTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Parses a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Loads a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading copy config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing copy config {}", path.display()))
    }
}
