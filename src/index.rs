//! On-disk cache of discovered contexts, so later runs can skip the walk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kubeconfig::ContextEntry;

const INDEX_FILE: &str = "index.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextIndex {
    pub generated_at: DateTime<Utc>,
    /// Search roots and name patterns the index was built from.
    pub sources: Vec<String>,
    pub entries: Vec<ContextEntry>,
}

impl ContextIndex {
    pub fn new(sources: Vec<String>, entries: Vec<ContextEntry>) -> Self {
        Self {
            generated_at: Utc::now(),
            sources,
            entries,
        }
    }

    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(INDEX_FILE)
    }

    pub fn is_fresh(&self, sources: &[String], max_age: Duration, now: DateTime<Utc>) -> bool {
        if self.sources != sources {
            return false;
        }
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return true;
        };
        now.signed_duration_since(self.generated_at) <= max_age
    }

    /// Returns the stored index when it matches `sources` and is younger
    /// than `max_age`. A missing or unreadable index counts as stale.
    pub fn load_fresh(state_dir: &Path, sources: &[String], max_age: Duration) -> Option<Self> {
        let path = Self::path(state_dir);
        let raw = fs::read_to_string(&path).ok()?;
        let index: Self = match serde_yaml::from_str(&raw) {
            Ok(index) => index,
            Err(error) => {
                debug!("ignoring unreadable index {}: {error}", path.display());
                return None;
            }
        };
        if !index.is_fresh(sources, max_age, Utc::now()) {
            debug!(generated_at = %index.generated_at, "index is stale");
            return None;
        }
        Some(index)
    }

    pub fn save(&self, state_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state directory {}", state_dir.display()))?;
        let path = Self::path(state_dir);
        let rendered = serde_yaml::to_string(self).context("failed to render context index")?;
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write context index {}", path.display()))?;
        Ok(path)
    }
}
