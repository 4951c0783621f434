use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use glob::Pattern;
use serde::{Deserialize, Deserializer};

use crate::finder::Mode;

const DEFAULT_PATTERNS: [&str; 4] = ["config", "*.yaml", "*.yml", "*.kubeconfig"];

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchConfig {
    pub kubeconfig_paths: Vec<PathBuf>,
    pub kubeconfig_name: Option<String>,
    pub show_preview: Option<bool>,
    pub mode: Option<Mode>,
    pub header: Option<String>,
    pub prompt: Option<String>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub refresh_index_after: Option<Duration>,
    pub state_directory: Option<PathBuf>,
}

impl SwitchConfig {
    /// Loads the explicit file, or the first discovered one, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_path(),
        };
        let Some(path) = path else {
            return Ok((Self::default(), None));
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok((config, Some(path)))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        if self.kubeconfig_paths.is_empty() {
            return vec![expand_home(Path::new("~/.kube"))];
        }
        self.kubeconfig_paths
            .iter()
            .map(|path| expand_home(path))
            .collect()
    }

    pub fn patterns(&self) -> Result<Vec<Pattern>> {
        match &self.kubeconfig_name {
            Some(name) => Ok(vec![
                Pattern::new(name)
                    .with_context(|| format!("invalid kubeconfigName pattern '{name}'"))?,
            ]),
            None => DEFAULT_PATTERNS
                .iter()
                .map(|pattern| Pattern::new(pattern).context("invalid built-in pattern"))
                .collect(),
        }
    }

    pub fn show_preview(&self) -> bool {
        self.show_preview.unwrap_or(true)
    }

    pub fn state_dir(&self) -> PathBuf {
        let dir = self
            .state_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("~/.kube/.switch_state"));
        expand_home(&dir)
    }
}

/// Parses `90s`, `10m`, `2h` or `1d`; a bare number is seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount = amount.parse::<u64>().ok()?;
    let seconds = match unit.trim() {
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'"))),
    }
}

pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBESWITCH_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidate = PathBuf::from("kubeswitch.yaml");
    if cwd_candidate.exists() {
        return Some(cwd_candidate);
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".kube/switch-config.yaml"),
            PathBuf::from(&home).join(".config/kubeswitch/config.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
