//! Kubeconfig discovery, preview text and write-back of the chosen context.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use glob::Pattern;
use kube::config::Kubeconfig;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const REDACTED_KEYS: [&str; 5] = [
    "token",
    "password",
    "client-key-data",
    "client-certificate-data",
    "certificate-authority-data",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub path: PathBuf,
    /// Name shown in the picker; unique across all discovered files.
    #[serde(default)]
    pub label: String,
}

pub fn discover_files(roots: &[PathBuf], patterns: &[Pattern]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            warn!("kubeconfig path {} does not exist", root.display());
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    debug!("skipping unreadable entry: {error}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if patterns.iter().any(|pattern| pattern.matches(&name)) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

pub fn read_contexts(path: &Path) -> Result<Vec<ContextEntry>> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to parse kubeconfig {}", path.display()))?;

    Ok(kubeconfig
        .contexts
        .into_iter()
        .map(|named| {
            let (cluster, namespace) = match named.context {
                Some(context) => (Some(context.cluster), context.namespace),
                None => (None, None),
            };
            ContextEntry {
                label: named.name.clone(),
                name: named.name,
                cluster,
                namespace,
                path: path.to_path_buf(),
            }
        })
        .collect())
}

/// Walks every root and reports each context as soon as its file is parsed.
/// Files that fail to parse are skipped.
pub fn stream_contexts(
    roots: &[PathBuf],
    patterns: &[Pattern],
    mut on_entry: impl FnMut(&ContextEntry),
) -> Vec<ContextEntry> {
    let mut labeler = Labeler::default();
    let mut collected = Vec::new();
    for file in discover_files(roots, patterns) {
        let entries = match read_contexts(&file) {
            Ok(entries) => entries,
            Err(error) => {
                warn!("skipping {}: {error:#}", file.display());
                continue;
            }
        };
        debug!(file = %file.display(), contexts = entries.len(), "kubeconfig parsed");
        for mut entry in entries {
            entry.label = labeler.label(&entry);
            on_entry(&entry);
            collected.push(entry);
        }
    }
    collected
}

#[derive(Debug, Default)]
struct Labeler {
    seen: HashSet<String>,
}

impl Labeler {
    fn label(&mut self, entry: &ContextEntry) -> String {
        let mut label = entry.name.clone();
        if self.seen.contains(&label) {
            let file = entry
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| entry.path.display().to_string());
            label = format!("{} ({file})", entry.name);
        }
        let mut suffix = 2;
        let base = label.clone();
        while self.seen.contains(&label) {
            label = format!("{base} #{suffix}");
            suffix += 1;
        }
        self.seen.insert(label.clone());
        label
    }
}

pub fn preview_text(entry: &ContextEntry) -> String {
    let mut text = format!(
        "context:   {}\ncluster:   {}\nnamespace: {}\nfile:      {}\n\n",
        entry.name,
        entry.cluster.as_deref().unwrap_or("-"),
        entry.namespace.as_deref().unwrap_or("default"),
        entry.path.display(),
    );
    match fs::read_to_string(&entry.path) {
        Ok(raw) => text.push_str(&redact(&raw)),
        Err(error) => text.push_str(&format!("failed to read kubeconfig: {error}")),
    }
    text
}

/// Re-serialises the kubeconfig with credentials blanked out.
pub fn redact(raw: &str) -> String {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(mut document) => {
            redact_value(&mut document);
            serde_yaml::to_string(&document)
                .unwrap_or_else(|error| format!("failed to render kubeconfig: {error}"))
        }
        Err(error) => format!("kubeconfig is not valid YAML: {error}"),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Mapping(mapping) => {
            for (key, nested) in mapping.iter_mut() {
                let sensitive = key
                    .as_str()
                    .is_some_and(|key| REDACTED_KEYS.contains(&key));
                if sensitive {
                    *nested = Value::String("REDACTED".to_string());
                } else {
                    redact_value(nested);
                }
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(redact_value),
        Value::Tagged(tagged) => redact_value(&mut tagged.value),
        _ => {}
    }
}

/// Copies the entry's kubeconfig into `state_dir` with `current-context`
/// pointing at the entry, and returns the copy's path.
pub fn write_selection(entry: &ContextEntry, state_dir: &Path) -> Result<PathBuf> {
    let raw = fs::read_to_string(&entry.path)
        .with_context(|| format!("failed to read kubeconfig {}", entry.path.display()))?;
    let mut document: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse kubeconfig {}", entry.path.display()))?;
    let Value::Mapping(mapping) = &mut document else {
        bail!("kubeconfig {} is not a YAML mapping", entry.path.display());
    };
    set_current_context(mapping, &entry.name);

    fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create state directory {}", state_dir.display()))?;
    let target = state_dir.join(format!("{}.kubeconfig", sanitize(&entry.label)));
    let rendered = serde_yaml::to_string(&document).context("failed to render kubeconfig")?;
    fs::write(&target, rendered)
        .with_context(|| format!("failed to write kubeconfig {}", target.display()))?;
    restrict_permissions(&target)?;
    Ok(target)
}

fn set_current_context(mapping: &mut Mapping, context: &str) {
    mapping.insert(
        Value::String("current-context".to_string()),
        Value::String(context.to_string()),
    );
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
