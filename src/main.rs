mod cli;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Mutex, PoisonError};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use glob::Pattern;
use kubeswitch::FinderError;
use kubeswitch::config::SwitchConfig;
use kubeswitch::finder::{self, FinderOptions, LiveItems};
use kubeswitch::index::ContextIndex;
use kubeswitch::kubeconfig::{ContextEntry, preview_text, stream_contexts, write_selection};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let (mut config, source) = SwitchConfig::load(args.config.as_deref())?;
    if let Some(source) = &source {
        debug!("loaded config from {}", source.display());
    }
    args.apply_to(&mut config);

    let discovery = Discovery::new(&config)?;

    if args.list {
        for entry in discovery.load_all(&config) {
            println!("{}", entry.label);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(context) = &args.context {
        let entries = discovery.load_all(&config);
        let entry = entries
            .iter()
            .find(|entry| &entry.label == context)
            .or_else(|| entries.iter().find(|entry| &entry.name == context))
            .with_context(|| format!("context '{context}' was not found"))?;
        emit(entry, &discovery.state_dir)?;
        return Ok(ExitCode::SUCCESS);
    }

    let items = LiveItems::new(|entry: &ContextEntry| entry.label.clone());
    let cached = config.refresh_index_after.and_then(|max_age| {
        ContextIndex::load_fresh(&discovery.state_dir, &discovery.sources, max_age)
    });
    let hot_reload = match cached {
        Some(index) => {
            debug!(contexts = index.entries.len(), "using cached context index");
            items.extend(index.entries);
            false
        }
        None => {
            discovery.spawn(items.clone(), config.refresh_index_after.is_some())?;
            true
        }
    };

    let options = finder_options(&config, &items).with_hot_reload(hot_reload);
    match finder::find(items.clone(), options).await {
        Ok(index) => {
            let entry = items
                .get(index)
                .context("selected context is no longer available")?;
            emit(&entry, &discovery.state_dir)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(FinderError::Abort) => {
            debug!("selection aborted");
            Ok(ExitCode::from(1))
        }
        Err(error) => Err(error).context("context finder failed"),
    }
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact();

    let _ = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::sink).try_init(),
    };

    Ok(())
}

/// Where to look for kubeconfigs and where to keep state.
struct Discovery {
    roots: Vec<PathBuf>,
    patterns: Vec<Pattern>,
    state_dir: PathBuf,
    sources: Vec<String>,
}

impl Discovery {
    fn new(config: &SwitchConfig) -> Result<Self> {
        let roots = config.search_paths();
        let patterns = config.patterns()?;
        let sources = roots
            .iter()
            .map(|root| root.display().to_string())
            .chain(patterns.iter().map(|pattern| pattern.as_str().to_string()))
            .collect();
        Ok(Self {
            roots,
            patterns,
            state_dir: config.state_dir(),
            sources,
        })
    }

    /// Blocking variant for the non-interactive paths.
    fn load_all(&self, config: &SwitchConfig) -> Vec<ContextEntry> {
        if let Some(max_age) = config.refresh_index_after
            && let Some(index) = ContextIndex::load_fresh(&self.state_dir, &self.sources, max_age)
        {
            return index.entries;
        }
        let entries = stream_contexts(&self.roots, &self.patterns, |_| {});
        if config.refresh_index_after.is_some() {
            save_index(&self.state_dir, self.sources.clone(), entries.clone());
        }
        entries
    }

    /// Walks on a plain thread so the finder can open before discovery ends.
    fn spawn(&self, items: LiveItems<ContextEntry>, save: bool) -> Result<()> {
        let roots = self.roots.clone();
        let patterns = self.patterns.clone();
        let state_dir = self.state_dir.clone();
        let sources = self.sources.clone();
        thread::Builder::new()
            .name("kubeconfig-discovery".to_string())
            .spawn(move || {
                let entries = stream_contexts(&roots, &patterns, |entry| items.push(entry.clone()));
                info!(contexts = entries.len(), "kubeconfig discovery finished");
                if save {
                    save_index(&state_dir, sources, entries);
                }
            })
            .context("failed to start kubeconfig discovery")?;
        Ok(())
    }
}

fn save_index(state_dir: &Path, sources: Vec<String>, entries: Vec<ContextEntry>) {
    match ContextIndex::new(sources, entries).save(state_dir) {
        Ok(path) => debug!("context index written to {}", path.display()),
        Err(error) => warn!("failed to save context index: {error:#}"),
    }
}

fn finder_options(config: &SwitchConfig, items: &LiveItems<ContextEntry>) -> FinderOptions {
    let mut options = FinderOptions::default().with_mode(config.mode.unwrap_or_default());
    if let Some(header) = &config.header {
        options = options.with_header(header.clone());
    }
    if let Some(prompt) = &config.prompt {
        options = options.with_prompt(prompt.clone());
    }
    if config.show_preview() {
        let items = items.clone();
        let cache = Mutex::new(HashMap::<usize, String>::new());
        options = options.with_preview(move |index, _width, _height| {
            let index = index?;
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(text) = cache.get(&index) {
                return Some(text.clone());
            }
            let text = preview_text(&items.get(index)?);
            cache.insert(index, text.clone());
            Some(text)
        });
    }
    options
}

/// Writes the selected kubeconfig and reports it to the shell wrapper.
fn emit(entry: &ContextEntry, state_dir: &Path) -> Result<()> {
    let path = write_selection(entry, state_dir)?;
    info!(context = %entry.name, "switched to {}", path.display());
    println!("__ {},{}", path.display(), entry.name);
    Ok(())
}
