use std::path::PathBuf;

use clap::Parser;
use kubeswitch::config::{SwitchConfig, parse_duration};
use kubeswitch::finder::Mode;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubeswitch",
    version,
    about = "Fuzzy-find a kubeconfig context and switch to it."
)]
pub struct CliArgs {
    /// Context to switch to without opening the finder
    pub context: Option<String>,

    /// Directory or file to search for kubeconfigs (repeatable)
    #[arg(long = "kubeconfig-path", value_name = "PATH")]
    pub kubeconfig_paths: Vec<PathBuf>,

    /// Glob matched against kubeconfig file names
    #[arg(long, value_name = "GLOB")]
    pub kubeconfig_name: Option<String>,

    /// Hide the preview pane
    #[arg(long)]
    pub no_preview: bool,

    /// Case matching for the search query
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Line shown above the candidate list
    #[arg(long)]
    pub header: Option<String>,

    /// Directory for selected kubeconfigs and the context index
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Config file (defaults to the first one found in the usual places)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Reuse the context index if younger than this (e.g. 90s, 10m, 1h)
    #[arg(long, value_name = "DURATION", value_parser = parse_refresh)]
    pub refresh_index_after: Option<std::time::Duration>,

    /// Always walk the kubeconfig paths instead of reading the index
    #[arg(long)]
    pub no_index: bool,

    /// Print every discovered context and exit
    #[arg(long)]
    pub list: bool,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file instead of discarding them
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    /// Flags override whatever the config file set.
    pub fn apply_to(&self, config: &mut SwitchConfig) {
        if !self.kubeconfig_paths.is_empty() {
            config.kubeconfig_paths = self.kubeconfig_paths.clone();
        }
        if let Some(name) = &self.kubeconfig_name {
            config.kubeconfig_name = Some(name.clone());
        }
        if self.no_preview {
            config.show_preview = Some(false);
        }
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(header) = &self.header {
            config.header = Some(header.clone());
        }
        if let Some(dir) = &self.state_dir {
            config.state_directory = Some(dir.clone());
        }
        if let Some(refresh) = self.refresh_index_after {
            config.refresh_index_after = Some(refresh);
        }
        if self.no_index {
            config.refresh_index_after = None;
        }
    }
}

fn parse_refresh(value: &str) -> Result<std::time::Duration, String> {
    parse_duration(value).ok_or_else(|| format!("invalid duration '{value}'"))
}
