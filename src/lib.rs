//! Fuzzy finder for picking a kubeconfig context.

pub mod config;
pub mod error;
pub mod finder;
pub mod index;
pub mod kubeconfig;

pub use error::{FinderError, Result};
pub use finder::{FinderOptions, find, find_multi};
