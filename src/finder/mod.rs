//! Interactive fuzzy finder.
//!
//! [`find`] and [`find_multi`] take over the terminal, let the user narrow a
//! candidate list by typing, and return the index (or indices) of the chosen
//! candidates. [`Finder`] runs the same loop on any [`Surface`], which is how
//! the in-memory surface drives it in tests.

mod controller;
pub mod input;
pub mod matcher;
pub mod render;
pub mod scorer;
pub mod state;
pub mod surface;

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{FinderError, Result};

pub use matcher::{Match, Mode};
pub use surface::{CrosstermSurface, MemorySurface, Surface};

/// Preview callback: highlighted candidate (if any), pane width and height.
pub type PreviewFn = Arc<dyn Fn(Option<usize>, u16, u16) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct FinderOptions {
    pub mode: Mode,
    pub preview: Option<PreviewFn>,
    pub header: Option<String>,
    pub prompt: String,
    /// Poll the item source for new candidates while the finder runs.
    pub hot_reload: bool,
    pub(crate) multi: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Smart,
            preview: None,
            header: None,
            prompt: "> ".to_string(),
            hot_reload: false,
            multi: false,
        }
    }
}

impl FinderOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_preview<F>(mut self, preview: F) -> Self
    where
        F: Fn(Option<usize>, u16, u16) -> Option<String> + Send + Sync + 'static,
    {
        self.preview = Some(Arc::new(preview));
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_hot_reload(mut self, hot_reload: bool) -> Self {
        self.hot_reload = hot_reload;
        self
    }
}

/// Candidates addressed by index.
pub trait ItemSource: Send + Sync + 'static {
    fn len(&self) -> usize;

    /// Labels of every candidate, taken as one consistent snapshot.
    fn labels(&self) -> Vec<String>;

    /// Whether the source can grow while the finder is open.
    fn is_live(&self) -> bool {
        false
    }
}

impl ItemSource for Vec<String> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn labels(&self) -> Vec<String> {
        self.clone()
    }
}

/// Shared, growable candidate list. Clones refer to the same list.
pub struct LiveItems<T> {
    entries: Arc<RwLock<Vec<T>>>,
    label: Arc<dyn Fn(&T) -> String + Send + Sync>,
}

impl<T> Clone for LiveItems<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            label: self.label.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> LiveItems<T> {
    pub fn new(label: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            label: Arc::new(label),
        }
    }

    pub fn push(&self, entry: T) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = T>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(entries);
    }

    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: Send + Sync + 'static> ItemSource for LiveItems<T> {
    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn labels(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|entry| (self.label)(entry)).collect()
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Finder bound to one terminal surface.
pub struct Finder<S: Surface> {
    surface: S,
}

impl<S: Surface> Finder<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Single selection. Fails with [`FinderError::Abort`] on cancel.
    pub async fn find<I: ItemSource>(&mut self, items: I, options: FinderOptions) -> Result<usize> {
        let picked = self.run(items, options, false).await?;
        picked.into_iter().next().ok_or(FinderError::Abort)
    }

    /// Multiple selection, returned in the order the user picked them.
    pub async fn find_multi<I: ItemSource>(
        &mut self,
        items: I,
        options: FinderOptions,
    ) -> Result<Vec<usize>> {
        self.run(items, options, true).await
    }

    async fn run<I: ItemSource>(
        &mut self,
        items: I,
        mut options: FinderOptions,
        multi: bool,
    ) -> Result<Vec<usize>> {
        if options.hot_reload && !items.is_live() {
            return Err(FinderError::InvalidArgument(
                "hot reload requires a live item source".to_string(),
            ));
        }
        options.multi = multi;
        controller::run(&mut self.surface, Arc::new(items), &options).await
    }
}

pub async fn find<I: ItemSource>(items: I, options: FinderOptions) -> Result<usize> {
    Finder::new(CrosstermSurface::new())
        .find(items, options)
        .await
}

pub async fn find_multi<I: ItemSource>(items: I, options: FinderOptions) -> Result<Vec<usize>> {
    Finder::new(CrosstermSurface::new())
        .find_multi(items, options)
        .await
}
