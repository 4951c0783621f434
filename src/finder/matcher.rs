use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use super::scorer::{self, fold};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Case-sensitive only when the query has an uppercase rune.
    #[default]
    Smart,
    CaseSensitive,
    CaseInsensitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub index: usize,
    pub score: i32,
    /// Rune window to emphasise; `None` for the unfiltered list.
    pub highlight: Option<Range<usize>>,
}

/// Every candidate in source order with a zero score.
pub fn identity(len: usize) -> Vec<Match> {
    (0..len)
        .map(|index| Match {
            index,
            score: 0,
            highlight: None,
        })
        .collect()
}

pub fn find_all(query: &[char], items: &[Vec<char>], mode: Mode) -> Result<Vec<Match>> {
    let never = AtomicBool::new(false);
    Ok(find_all_until(query, items, mode, &never)?.unwrap_or_default())
}

/// Like [`find_all`], but gives up with `None` once `cancelled` is set.
pub fn find_all_until(
    query: &[char],
    items: &[Vec<char>],
    mode: Mode,
    cancelled: &AtomicBool,
) -> Result<Option<Vec<Match>>> {
    if query.is_empty() {
        return Ok(Some(identity(items.len())));
    }

    let case_sensitive = match mode {
        Mode::CaseSensitive => true,
        Mode::CaseInsensitive => false,
        Mode::Smart => query.iter().any(|ch| ch.is_uppercase()),
    };
    let query = if case_sensitive {
        query.to_vec()
    } else {
        query.iter().copied().map(fold).collect::<Vec<_>>()
    };

    let mut matches = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if cancelled.load(Ordering::Relaxed) {
            return Ok(None);
        }
        if !is_subsequence(&query, item, case_sensitive) {
            continue;
        }
        let scored = scorer::score(item, &query)?;
        matches.push(Match {
            index,
            score: scored.score,
            highlight: Some(scored.highlight),
        });
    }

    matches.sort_by(|left, right| {
        right
            .score
            .cmp(&left.score)
            .then_with(|| left.index.cmp(&right.index))
    });
    Ok(Some(matches))
}

fn is_subsequence(query: &[char], item: &[char], case_sensitive: bool) -> bool {
    let mut pending = query.iter().peekable();
    for &ch in item {
        let Some(&&next) = pending.peek() else {
            break;
        };
        let ch = if case_sensitive { ch } else { fold(ch) };
        if ch == next {
            pending.next();
        }
    }
    pending.peek().is_none()
}
