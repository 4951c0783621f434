//! Local alignment scoring between a candidate and a query.
//!
//! Smith-Waterman with an affine gap penalty (Gotoh). Only the query side is
//! gapped: callers guarantee the query is a subsequence of the candidate.

use std::ops::Range;

use crate::error::{FinderError, Result};

const MATCH_SCORE: i32 = 5;
const MISMATCH_PENALTY: i32 = 1;
const GAP_OPEN: i32 = 5;
const GAP_EXTEND: i32 = 1;
const LEADING_BONUS: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub score: i32,
    pub highlight: Range<usize>,
}

pub fn score(candidate: &[char], query: &[char]) -> Result<Scored> {
    if candidate.len() < query.len() {
        return Err(FinderError::ScorerPrecondition {
            candidate: candidate.len(),
            query: query.len(),
        });
    }
    if query.is_empty() {
        return Ok(Scored {
            score: 0,
            highlight: 0..0,
        });
    }

    let rows = candidate.len() + 1;
    let cols = query.len() + 1;
    let mut h = vec![vec![0i32; cols]; rows];
    let mut d = vec![vec![0i32; cols]; rows];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = -GAP_OPEN - i as i32 * GAP_EXTEND;
    }

    let bonus = leading_bonuses(candidate);

    let mut max_score = 0;
    let (mut max_i, mut max_j) = (0usize, 0usize);
    for i in 1..rows {
        for j in 1..cols {
            let diagonal = if candidate[i - 1] == query[j - 1] {
                h[i - 1][j - 1] + MATCH_SCORE + bonus[i - 1]
            } else {
                h[i - 1][j - 1] - MISMATCH_PENALTY
            };
            h[i][j] = 0.max(d[i - 1][j]).max(diagonal);
            d[i][j] = (h[i - 1][j] - GAP_OPEN).max(d[i - 1][j] - GAP_EXTEND);

            if h[i][j] > max_score {
                max_score = h[i][j];
                max_i = i - 1;
                max_j = j - 1;
            }
        }
    }

    let normalized = (f64::from(max_score) * f64::from(max_score) / candidate.len() as f64).round();
    Ok(Scored {
        score: normalized as i32,
        highlight: highlight_range(candidate, query, max_i, max_j),
    })
}

fn leading_bonuses(candidate: &[char]) -> Vec<i32> {
    let mut bonus = vec![0; candidate.len()];
    for (i, slot) in bonus.iter_mut().enumerate() {
        if i == 0 || is_delimiter(candidate[i - 1]) {
            *slot = LEADING_BONUS;
        }
    }
    bonus
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, '(' | '[' | '{' | '/' | '-' | '_' | '.') || ch.is_whitespace()
}

/// Expands the best-scoring cell into the window that holds the whole query.
fn highlight_range(candidate: &[char], query: &[char], max_i: usize, max_j: usize) -> Range<usize> {
    let mut to = candidate.len();
    if max_j + 1 == query.len() {
        to = max_i + 1;
    } else {
        let mut j = max_j + 1;
        for (i, &ch) in candidate.iter().enumerate().skip(max_i + 1) {
            if eq_fold(ch, query[j]) {
                j += 1;
                if j == query.len() {
                    to = i + 1;
                    break;
                }
            }
        }
    }

    let mut from = 0;
    let mut remaining = max_j + 1;
    for i in (0..=max_i).rev() {
        if eq_fold(candidate[i], query[remaining - 1]) {
            remaining -= 1;
            if remaining == 0 {
                from = i;
                break;
            }
        }
    }

    from..to
}

pub(crate) fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

pub(crate) fn eq_fold(left: char, right: char) -> bool {
    left == right || fold(left) == fold(right)
}

#[cfg(test)]
mod tests {
    use super::{FinderError, Scored, score};

    fn chars(value: &str) -> Vec<char> {
        value.chars().collect()
    }

    #[test]
    fn exact_prefix_match_scores_and_highlights() {
        let scored = score(&chars("apple"), &chars("ap")).expect("score");
        // (5 + 3) + 5 = 13, normalized 169 / 5
        assert_eq!(
            scored,
            Scored {
                score: 34,
                highlight: 0..2
            }
        );
    }

    #[test]
    fn leading_bonus_favours_word_starts() {
        let word_start = score(&chars("foo-bar"), &chars("b")).expect("score");
        let inner = score(&chars("foobbar"), &chars("b")).expect("score");
        assert!(word_start.score > inner.score);
        assert_eq!(word_start.highlight, 4..5);
    }

    #[test]
    fn shorter_candidates_rank_higher() {
        let short = score(&chars("grape"), &chars("ap")).expect("score");
        let long = score(&chars("pineapple"), &chars("ap")).expect("score");
        assert_eq!(short.score, 20);
        assert_eq!(long.score, 11);
    }

    #[test]
    fn highlight_spans_scattered_subsequence() {
        let scored = score(&chars("kube-prod-eu"), &chars("kpe")).expect("score");
        let window = &chars("kube-prod-eu")[scored.highlight.clone()];
        assert_eq!(window.first(), Some(&'k'));
        assert!(scored.highlight.end <= 12);
        assert!(scored.score > 0);
    }

    #[test]
    fn case_difference_does_not_score_but_still_highlights() {
        let scored = score(&chars("Readme"), &chars("r")).expect("score");
        assert_eq!(scored.score, 0);
        assert_eq!(scored.highlight, 0..1);
    }

    #[test]
    fn candidate_shorter_than_query_is_rejected() {
        let error = score(&chars("ab"), &chars("abc")).expect_err("precondition");
        assert!(matches!(
            error,
            FinderError::ScorerPrecondition {
                candidate: 2,
                query: 3
            }
        ));
    }
}
