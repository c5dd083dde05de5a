//! Block-aligned fuzzy string scores on a 0 to 100 scale.
//!
//! Matching blocks are found the way a longest-common-substring diff does
//! it: take the longest run shared by both strings, then recurse on the
//! pieces to its left and right. A string of length `n >= 200` treats
//! characters occurring more than `n / 100 + 1` times as too common to
//! start a match.

use std::collections::HashMap;

/// A run `a[a_start..a_start + len] == b[b_start..b_start + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

struct Aligner<'s> {
    a: &'s [char],
    b: &'s [char],
    b_index: HashMap<char, Vec<usize>>,
}

impl<'s> Aligner<'s> {
    fn new(a: &'s [char], b: &'s [char]) -> Self {
        let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b_index.entry(*c).or_default().push(j);
        }
        if b.len() >= 200 {
            let limit = b.len() / 100 + 1;
            b_index.retain(|_, positions| positions.len() <= limit);
        }
        Aligner { a, b, b_index }
    }

    /// Longest run inside `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
    /// and then in `b` on equal length.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
        let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
        let mut run_at: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_run: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let len = j
                        .checked_sub(1)
                        .and_then(|prev| run_at.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run.insert(j, len);
                    if len > best_len {
                        best_i = i + 1 - len;
                        best_j = j + 1 - len;
                        best_len = len;
                    }
                }
            }
            run_at = next_run;
        }

        // Common characters are not indexed; grow the run over them.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_len += 1;
        }
        while best_i + best_len < ahi
            && best_j + best_len < bhi
            && self.a[best_i + best_len] == self.b[best_j + best_len]
        {
            best_len += 1;
        }

        Block {
            a_start: best_i,
            b_start: best_j,
            len: best_len,
        }
    }

    fn matching_blocks(&self) -> Vec<Block> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut pending = vec![(0, la, 0, lb)];
        let mut found = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let block = self.longest_match(alo, ahi, blo, bhi);
            if block.len == 0 {
                continue;
            }
            if alo < block.a_start && blo < block.b_start {
                pending.push((alo, block.a_start, blo, block.b_start));
            }
            let (a_end, b_end) = (block.a_start + block.len, block.b_start + block.len);
            if a_end < ahi && b_end < bhi {
                pending.push((a_end, ahi, b_end, bhi));
            }
            found.push(block);
        }
        found.sort();

        let mut merged: Vec<Block> = Vec::with_capacity(found.len() + 1);
        for block in found {
            if let Some(last) = merged.last_mut() {
                if last.a_start + last.len == block.a_start
                    && last.b_start + last.len == block.b_start
                {
                    last.len += block.len;
                    continue;
                }
            }
            merged.push(block);
        }
        merged.push(Block {
            a_start: la,
            b_start: lb,
            len: 0,
        });
        merged
    }
}

/// Matching blocks of `a` against `b`, ordered, ending with the empty
/// sentinel block `(a.len(), b.len(), 0)`.
pub fn matching_blocks(a: &[char], b: &[char]) -> Vec<Block> {
    Aligner::new(a, b).matching_blocks()
}

/// `2 * M / T`, where `M` counts matched characters and `T` is the total
/// length of both inputs. Two empty inputs are identical.
pub fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = matching_blocks(a, b).iter().map(|block| block.len).sum();
    2.0 * matched as f64 / total as f64
}

/// Similarity of the shorter string to its best-aligned piece of the longer
/// one, from 0 to 100.
///
/// Each matching block anchors a window of the longer string as wide as the
/// shorter string; a window running past the end is cut short. Identical
/// strings score 100, and otherwise an empty input scores 0.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return 0;
    }
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    let mut best = 0.0f64;
    for block in matching_blocks(shorter, longer) {
        let start = block.b_start.saturating_sub(block.a_start);
        let end = (start + shorter.len()).min(longer.len());
        let score = similarity(shorter, &longer[start..end]);
        if score > 0.995 {
            return 100;
        }
        best = best.max(score);
    }
    (best * 100.0).round_ties_even() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn blocks_split_around_longest_run() {
        let blocks = matching_blocks(&chars("hello"), &chars("say helo"));
        assert_eq!(
            blocks,
            vec![
                Block { a_start: 0, b_start: 4, len: 3 },
                Block { a_start: 4, b_start: 7, len: 1 },
                Block { a_start: 5, b_start: 8, len: 0 },
            ]
        );
    }

    #[test]
    fn identical_inputs_form_one_block() {
        let blocks = matching_blocks(&chars("abcd"), &chars("abcd"));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Block { a_start: 0, b_start: 0, len: 4 });
    }

    #[test]
    fn similarity_counts_matched_characters() {
        assert_eq!(similarity(&chars("hello"), &chars("helo")), 8.0 / 9.0);
        assert_eq!(similarity(&chars("abc"), &chars("xyz")), 0.0);
        assert_eq!(similarity(&[], &[]), 1.0);
    }

    #[test]
    fn substrings_score_fully() {
        assert_eq!(partial_ratio("hi", "hi there"), 100);
        assert_eq!(partial_ratio("hi there", "hi"), 100);
        assert_eq!(partial_ratio("hello", "hello"), 100);
        assert_eq!(partial_ratio("привет", "привет, бот"), 100);
    }

    #[test]
    fn window_at_the_end_is_cut_short() {
        // "hel" anchors at offset 4, leaving only "helo" to compare
        assert_eq!(partial_ratio("say helo", "hello"), 89);
        assert_eq!(partial_ratio("hello", "say helo"), 89);
    }

    #[test]
    fn misspelled_word_inside_a_phrase() {
        assert_eq!(partial_ratio("what is migrane", "migraine"), 93);
    }

    #[test]
    fn empty_and_disjoint_inputs() {
        assert_eq!(partial_ratio("", "anything"), 0);
        assert_eq!(partial_ratio("", ""), 100);
        assert_eq!(partial_ratio("abc", "xyz"), 0);
        assert_eq!(partial_ratio("xyz", "weather forecast"), 0);
    }

    #[test]
    fn common_characters_in_long_strings_still_extend_matches() {
        let long: String = "a".repeat(250) + "b";
        let blocks = matching_blocks(&chars("ab"), &chars(&long));
        assert_eq!(blocks[0], Block { a_start: 0, b_start: 249, len: 2 });
    }
}
