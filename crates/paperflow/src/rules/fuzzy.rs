//! Approximate text matching that tolerates a few character-level typos.
//!
//! This is a single-pass heuristic, not a Levenshtein automaton. It walks the
//! text once, keeping a cursor into the pattern, and tries two cheap
//! recoveries on a mismatch: a character missing from the text (checked
//! first) and an extra character in the text. The recovery order is part of
//! the matching contract; changing it changes which inputs match.

/// Texts shorter than this must match exactly.
const MIN_TYPO_TEXT_CHARS: usize = 5;

/// One typo is allowed per started block of this many pattern characters.
const CHARS_PER_TYPO: usize = 10;

/// Number of typos tolerated when searching `pattern` in `text`.
pub fn allow_typos(pattern: &str, text: &str) -> usize {
    if text.chars().count() < MIN_TYPO_TEXT_CHARS {
        return 0;
    }
    pattern.chars().count().div_ceil(CHARS_PER_TYPO)
}

/// Matches with the typo budget derived from the pattern length.
pub fn match_text_allow_typo(pattern: &str, text: &str, match_prefix: bool, match_is: bool) -> bool {
    let max_typos = allow_typos(pattern, text);
    match_text_by_distance(pattern, text, max_typos, match_prefix, match_is)
}

/// Scans `text` for `pattern` allowing at most `max_typos` typos.
///
/// * `match_prefix`: the match has to start at the first character of `text`.
/// * `match_is`: no text may remain after the match completes.
///
/// The pattern counts as found once the cursor reaches its last position.
pub fn match_text_by_distance(
    pattern: &str,
    text: &str,
    max_typos: usize,
    match_prefix: bool,
    match_is: bool,
) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    if pattern.len() < 2 || text.len() < 2 {
        return false;
    }
    if pattern.len() > text.len() + max_typos {
        return false;
    }

    let last = pattern.len() - 1;
    let mut cursor = 0usize;
    let mut typos = 0usize;

    for (i, &c) in text.iter().enumerate() {
        // A deletion recovery on the second-to-last position can step past `last`.
        if cursor >= last {
            if match_is && i < text.len() - 1 {
                return false;
            }
            return true;
        }

        if cursor > 0 {
            if pattern[cursor] == c {
                cursor += 1;
            } else {
                if pattern[cursor + 1] == c {
                    // text is missing one pattern character
                    cursor += 1;
                } else if i + 1 < text.len() && pattern[cursor] == text[i + 1] {
                    // text has one extra character, not counted
                } else {
                    typos += 1;
                }
                cursor += 1;

                if typos > max_typos {
                    cursor = 0;
                    typos = 0;
                }
            }
        } else if pattern[0] == c {
            cursor = 1;
        }

        if match_prefix && cursor == 0 && i > 0 {
            return false;
        }
    }

    false
}
