//! Character-budget history window
//!
//! The window keeps the newest turns whose combined content fits the budget.
//! Trimming only ever removes a contiguous prefix of the oldest turns and never
//! reorders what remains.

use crate::session::Turn;

/// Combined content length of `turns`, in characters
#[must_use]
pub fn total_chars(turns: &[Turn]) -> usize {
    turns.iter().map(Turn::char_len).sum()
}

/// Index of the first turn that survives trimming to `max_chars`
///
/// Scans newest to oldest; the first turn whose inclusion pushes the running
/// total over the budget marks the cut, and everything newer survives.
fn cut_point(turns: &[Turn], max_chars: usize) -> usize {
    let mut total = 0usize;
    for (idx, turn) in turns.iter().enumerate().rev() {
        total = total.saturating_add(turn.char_len());
        if total > max_chars {
            return idx + 1;
        }
    }
    0
}

/// Newest-anchored suffix of `turns` fitting `max_chars`
///
/// Returns an empty history when the newest turn alone exceeds the budget.
#[must_use]
pub fn trim(turns: &[Turn], max_chars: usize) -> Vec<Turn> {
    turns[cut_point(turns, max_chars)..].to_vec()
}

/// Trim `turns` in place, returning how many old turns were dropped
pub fn trim_in_place(turns: &mut Vec<Turn>, max_chars: usize) -> usize {
    let cut = cut_point(turns, max_chars);
    turns.drain(..cut);
    cut
}
