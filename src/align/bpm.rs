//! BPM filter/verifier.
//!
//! Myers' bit-parallel edit-distance scan: one `u64` word-lane per up-to-64
//! pattern positions, maintaining `Pv`/`Mv` horizontal-delta bitvectors and a
//! scalar running score, updated one text column at a time via the
//! Hughes-Myers recurrence, specialized to a single word-lane scan since
//! tiles are sized to `<= 64` bases per tile.

use crate::errors::GemError;
use crate::pattern::{BpmPattern, PeqTable};
use crate::search::watchdog::CancelToken;

/// Outcome of verifying one candidate region against the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Accepted { best_score: u32, best_column: usize },
    Rejected,
}

/// Runs the single-tile Myers scan of `peq` (of `pattern_length <= 64`)
/// across `text`, returning the minimum score and the column at which it
/// occurs, or `None` if every column's score exceeds `max_error`.
fn scan_word(peq: &PeqTable, pattern_length: usize, text: &[u8], max_error: u32) -> Option<(u32, usize)> {
    if pattern_length == 0 || pattern_length > 64 {
        return None;
    }
    let top_bit = 1u64 << (pattern_length - 1);
    let mut pv: u64 = !0u64;
    let mut mv: u64 = 0u64;
    let mut score: i64 = pattern_length as i64;

    let mut best_score = u32::MAX;
    let mut best_column = 0usize;

    for (col, &c) in text.iter().enumerate() {
        let eq = peq.eq_word(c, 0);
        let xv = eq | mv;
        let xh = (((eq & pv).wrapping_add(pv)) ^ pv) | eq;
        let mut ph = mv | !(xh | pv);
        let mut mh = pv & xh;

        if ph & top_bit != 0 {
            score += 1;
        } else if mh & top_bit != 0 {
            score -= 1;
        }

        ph <<= 1;
        ph |= 1;
        mh <<= 1;

        pv = mh | !(xv | ph);
        mv = ph & xv;

        let column_score = score.max(0) as u32;
        if column_score < best_score {
            best_score = column_score;
            best_column = col;
        }
    }

    if best_score <= max_error {
        Some((best_score, best_column))
    } else {
        None
    }
}

/// A single-shot, non-tiled scan over the whole pattern, used for short
/// patterns or when a coarse accept/reject is all that's needed.
pub fn verify(peq: &PeqTable, text: &[u8], max_error: u32) -> VerificationOutcome {
    match scan_word(peq, peq.pattern_length, text, max_error) {
        Some((best_score, best_column)) => VerificationOutcome::Accepted {
            best_score,
            best_column,
        },
        None => VerificationOutcome::Rejected,
    }
}

/// Tiled variant: scans one tile at a time against the matching slice of
/// `text`, short-circuiting to [`VerificationOutcome::Rejected`] the moment
/// a tile's score exceeds its own `max_error_tile` bound, without scanning
/// later tiles.
///
/// `cancel` is checked once per tile: since a tile is by construction
/// `<= 64` bases (one word-lane), this is the natural "every 2^k-th BPM
/// column" checkpoint for a tiled scan. On cancellation the scan stops
/// immediately with [`GemError::Timeout`] rather than finishing the
/// remaining tiles.
pub fn verify_tiled(
    bpm: &BpmPattern,
    text: &[u8],
    cancel: &CancelToken,
) -> Result<VerificationOutcome, GemError> {
    let mut total_score = 0u32;
    let mut best_column = 0usize;

    for tile in &bpm.tiles {
        if cancel.is_cancelled() {
            return Err(GemError::Timeout);
        }
        let tile_text_start = tile.tile_offset.min(text.len());
        let tile_text_end = (tile.tile_offset + tile.tile_length + tile.max_error_tile as usize)
            .min(text.len());
        if tile_text_start >= tile_text_end {
            return Ok(VerificationOutcome::Rejected);
        }
        let slice = &text[tile_text_start..tile_text_end];
        match scan_word(&tile.peq, tile.tile_length, slice, tile.max_error_tile) {
            Some((score, column)) => {
                total_score += score;
                best_column = tile_text_start + column;
            }
            None => return Ok(VerificationOutcome::Rejected),
        }
    }

    Ok(VerificationOutcome::Accepted {
        best_score: total_score,
        best_column,
    })
}
