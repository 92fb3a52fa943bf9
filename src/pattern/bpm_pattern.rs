use crate::pattern::{symbol_index, ALPHABET};

/// Bits per `u64` word-lane; Myers' bit-parallel algorithm processes this
/// many pattern positions per machine word.
pub const WORD_SIZE: usize = 64;

/// One symbol's Peq bitvector, split into 64-bit word-lanes: bit `i` of
/// `words[i / 64]` is set iff `pattern[i] == symbol`.
#[derive(Debug, Clone)]
pub struct PeqTable {
    pub words: Vec<[u64; ALPHABET.len()]>,
    pub pattern_length: usize,
}

impl PeqTable {
    fn build(pattern: &[u8]) -> PeqTable {
        let num_words = (pattern.len() + WORD_SIZE - 1) / WORD_SIZE.max(1);
        let mut words = vec![[0u64; ALPHABET.len()]; num_words.max(1)];
        for (i, &base) in pattern.iter().enumerate() {
            if let Some(sym) = symbol_index(base) {
                let word = i / WORD_SIZE;
                let bit = i % WORD_SIZE;
                words[word][sym] |= 1u64 << bit;
            }
        }
        PeqTable {
            words,
            pattern_length: pattern.len(),
        }
    }

    /// The Peq bitvector for `symbol` in word-lane `word_idx`.
    pub fn eq_word(&self, symbol: u8, word_idx: usize) -> u64 {
        match symbol_index(symbol) {
            Some(sym) => self.words.get(word_idx).map(|w| w[sym]).unwrap_or(0),
            None => 0,
        }
    }
}

/// A fixed-length sub-pattern with its own Peq table and error budget.
#[derive(Debug, Clone)]
pub struct PatternTile {
    pub tile_offset: usize,
    pub tile_length: usize,
    pub max_error_tile: u32,
    pub peq: PeqTable,
}

/// The compiled BPM pattern for a read: one global Peq table plus a tiling
/// into fixed-length sub-patterns, each with its own Peq table and error
/// budget whose sum is `>= max_error`.
#[derive(Debug, Clone)]
pub struct BpmPattern {
    pub peq: PeqTable,
    pub tiles: Vec<PatternTile>,
    pub tile_length: usize,
}

impl BpmPattern {
    pub fn compile(pattern: &[u8], max_error: u32, tile_length: usize) -> BpmPattern {
        let tile_length = tile_length.max(1);
        let peq = PeqTable::build(pattern);
        let m = pattern.len();
        let num_tiles = (m + tile_length - 1) / tile_length.max(1);
        let mut tiles = Vec::with_capacity(num_tiles.max(1));
        let mut offset = 0;
        let mut budget_assigned = 0u32;
        while offset < m {
            let len = tile_length.min(m - offset);
            let max_error_tile = ((max_error as u64 * len as u64) + (m as u64 - 1)) / (m as u64).max(1);
            let max_error_tile = max_error_tile as u32;
            budget_assigned += max_error_tile;
            tiles.push(PatternTile {
                tile_offset: offset,
                tile_length: len,
                max_error_tile,
                peq: PeqTable::build(&pattern[offset..offset + len]),
            });
            offset += len;
        }
        // Ensure the tile budgets sum to at least max_error: bump the last
        // tile if integer rounding left the sum short.
        if let Some(last) = tiles.last_mut() {
            if budget_assigned < max_error {
                last.max_error_tile += max_error - budget_assigned;
            }
        }
        BpmPattern {
            peq,
            tiles,
            tile_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peq_table_marks_matching_positions() {
        let peq = PeqTable::build(b"ACGT");
        assert_eq!(peq.eq_word(b'A', 0), 0b0001);
        assert_eq!(peq.eq_word(b'C', 0), 0b0010);
        assert_eq!(peq.eq_word(b'G', 0), 0b0100);
        assert_eq!(peq.eq_word(b'T', 0), 0b1000);
    }

    #[test]
    fn tile_budgets_sum_to_at_least_global_budget() {
        let bpm = BpmPattern::compile(b"ACGTACGTACGT", 3, 4);
        assert_eq!(bpm.tiles.len(), 3);
        let total: u32 = bpm.tiles.iter().map(|t| t.max_error_tile).sum();
        assert!(total >= 3);
    }

    #[test]
    fn single_tile_covers_short_patterns() {
        let bpm = BpmPattern::compile(b"ACGT", 1, 64);
        assert_eq!(bpm.tiles.len(), 1);
        assert_eq!(bpm.tiles[0].tile_length, 4);
    }
}
