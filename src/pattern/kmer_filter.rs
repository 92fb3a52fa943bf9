use std::collections::HashMap;

/// An optional, even-cheaper prefilter than the BPM tile scan: a per-tile
/// histogram of k-mer frequencies. Two texts whose k-mer profiles differ by more than `max_error`
/// k-mers cannot have an edit distance within budget, so the histogram can
/// reject a candidate region before the BPM scan ever runs.
#[derive(Debug, Clone)]
pub struct KmerCountingFilter {
    k: usize,
    pattern_counts: HashMap<Vec<u8>, i32>,
}

impl KmerCountingFilter {
    pub fn new(pattern: &[u8], k: usize) -> KmerCountingFilter {
        let mut pattern_counts = HashMap::new();
        if k > 0 && pattern.len() >= k {
            for window in pattern.windows(k) {
                *pattern_counts.entry(window.to_vec()).or_insert(0) += 1;
            }
        }
        KmerCountingFilter { k, pattern_counts }
    }

    /// Counts k-mers present in `pattern` but missing (or under-represented)
    /// in `text`; a count exceeding `max_error` means the region can be
    /// rejected without running the BPM scan.
    pub fn mismatching_kmer_count(&self, text: &[u8]) -> u32 {
        if self.k == 0 || self.pattern_counts.is_empty() {
            return 0;
        }
        let mut text_counts: HashMap<&[u8], i32> = HashMap::new();
        for window in text.windows(self.k) {
            *text_counts.entry(window).or_insert(0) += 1;
        }
        let mut deficit = 0i64;
        for (kmer, &count) in &self.pattern_counts {
            let have = text_counts.get(kmer.as_slice()).copied().unwrap_or(0);
            if have < count {
                deficit += (count - have) as i64;
            }
        }
        deficit.max(0) as u32
    }

    /// `true` if the k-mer deficit alone already exceeds `max_error`; a region
    /// can be discarded without running the BPM filter.
    pub fn reject(&self, text: &[u8], max_error: u32) -> bool {
        self.mismatching_kmer_count(text) > max_error
    }
}
