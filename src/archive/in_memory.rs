use bio::alphabets;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::suffix_array::{suffix_array, RawSuffixArray};

use crate::archive::{Archive, ChromosomeLocation, Strand};
use crate::errors::GemError;

/// A single-process, single-genome archive: builds a suffix array, BWT and
/// occurrence table up front and keeps the whole packed text resident.
///
/// Built with the standard `suffix_array` -> `bwt` -> `less` -> `Occ::new`
/// sequence, extended with a chromosome boundary table so
/// `locate_chromosome` can resolve an absolute position to a
/// `(name, local_pos)` pair.
pub struct InMemoryArchive {
    text: Vec<u8>,
    sa: RawSuffixArray,
    bwt: BWT,
    less: Less,
    occ: Occ,
    chromosomes: Vec<(String, u64, u64)>, // (name, start, end) in `text`
}

impl InMemoryArchive {
    /// Build an archive from a set of named chromosome sequences.
    ///
    /// Concatenates all sequences with `$` sentinels between them, the
    /// layout `bio::data_structures::fmindex::FMDIndex` expects.
    pub fn from_chromosomes(chromosomes: &[(&str, &[u8])]) -> InMemoryArchive {
        let mut text = Vec::new();
        let mut bounds = Vec::with_capacity(chromosomes.len());
        for (name, seq) in chromosomes {
            let start = text.len() as u64;
            text.extend_from_slice(seq);
            let end = text.len() as u64;
            text.push(b'$');
            bounds.push((name.to_string(), start, end));
        }
        text.push(b'$');

        let alphabet = alphabets::dna::n_alphabet();
        let sa = suffix_array(&text);
        let bwt_vec = bwt(&text, &sa);
        let less_vec = less(&bwt_vec, &alphabet);
        let occ = Occ::new(&bwt_vec, 8, &alphabet);

        InMemoryArchive {
            text,
            sa,
            bwt: bwt_vec,
            less: less_vec,
            occ,
            chromosomes: bounds,
        }
    }

    pub fn less(&self, a: u8) -> u64 {
        self.less[a as usize] as u64
    }

    pub fn occ_at(&self, r: u64, a: u8) -> u64 {
        if r == u64::MAX {
            0
        } else {
            self.occ.get(&self.bwt, r as usize, a) as u64
        }
    }

    pub fn bwt_len(&self) -> u64 {
        self.bwt.len() as u64
    }
}

impl Archive for InMemoryArchive {
    fn n(&self) -> u64 {
        self.text.len() as u64
    }

    fn text(&self, begin: u64, end: u64) -> Result<&[u8], GemError> {
        if end > self.text.len() as u64 || begin > end {
            return Err(GemError::ArchiveIo(format!(
                "text range [{}, {}) out of bounds (n={})",
                begin,
                end,
                self.text.len()
            )));
        }
        Ok(&self.text[begin as usize..end as usize])
    }

    fn rank(&self, c: u8, i: u64) -> u64 {
        self.occ_at(i, c)
    }

    fn sa(&self, i: u64) -> Result<u64, GemError> {
        self.sa
            .get(i as usize)
            .copied()
            .map(|p| p as u64)
            .ok_or_else(|| GemError::ArchiveIo(format!("suffix array index {} out of range", i)))
    }

    fn locate_chromosome(&self, text_pos: u64) -> Result<ChromosomeLocation, GemError> {
        for (name, start, end) in &self.chromosomes {
            if text_pos >= *start && text_pos < *end {
                return Ok(ChromosomeLocation {
                    name: name.clone(),
                    local_pos: text_pos - start,
                    strand: Strand::Forward,
                });
            }
        }
        Err(GemError::ArchiveIo(format!(
            "position {} does not fall within any indexed chromosome",
            text_pos
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_chromosome_local_position() {
        let archive = InMemoryArchive::from_chromosomes(&[
            ("chr1", b"ACGTACGT"),
            ("chr2", b"TTTTGGGG"),
        ]);
        let loc = archive.locate_chromosome(2).unwrap();
        assert_eq!(loc.name, "chr1");
        assert_eq!(loc.local_pos, 2);

        let loc2 = archive.locate_chromosome(10).unwrap();
        assert_eq!(loc2.name, "chr2");
    }

    #[test]
    fn text_range_out_of_bounds_is_archive_io() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"ACGT")]);
        let err = archive.text(0, 1000).unwrap_err();
        assert!(matches!(err, GemError::ArchiveIo(_)));
    }
}
