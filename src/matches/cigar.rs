//! CIGAR construction and normalization.
//!
//! Callers add elements one at a time via [`CigarBuilder::add`] and the builder merges
//! consecutive same-type operators, drops leading/trailing deletions, and
//! shifts a deletion to the left of an adjacent insertion so that the two
//! orderings `10M1I10D` and `10M10D1I` always normalize to the latter.
//! Reuses `rust_htslib::bam::record::{Cigar, CigarString}` rather than a
//! parallel enum.

use rust_htslib::bam::record::{Cigar, CigarString};

use crate::errors::GemError;

fn is_clipping(op: &Cigar) -> bool {
    matches!(op, Cigar::SoftClip(_) | Cigar::HardClip(_))
}

fn consumes_read_bases(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) | Cigar::Ins(_) | Cigar::SoftClip(_)
    )
}

fn same_type(a: &Cigar, b: &Cigar) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn combine(a: &Cigar, b: &Cigar) -> Cigar {
    let len = a.len() + b.len();
    match a {
        Cigar::Match(_) => Cigar::Match(len),
        Cigar::Ins(_) => Cigar::Ins(len),
        Cigar::Del(_) => Cigar::Del(len),
        Cigar::RefSkip(_) => Cigar::RefSkip(len),
        Cigar::SoftClip(_) => Cigar::SoftClip(len),
        Cigar::HardClip(_) => Cigar::HardClip(len),
        Cigar::Pad(_) => Cigar::Pad(len),
        Cigar::Equal(_) => Cigar::Equal(len),
        Cigar::Diff(_) => Cigar::Diff(len),
    }
}

#[derive(Debug, Eq, PartialEq)]
enum Section {
    LeftHardClip,
    LeftSoftClip,
    Middle,
    RightSoftClip,
    RightHardClip,
}

/// Builds a [`CigarString`] incrementally, normalizing as it goes.
pub struct CigarBuilder {
    elements: Vec<Cigar>,
    last_operator: Option<Cigar>,
    section: Section,
    remove_deletions_at_ends: bool,
    leading_deletion_bases_removed: u32,
    trailing_deletion_bases_removed: u32,
    trailing_deletion_bases_removed_in_make: u32,
}

impl CigarBuilder {
    pub fn new(remove_deletions_at_ends: bool) -> CigarBuilder {
        CigarBuilder {
            elements: Vec::new(),
            last_operator: None,
            section: Section::LeftHardClip,
            remove_deletions_at_ends,
            leading_deletion_bases_removed: 0,
            trailing_deletion_bases_removed: 0,
            trailing_deletion_bases_removed_in_make: 0,
        }
    }

    fn advance_section(&mut self, op: &Cigar) -> Result<(), GemError> {
        match op {
            Cigar::HardClip(_) => {
                if matches!(
                    self.section,
                    Section::LeftSoftClip | Section::Middle | Section::RightSoftClip
                ) {
                    self.section = Section::RightHardClip;
                }
            }
            Cigar::SoftClip(_) => match self.section {
                Section::RightHardClip => {
                    return Err(GemError::InvalidInput(
                        "cigar element added after right hard clip".to_string(),
                    ))
                }
                Section::LeftHardClip => self.section = Section::LeftSoftClip,
                Section::Middle => self.section = Section::RightSoftClip,
                _ => {}
            },
            _ => match self.section {
                Section::RightSoftClip | Section::RightHardClip => {
                    return Err(GemError::InvalidInput(
                        "cigar element added after right clip".to_string(),
                    ))
                }
                Section::LeftHardClip | Section::LeftSoftClip => self.section = Section::Middle,
                _ => {}
            },
        }
        Ok(())
    }

    pub fn add(&mut self, element: Cigar) -> Result<(), GemError> {
        if element.len() == 0 {
            return Ok(());
        }

        if self.remove_deletions_at_ends
            && matches!(element, Cigar::Del(_))
            && match self.last_operator {
                None => true,
                Some(op) => is_clipping(&op),
            }
        {
            self.leading_deletion_bases_removed += element.len();
            return Ok(());
        }

        self.advance_section(&element)?;

        if let Some(last) = self.last_operator {
            if same_type(&element, &last) {
                let n = self.elements.len() - 1;
                self.elements[n] = combine(&element, &self.elements[n]);
                return Ok(());
            }
        }

        if is_clipping(&element) && self.remove_deletions_at_ends {
            if let Some(last) = self.last_operator {
                if !consumes_read_bases(&last) && !is_clipping(&last) {
                    // last element was a deletion; drop it, this clip replaces it
                    let idx = self.elements.len() - 1;
                    self.trailing_deletion_bases_removed += self.elements[idx].len();
                    self.elements[idx] = element.clone();
                    self.last_operator = Some(element);
                    return Ok(());
                }
            }
        }

        if matches!(element, Cigar::Del(_)) {
            if let Some(Cigar::Ins(_)) = self.last_operator {
                // standardize deletion before insertion: shift the deletion left
                let size = self.elements.len();
                if size > 1 && matches!(self.elements[size - 2], Cigar::Del(_)) {
                    let merged_len = self.elements[size - 2].len() + element.len();
                    self.elements[size - 2] = Cigar::Del(merged_len);
                } else {
                    self.elements.insert(size - 1, element);
                }
                return Ok(());
            }
        }

        self.elements.push(element.clone());
        self.last_operator = Some(element);
        Ok(())
    }

    pub fn add_all(&mut self, elements: impl IntoIterator<Item = Cigar>) -> Result<(), GemError> {
        for element in elements {
            self.add(element)?;
        }
        Ok(())
    }

    pub fn make(&mut self, allow_empty: bool) -> Result<CigarString, GemError> {
        if self.remove_deletions_at_ends {
            if let Some(Cigar::Del(len)) = self.elements.last().copied() {
                self.trailing_deletion_bases_removed_in_make += len;
                self.elements.pop();
            }
        }
        if !allow_empty && self.elements.is_empty() {
            return Err(GemError::InvalidInput(
                "no cigar elements left after trimming leading/trailing deletions".to_string(),
            ));
        }
        Ok(CigarString::from(self.elements.clone()))
    }

    pub fn leading_deletion_bases_removed(&self) -> u32 {
        self.leading_deletion_bases_removed
    }

    /// Bases dropped from a trailing deletion discovered at `add`-time (a
    /// clip immediately following a deletion). Does not include bases
    /// dropped by [`Self::make`] discovering a deletion still trailing at
    /// the very end of the element list; see
    /// [`Self::trailing_deletion_bases_removed_in_make`] for those.
    pub fn trailing_deletion_bases_removed(&self) -> u32 {
        self.trailing_deletion_bases_removed
    }

    /// Bases dropped from a deletion that `make` found dangling at the end
    /// of the element list, kept separate from
    /// [`Self::trailing_deletion_bases_removed`] since it is only known
    /// once the cigar is finalized.
    pub fn trailing_deletion_bases_removed_in_make(&self) -> u32 {
        self.trailing_deletion_bases_removed_in_make
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_consecutive_matches() {
        let mut b = CigarBuilder::new(true);
        b.add(Cigar::Match(10)).unwrap();
        b.add(Cigar::Match(5)).unwrap();
        let cigar = b.make(false).unwrap();
        assert_eq!(cigar.to_string(), "15M");
    }

    #[test]
    fn drops_trailing_deletion() {
        let mut b = CigarBuilder::new(true);
        b.add(Cigar::Match(10)).unwrap();
        b.add(Cigar::Del(3)).unwrap();
        let cigar = b.make(false).unwrap();
        assert_eq!(cigar.to_string(), "10M");
        assert_eq!(b.trailing_deletion_bases_removed, 0);
        assert_eq!(b.trailing_deletion_bases_removed_in_make(), 3);
    }

    #[test]
    fn drops_leading_deletion_after_soft_clip() {
        let mut b = CigarBuilder::new(true);
        b.add(Cigar::SoftClip(5)).unwrap();
        b.add(Cigar::Del(3)).unwrap();
        b.add(Cigar::Match(10)).unwrap();
        let cigar = b.make(false).unwrap();
        assert_eq!(cigar.to_string(), "5S10M");
    }

    #[test]
    fn rejects_clip_structure_violation() {
        let mut b = CigarBuilder::new(true);
        b.add(Cigar::SoftClip(5)).unwrap();
        b.add(Cigar::HardClip(3)).unwrap();
        assert!(b.add(Cigar::Match(10)).is_err());
    }
}
