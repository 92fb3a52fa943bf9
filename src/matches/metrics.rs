//! Running matches metrics tracked across a search.
//!
//! Updated incrementally as matches are added, then used to classify the
//! best/second-best stratum for MAPQ estimation.

/// Tracks the running minima/maxima needed to classify the primary match
/// and its closest competitor without re-scanning the whole matches set.
#[derive(Debug, Clone, Default)]
pub struct MatchesMetrics {
    pub min1_edit_distance: Option<u64>,
    pub min2_edit_distance: Option<u64>,
    pub max1_swg_score: Option<i32>,
    pub max2_swg_score: Option<i32>,
    pub first_stratum_matches: u64,
    pub subdominant_stratum_matches: u64,
    pub mcs: u64,
}

impl MatchesMetrics {
    pub fn new() -> MatchesMetrics {
        MatchesMetrics::default()
    }

    /// Folds a newly added match's edit distance and SWG score into the
    /// running min1/min2/max1/max2 tracking.
    pub fn update(&mut self, edit_distance: u64, swg_score: i32) {
        match self.min1_edit_distance {
            None => self.min1_edit_distance = Some(edit_distance),
            Some(min1) if edit_distance < min1 => {
                self.min2_edit_distance = Some(min1);
                self.min1_edit_distance = Some(edit_distance);
            }
            Some(min1) => {
                if edit_distance == min1 {
                    self.first_stratum_matches += 1;
                } else {
                    self.subdominant_stratum_matches += 1;
                    self.min2_edit_distance = Some(match self.min2_edit_distance {
                        Some(min2) => min2.min(edit_distance),
                        None => edit_distance,
                    });
                }
            }
        }

        match self.max1_swg_score {
            None => self.max1_swg_score = Some(swg_score),
            Some(max1) if swg_score > max1 => {
                self.max2_swg_score = Some(max1);
                self.max1_swg_score = Some(swg_score);
            }
            Some(_) => {
                self.max2_swg_score = Some(match self.max2_swg_score {
                    Some(max2) => max2.max(swg_score),
                    None => swg_score,
                });
            }
        }
    }

    /// The gap between the best and second-best edit distance, used by the
    /// MAPQ classifier to judge how uniquely the read maps.
    pub fn edit_distance_gap(&self) -> Option<u64> {
        match (self.min1_edit_distance, self.min2_edit_distance) {
            (Some(a), Some(b)) => Some(b.saturating_sub(a)),
            _ => None,
        }
    }

    pub fn set_mcs(&mut self, mcs: u64) {
        self.mcs = mcs;
    }
}
