use std::collections::HashSet;

use crate::paired::Orientation;

/// Error budget expressed either as a fraction of the read length or an
/// absolute integer number of edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorBudget {
    Fraction(f32),
    Absolute(u32),
}

impl ErrorBudget {
    pub fn resolve(&self, pattern_length: usize) -> u32 {
        match self {
            ErrorBudget::Fraction(f) => (pattern_length as f32 * f).ceil() as u32,
            ErrorBudget::Absolute(e) => *e,
        }
    }
}

/// The configuration contract the archive/CLI collaborator hands to the
/// search core.
///
/// Constructed programmatically for library use, or via [`SearchConfiguration::from_args`]
/// the way `GenotypingEngine::make` and `FilterParameters::generate_from_clap` build their
/// configuration from a `clap::ArgMatches`.
#[derive(Debug, Clone)]
pub struct SearchConfiguration {
    pub max_error: ErrorBudget,
    pub max_reported: usize,
    pub min_mapq: u8,
    pub pair_min: u64,
    pub pair_max: u64,
    pub pair_orientations: HashSet<Orientation>,
    pub gpu_enabled: bool,
    pub threads: usize,
    /// SA interval size above which a seed's hits are too many to decode
    /// cheaply.
    pub max_candidates_per_seed: u64,
    /// Region-profile size above which adaptive profiling is abandoned in
    /// favor of fixed partitioning.
    pub max_region_budget: usize,
}

impl SearchConfiguration {
    pub fn max_candidates_per_seed(&self) -> u64 {
        self.max_candidates_per_seed
    }

    pub fn max_region_budget(&self) -> usize {
        self.max_region_budget
    }

    pub fn from_args(args: &clap::ArgMatches) -> SearchConfiguration {
        let max_error = match args.get_one::<f32>("max-error-fraction") {
            Some(f) => ErrorBudget::Fraction(*f),
            None => ErrorBudget::Absolute(
                args.get_one::<u32>("max-error")
                    .copied()
                    .unwrap_or(4),
            ),
        };
        let mut pair_orientations = HashSet::new();
        if let Some(values) = args.get_many::<String>("pair-orientations") {
            for v in values {
                if let Some(o) = Orientation::parse(v) {
                    pair_orientations.insert(o);
                }
            }
        }
        if pair_orientations.is_empty() {
            pair_orientations.insert(Orientation::ForwardReverse);
        }
        SearchConfiguration {
            max_error,
            max_reported: args
                .get_one::<usize>("max-reported")
                .copied()
                .unwrap_or(10),
            min_mapq: args.get_one::<u8>("min-mapq").copied().unwrap_or(0),
            pair_min: args.get_one::<u64>("pair-min").copied().unwrap_or(0),
            pair_max: args.get_one::<u64>("pair-max").copied().unwrap_or(1000),
            pair_orientations,
            gpu_enabled: args.get_flag("gpu-enabled"),
            threads: args.get_one::<usize>("threads").copied().unwrap_or(1),
            max_candidates_per_seed: args
                .get_one::<u64>("max-candidates-per-seed")
                .copied()
                .unwrap_or(20),
            max_region_budget: args
                .get_one::<usize>("max-region-budget")
                .copied()
                .unwrap_or(64),
        }
    }
}

impl Default for SearchConfiguration {
    fn default() -> Self {
        let mut pair_orientations = HashSet::new();
        pair_orientations.insert(Orientation::ForwardReverse);
        SearchConfiguration {
            max_error: ErrorBudget::Absolute(4),
            max_reported: 10,
            min_mapq: 0,
            pair_min: 0,
            pair_max: 1000,
            pair_orientations,
            gpu_enabled: false,
            threads: 1,
            max_candidates_per_seed: 20,
            max_region_budget: 64,
        }
    }
}
