//! Alignment: BPM filter/verifier and banded SWG aligner.

pub mod bpm;
pub mod swg;

pub use bpm::{verify, verify_tiled, VerificationOutcome};
pub use swg::{SwgAligner, SwgAlignment, SwgScoringParams};
