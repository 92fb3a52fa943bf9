//! The FASTQ/SAM I/O collaborator. Out of scope for this crate — only the
//! record shapes the collaborator produces/consumes are specified here.

use crate::matches::Match;

/// One read as handed to the search core by the (out-of-scope) FASTQ reader.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub id: String,
    pub sequence: Vec<u8>,
    pub qualities: Vec<u8>,
}

/// A mate pair, as handed to the paired-end coordinator.
#[derive(Debug, Clone)]
pub struct PairedReadRecord {
    pub end1: ReadRecord,
    pub end2: ReadRecord,
}

/// Why a read was emitted unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmappedReason {
    NoCandidates,
    Timeout,
    BelowMinMapq,
}

/// One read's final result, as handed to the (out-of-scope) SAM writer.
#[derive(Debug, Clone)]
pub enum MappingResult {
    Mapped(Vec<Match>),
    Unmapped { id: String, reason: UnmappedReason },
}
