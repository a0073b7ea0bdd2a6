use thiserror::Error;

/// The fixed error taxonomy for the delta planning core. Every fallible
/// operation in the Validator, Sequencers, and Crossover Graph returns one
/// of these variants rather than a generic failure, so a host can match on
/// the code the way the original action framework did on its status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("target field failed validation with {error_count} error(s)")]
    InvalidField { error_count: usize },

    #[error("no such command: {0}")]
    NoSuchCommand(String),

    #[error("formatting command line for pivot {pivot} exceeded the line buffer")]
    SprintfOverflow { pivot: u32 },

    /// Retained for interface fidelity with the source taxonomy. The
    /// Vec-backed crossover graph in this crate has no fallible allocation
    /// path of its own; a true allocation failure aborts the process rather
    /// than surfacing here. See SPEC_FULL.md S10.2.
    #[error("out of memory")]
    OutOfMemory,

    #[error("crossover graph inconsistent for pivot {pivot}: {detail}")]
    CrossoverInconsistent { pivot: u32, detail: String },

    #[error("planner stuck: no parkable candidate after two consecutive passes")]
    PlanStuck,

    #[error("plan inconsistent: {0}")]
    PlanInconsistent(String),
}

pub type DeltaResult<T> = Result<T, DeltaError>;
