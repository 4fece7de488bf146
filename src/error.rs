use thiserror::Error;

/// Errors raised by the marker selection core
#[derive(Error, Debug)]
pub enum MarselError {
    /// Copy filter threshold outside [0, 1]
    #[error("Invalid copy threshold {0}: must be between 0.0 and 1.0")]
    InvalidThreshold(f64),

    /// Nothing left to build an occurrence matrix from
    #[error("No annotation records to build an occurrence matrix from")]
    EmptyInput,

    /// Requested marker count is not positive
    #[error("Invalid number of markers k={0}: must be greater than 0")]
    InvalidK(usize),

    /// Fewer distinct gene families than requested markers
    #[error("Only {available} candidate gene families available, {requested} markers requested")]
    InsufficientCandidates { requested: usize, available: usize },

    /// A record violating the normalised record contract
    #[error("Malformed annotation record #{index} ({orf_id:?}): {reason}")]
    MalformedRecord {
        index: usize,
        orf_id: String,
        reason: String,
    },

    /// Unparseable or out-of-range minimum marker count
    #[error("Invalid minimum markers per genome {0:?}: expected an integer >= 1, a percentage like \"50%\" or a fraction like \"0.5\"")]
    InvalidMinMarkers(String),

    /// Unparseable or non-finite power mean exponent
    #[error("Invalid exponent {0:?}: expected a finite number, \"min\" or \"max\"")]
    InvalidExponent(String),

    /// Pseudocount must be strictly positive
    #[error("Invalid pseudocount {0}: must be a finite number greater than 0")]
    InvalidPseudocount(f64),

    /// Exhaustive verification refused because the search space is too large
    #[error(
        "Exhaustive search over {pool} candidates with k={k} needs {combinations} evaluations (limit {limit})"
    )]
    ExhaustiveSearchTooLarge {
        pool: usize,
        k: usize,
        combinations: u128,
        limit: u128,
    },
}

pub type Result<T> = std::result::Result<T, MarselError>;
