use crate::copies::validate_threshold;
use crate::coverage::MinMarkers;
use crate::error::{MarselError, Result};
use crate::objective::{DEFAULT_PSEUDOCOUNT, Exponent};
use crate::optimizer::Strategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MARKERS: usize = 50;
pub const DEFAULT_THRESHOLD: f64 = 1.0;

/// Parameters of one marker selection run.
///
/// Passed by reference through the pipeline and never mutated, so runs with
/// different parameters can proceed side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Number of markers to select
    pub k: usize,

    /// Copy filter threshold relative to the best bit score, in [0, 1]
    pub threshold: f64,

    /// Power mean exponent of the selection objective
    pub exponent: Exponent,

    /// Minimum number of distinct markers for a genome to be kept
    pub min_markers: MinMarkers,

    /// Drop gene families present in fewer genomes than this before selecting
    pub min_genomes: usize,

    /// Added to every per-genome coverage value before averaging
    pub pseudocount: f64,

    /// Wall-clock limit for the greedy search
    pub time_budget: Option<Duration>,

    pub strategy: Strategy,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_MARKERS,
            threshold: DEFAULT_THRESHOLD,
            exponent: Exponent::default(),
            min_markers: MinMarkers::default(),
            min_genomes: 1,
            pseudocount: DEFAULT_PSEUDOCOUNT,
            time_budget: None,
            strategy: Strategy::Greedy,
        }
    }
}

impl SelectionParams {
    /// Validate every option and resolve the minimum marker threshold.
    ///
    /// Runs before any data is touched, so configuration mistakes surface
    /// immediately.
    pub fn validate(&self) -> Result<usize> {
        if self.k == 0 {
            return Err(MarselError::InvalidK(self.k));
        }
        validate_threshold(self.threshold)?;
        if let Exponent::Power(p) = self.exponent {
            if !p.is_finite() {
                return Err(MarselError::InvalidExponent(p.to_string()));
            }
        }
        if !(self.pseudocount.is_finite() && self.pseudocount > 0.0) {
            return Err(MarselError::InvalidPseudocount(self.pseudocount));
        }
        match self.min_markers {
            MinMarkers::Absolute(0) => Err(MarselError::InvalidMinMarkers("0".to_string())),
            MinMarkers::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(MarselError::InvalidMinMarkers(f.to_string()))
            }
            min_markers => Ok(min_markers.resolve(self.k)),
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_exponent(mut self, exponent: Exponent) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn with_min_markers(mut self, min_markers: MinMarkers) -> Self {
        self.min_markers = min_markers;
        self
    }

    pub fn with_min_genomes(mut self, min_genomes: usize) -> Self {
        self.min_genomes = min_genomes;
        self
    }

    pub fn with_pseudocount(mut self, pseudocount: f64) -> Self {
        self.pseudocount = pseudocount;
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = Some(time_budget);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SelectionParams::default();
        assert_eq!(params.k, 50);
        assert_eq!(params.threshold, 1.0);
        assert_eq!(params.exponent, Exponent::Power(0.0));
        assert_eq!(params.min_markers, MinMarkers::Absolute(1));
        assert_eq!(params.validate().unwrap(), 1);
    }

    #[test]
    fn test_resolves_percentage_once() {
        let params = SelectionParams::default()
            .with_k(10)
            .with_min_markers(MinMarkers::Fraction(0.5));
        assert_eq!(params.validate().unwrap(), 5);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let base = SelectionParams::default();
        assert!(matches!(
            base.clone().with_k(0).validate(),
            Err(MarselError::InvalidK(0))
        ));
        assert!(matches!(
            base.clone().with_threshold(1.5).validate(),
            Err(MarselError::InvalidThreshold(_))
        ));
        assert!(matches!(
            base.clone().with_pseudocount(0.0).validate(),
            Err(MarselError::InvalidPseudocount(_))
        ));
        assert!(matches!(
            base.clone().with_exponent(Exponent::Power(f64::NAN)).validate(),
            Err(MarselError::InvalidExponent(_))
        ));
        assert!(matches!(
            base.clone().with_min_markers(MinMarkers::Absolute(0)).validate(),
            Err(MarselError::InvalidMinMarkers(_))
        ));
        assert!(matches!(
            base.with_min_markers(MinMarkers::Fraction(2.0)).validate(),
            Err(MarselError::InvalidMinMarkers(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let params = SelectionParams::default()
            .with_exponent(Exponent::Min)
            .with_min_markers(MinMarkers::Fraction(0.5));
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"exponent\":\"min\""));
        assert!(json.contains("\"min_markers\":\"50%\""));
        let parsed: SelectionParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }
}
