//! Power mean coverage objective.
//!
//! A candidate marker set is scored by the generalised mean of per-genome
//! coverage, where coverage counts how many of the markers are present in a
//! genome. Every coverage value is shifted by a small pseudocount so that
//! uncovered genomes drag the mean down without making it undefined.
//!
//! Coverage values are small integers, so the mean only depends on how many
//! genomes sit at each coverage level. Scores are computed from that histogram,
//! which makes two sets with the same coverage profile score bit-identically
//! regardless of which genomes they cover.

use crate::error::MarselError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PSEUDOCOUNT: f64 = 0.1;

/// Exponent of the power mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Exponent {
    /// Generalised mean with exponent p (p = 0 is the geometric mean)
    Power(f64),
    /// Minimum coverage (p -> -inf)
    Min,
    /// Maximum coverage (p -> +inf)
    Max,
}

impl Default for Exponent {
    fn default() -> Self {
        Exponent::Power(0.0)
    }
}

impl FromStr for Exponent {
    type Err = MarselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Exponent::Min),
            "max" => Ok(Exponent::Max),
            other => match other.parse::<f64>() {
                Ok(p) if p.is_finite() => Ok(Exponent::Power(p)),
                _ => Err(MarselError::InvalidExponent(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Exponent {
    type Error = MarselError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Exponent> for String {
    fn from(value: Exponent) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exponent::Power(p) => write!(f, "{}", p),
            Exponent::Min => write!(f, "min"),
            Exponent::Max => write!(f, "max"),
        }
    }
}

/// Power mean of a coverage histogram.
///
/// `histogram[v]` is the number of genomes covered by exactly `v` markers.
/// Returns 0.0 for an empty histogram.
pub fn histogram_power_mean(histogram: &[usize], exponent: Exponent, pseudocount: f64) -> f64 {
    let n: usize = histogram.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let levels = histogram
        .iter()
        .enumerate()
        .filter(|&(_, &genomes)| genomes > 0)
        .map(|(coverage, &genomes)| (coverage as f64 + pseudocount, genomes as f64));

    match exponent {
        Exponent::Min => levels.map(|(x, _)| x).fold(f64::INFINITY, f64::min),
        Exponent::Max => levels.map(|(x, _)| x).fold(f64::NEG_INFINITY, f64::max),
        Exponent::Power(p) if p == 0.0 => {
            let log_sum: f64 = levels.map(|(x, w)| w * x.ln()).sum();
            (log_sum / n as f64).exp()
        }
        Exponent::Power(p) => {
            let pow_sum: f64 = levels.map(|(x, w)| w * x.powf(p)).sum();
            (pow_sum / n as f64).powf(1.0 / p)
        }
    }
}

/// Histogram of per-genome coverage values
pub fn coverage_histogram(coverage: &[u32]) -> Vec<usize> {
    let max = coverage.iter().copied().max().unwrap_or(0) as usize;
    let mut histogram = vec![0; max + 1];
    for &c in coverage {
        histogram[c as usize] += 1;
    }
    histogram
}

/// Score a marker set from its per-genome coverage counts
pub fn score(coverage: &[u32], exponent: Exponent, pseudocount: f64) -> f64 {
    histogram_power_mean(&coverage_histogram(coverage), exponent, pseudocount)
}

/// Per-genome coverage of the markers selected so far
#[derive(Debug, Clone)]
pub struct CoverageState {
    coverage: Vec<u32>,
    histogram: Vec<usize>,
}

impl CoverageState {
    /// Empty selection over `n_genomes` genomes
    pub fn new(n_genomes: usize) -> Self {
        Self {
            coverage: vec![0; n_genomes],
            histogram: vec![n_genomes, 0],
        }
    }

    pub fn coverage(&self) -> &[u32] {
        &self.coverage
    }

    /// Score of the current selection extended by one gene family.
    ///
    /// `column` lists the genomes (by index) in which the candidate occurs.
    /// Pure: the state itself is not modified.
    pub fn score_with(&self, column: &[(usize, u32)], exponent: Exponent, pseudocount: f64) -> f64 {
        let mut histogram = self.histogram.clone();
        for &(genome, _) in column {
            let level = self.coverage[genome] as usize;
            histogram[level] -= 1;
            histogram[level + 1] += 1;
        }
        histogram_power_mean(&histogram, exponent, pseudocount)
    }

    /// Score of the current selection
    pub fn score(&self, exponent: Exponent, pseudocount: f64) -> f64 {
        histogram_power_mean(&self.histogram, exponent, pseudocount)
    }

    /// Add a gene family to the selection
    pub fn add(&mut self, column: &[(usize, u32)]) {
        for &(genome, _) in column {
            let level = self.coverage[genome] as usize;
            self.histogram[level] -= 1;
            self.histogram[level + 1] += 1;
            self.coverage[genome] += 1;
        }
        // Keep one spare level so the next candidate can always move genomes up
        if self.histogram.last().copied().unwrap_or(0) > 0 {
            self.histogram.push(0);
        }
    }
}
