//! Marker selection over an occurrence matrix.
//!
//! The greedy optimizer grows the marker set one gene family at a time, each
//! round scoring every remaining candidate against the current coverage and
//! keeping the best. Candidates are scored in parallel; the pool is only
//! touched once every score of the round is in. Ties are broken by higher
//! total occurrence count and then by the lexicographically smallest gene
//! family, so the result never depends on thread scheduling.
//!
//! An exhaustive mode scores every combination and is meant for checking the
//! greedy result on small pools.

use crate::error::{MarselError, Result};
use crate::matrix::OccurrenceMatrix;
use crate::objective::{CoverageState, DEFAULT_PSEUDOCOUNT, Exponent, score};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Largest number of combinations the exhaustive search will evaluate
pub const EXHAUSTIVE_LIMIT: u128 = 5_000_000;

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Greedy,
    Exhaustive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMarker {
    pub family: String,
    /// 1-based selection order
    pub rank: usize,
    /// Score of the marker set up to and including this marker
    pub score: f64,
    /// Genomes in which the gene family occurs
    pub genomes: usize,
    /// Retained ORFs of the gene family over all genomes
    pub total_count: u64,
}

/// How a selection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionStatus {
    Complete,
    /// The pool ran dry before k markers were selected
    InsufficientCandidates { requested: usize, available: usize },
    /// The time budget ran out before k markers were selected
    TimedOut { requested: usize, selected: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub markers: Vec<SelectedMarker>,
    pub status: SelectionStatus,
}

impl Selection {
    /// Selected gene families in selection order
    pub fn families(&self) -> Vec<String> {
        self.markers.iter().map(|m| m.family.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.status == SelectionStatus::Complete
    }

    /// Score of the full selection (0.0 when nothing was selected)
    pub fn final_score(&self) -> f64 {
        self.markers.last().map_or(0.0, |m| m.score)
    }

    /// Turn a partial selection caused by a small pool into an error
    pub fn require_complete(self) -> Result<Self> {
        match self.status {
            SelectionStatus::InsufficientCandidates {
                requested,
                available,
            } => Err(MarselError::InsufficientCandidates {
                requested,
                available,
            }),
            _ => Ok(self),
        }
    }
}

/// One scored candidate of a greedy round
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    slot: usize,
    family: usize,
    name: &'a str,
    score: f64,
    total_count: u64,
}

/// Higher score, then higher total count, then smaller name wins
fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then(a.total_count.cmp(&b.total_count))
        .then_with(|| b.name.cmp(a.name))
}

/// Number of k-combinations of n items, saturating at `u128::MAX`
pub fn combinations(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = match result.checked_mul((n - i) as u128) {
            Some(product) => product / (i as u128 + 1),
            None => return u128::MAX,
        };
    }
    result
}

pub struct Optimizer<'a> {
    matrix: &'a OccurrenceMatrix,
    k: usize,
    exponent: Exponent,
    pseudocount: f64,
    time_budget: Option<Duration>,
    progress: bool,
}

impl<'a> Optimizer<'a> {
    /// Optimizer selecting `k` markers with the default geometric mean objective
    pub fn new(matrix: &'a OccurrenceMatrix, k: usize) -> Self {
        Self {
            matrix,
            k,
            exponent: Exponent::default(),
            pseudocount: DEFAULT_PSEUDOCOUNT,
            time_budget: None,
            progress: false,
        }
    }

    pub fn with_exponent(mut self, exponent: Exponent) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn with_pseudocount(mut self, pseudocount: f64) -> Self {
        self.pseudocount = pseudocount;
        self
    }

    /// Stop the greedy search once this much wall-clock time has passed
    pub fn with_time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Show a progress bar on stderr
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self, strategy: Strategy) -> Result<Selection> {
        match strategy {
            Strategy::Greedy => self.greedy(),
            Strategy::Exhaustive => self.exhaustive(),
        }
    }

    fn check_k(&self) -> Result<()> {
        if self.k == 0 {
            return Err(MarselError::InvalidK(self.k));
        }
        Ok(())
    }

    fn marker(&self, family: usize, rank: usize, score: f64) -> SelectedMarker {
        SelectedMarker {
            family: self.matrix.families()[family].clone(),
            rank,
            score,
            genomes: self.matrix.prevalence(family),
            total_count: self.matrix.total_count(family),
        }
    }

    fn shortfall_status(&self, available: usize) -> SelectionStatus {
        if available < self.k {
            warn!(
                "Only {} candidate gene families available; selecting {} of {} requested markers",
                available, available, self.k
            );
            SelectionStatus::InsufficientCandidates {
                requested: self.k,
                available,
            }
        } else {
            SelectionStatus::Complete
        }
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("Selecting markers {bar:40} {pos}/{len} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(pb)
    }

    /// Greedy forward selection
    pub fn greedy(&self) -> Result<Selection> {
        self.check_k()?;

        let matrix = self.matrix;
        let mut pool: Vec<usize> = (0..matrix.n_families()).collect();
        let target = self.k.min(pool.len());
        let mut status = self.shortfall_status(pool.len());

        let deadline = self
            .time_budget
            .and_then(|budget| Instant::now().checked_add(budget));
        let progress = self.progress_bar(target);
        let mut state = CoverageState::new(matrix.n_genomes());
        let mut markers = Vec::with_capacity(target);

        for rank in 1..=target {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    "Time budget exhausted after selecting {} of {} markers",
                    markers.len(),
                    self.k
                );
                status = SelectionStatus::TimedOut {
                    requested: self.k,
                    selected: markers.len(),
                };
                break;
            }

            let best = pool
                .par_iter()
                .enumerate()
                .map(|(slot, &family)| Candidate {
                    slot,
                    family,
                    name: &matrix.families()[family],
                    score: state.score_with(matrix.column(family), self.exponent, self.pseudocount),
                    total_count: matrix.total_count(family),
                })
                .max_by(compare_candidates);

            let Some(best) = best else {
                break;
            };

            pool.remove(best.slot);
            state.add(matrix.column(best.family));
            debug!(
                "Marker {}: {} (score {:.6}, {} genomes, {} ORFs)",
                rank,
                best.name,
                best.score,
                matrix.prevalence(best.family),
                best.total_count
            );
            markers.push(self.marker(best.family, rank, best.score));

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(Selection { markers, status })
    }

    /// Score every combination of `min(k, pool)` candidates and keep the best.
    ///
    /// Ties go to the higher summed occurrence count, then to the
    /// lexicographically smallest list of gene families. Markers are reported
    /// in gene family order. The time budget is not applied here.
    pub fn exhaustive(&self) -> Result<Selection> {
        self.check_k()?;

        let matrix = self.matrix;
        let pool = matrix.n_families();
        let size = self.k.min(pool);
        let count = combinations(pool, size);
        if count > EXHAUSTIVE_LIMIT {
            return Err(MarselError::ExhaustiveSearchTooLarge {
                pool,
                k: size,
                combinations: count,
                limit: EXHAUSTIVE_LIMIT,
            });
        }
        let status = self.shortfall_status(pool);

        let evaluate = |combination: Vec<usize>| {
            let mut coverage = vec![0u32; matrix.n_genomes()];
            for &family in &combination {
                for &(genome, _) in matrix.column(family) {
                    coverage[genome] += 1;
                }
            }
            let total: u64 = combination.iter().map(|&f| matrix.total_count(f)).sum();
            (score(&coverage, self.exponent, self.pseudocount), total, combination)
        };

        let best = (0..pool)
            .combinations(size)
            .par_bridge()
            .map(evaluate)
            .max_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then(a.1.cmp(&b.1))
                    .then_with(|| b.2.cmp(&a.2))
            });

        let mut markers = Vec::with_capacity(size);
        if let Some((_, _, combination)) = best {
            let mut state = CoverageState::new(matrix.n_genomes());
            for (i, &family) in combination.iter().enumerate() {
                state.add(matrix.column(family));
                let prefix_score = state.score(self.exponent, self.pseudocount);
                markers.push(self.marker(family, i + 1, prefix_score));
            }
        }

        Ok(Selection { markers, status })
    }
}
