//! Collapse redundant ORF copies of a gene family within a genome.
//!
//! For every (genome, gene family) group the best bit score is found, and only
//! records scoring at least `threshold` times that maximum survive. A threshold
//! of 1.0 keeps the best hit(s) only; 0.0 keeps everything.

use crate::error::{MarselError, Result};
use crate::record::AnnotationRecord;
use rustc_hash::FxHashMap;

/// Check that a copy threshold lies in [0, 1]
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(MarselError::InvalidThreshold(threshold))
    }
}

/// Maximum bit score of every (genome, gene family) group
fn max_scores(records: &[AnnotationRecord]) -> FxHashMap<(&str, &str), f64> {
    let mut maxima: FxHashMap<(&str, &str), f64> = FxHashMap::default();
    for record in records {
        maxima
            .entry((record.genome_id.as_str(), record.gene_family.as_str()))
            .and_modify(|best| {
                if record.bit_score > *best {
                    *best = record.bit_score;
                }
            })
            .or_insert(record.bit_score);
    }
    maxima
}

/// Retain records within `threshold` of their group's best bit score.
///
/// Input order is preserved, so filtering is deterministic and filtering an
/// already filtered stream again with the same threshold of 1.0 is a no-op.
pub fn filter_copies(records: &[AnnotationRecord], threshold: f64) -> Result<Vec<AnnotationRecord>> {
    validate_threshold(threshold)?;

    let maxima = max_scores(records);
    let filtered = records
        .iter()
        .filter(|record| {
            let key = (record.genome_id.as_str(), record.gene_family.as_str());
            let max_score = maxima.get(&key).copied().unwrap_or(record.bit_score);
            record.bit_score >= max_score * threshold
        })
        .cloned()
        .collect();

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(orf: &str, score: f64, family: &str) -> AnnotationRecord {
        let genome = crate::record::genome_from_orf(orf);
        AnnotationRecord::new(orf, genome, "a.tsv", score, family)
    }

    fn sample() -> Vec<AnnotationRecord> {
        vec![
            record("G1_1", 100.0, "K1"),
            record("G1_2", 80.0, "K1"),
            record("G1_3", 40.0, "K1"),
            record("G1_4", 55.0, "K2"),
            record("G2_1", 70.0, "K1"),
            record("G2_2", 70.0, "K1"),
            record("G2_3", 10.0, "K2"),
        ]
    }

    fn orfs(records: &[AnnotationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.orf_id.as_str()).collect()
    }

    #[test]
    fn test_threshold_one_keeps_best_and_ties() {
        let filtered = filter_copies(&sample(), 1.0).unwrap();
        assert_eq!(orfs(&filtered), vec!["G1_1", "G1_4", "G2_1", "G2_2", "G2_3"]);
    }

    #[test]
    fn test_threshold_one_is_idempotent() {
        let once = filter_copies(&sample(), 1.0).unwrap();
        let twice = filter_copies(&once, 1.0).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_threshold_zero_is_identity() {
        let input = sample();
        let filtered = filter_copies(&input, 0.0).unwrap();
        assert_eq!(filtered, input);
    }

    #[test]
    fn test_intermediate_threshold() {
        let filtered = filter_copies(&sample(), 0.8).unwrap();
        assert_eq!(
            orfs(&filtered),
            vec!["G1_1", "G1_2", "G1_4", "G2_1", "G2_2", "G2_3"]
        );
    }

    #[test]
    fn test_zero_scores_survive() {
        let input = vec![record("G1_1", 0.0, "K1"), record("G1_2", 0.0, "K1")];
        assert_eq!(filter_copies(&input, 1.0).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_threshold() {
        for threshold in [-0.1, 1.01, f64::NAN] {
            assert!(matches!(
                filter_copies(&sample(), threshold),
                Err(MarselError::InvalidThreshold(_))
            ));
        }
    }
}
