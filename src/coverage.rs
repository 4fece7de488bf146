use crate::error::MarselError;
use crate::matrix::OccurrenceMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum number of distinct selected markers a genome must carry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MinMarkers {
    /// Absolute marker count
    Absolute(usize),
    /// Fraction of k in (0, 1], written as "50%" or "0.5"
    Fraction(f64),
}

impl Default for MinMarkers {
    fn default() -> Self {
        MinMarkers::Absolute(1)
    }
}

impl MinMarkers {
    /// Resolve to an absolute marker threshold for `k` requested markers
    pub fn resolve(&self, k: usize) -> usize {
        match *self {
            MinMarkers::Absolute(n) => n,
            // Tolerance stops 0.3 * 10 from rounding up to 4
            MinMarkers::Fraction(f) => (((f * k as f64) - 1e-9).ceil() as usize).max(1),
        }
    }
}

impl FromStr for MinMarkers {
    type Err = MarselError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || MarselError::InvalidMinMarkers(s.to_string());
        let trimmed = s.trim();

        if let Some(percent) = trimmed.strip_suffix('%') {
            let percent: f64 = percent.trim().parse().map_err(|_| invalid())?;
            if !(percent > 0.0 && percent <= 100.0) {
                return Err(invalid());
            }
            return Ok(MinMarkers::Fraction(percent / 100.0));
        }

        if trimmed.contains('.') {
            let fraction: f64 = trimmed.parse().map_err(|_| invalid())?;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(invalid());
            }
            return Ok(MinMarkers::Fraction(fraction));
        }

        match trimmed.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(MinMarkers::Absolute(n)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for MinMarkers {
    type Error = MarselError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MinMarkers> for String {
    fn from(value: MinMarkers) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MinMarkers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinMarkers::Absolute(n) => write!(f, "{}", n),
            MinMarkers::Fraction(fraction) => write!(f, "{}%", fraction * 100.0),
        }
    }
}

/// Marker coverage of one genome and whether it passes the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeVerdict {
    pub genome_id: String,
    pub distinct_markers_present: usize,
    pub total_marker_orf_count: u64,
    pub kept: bool,
}

/// Evaluate every genome of the matrix against the selected markers.
///
/// Verdicts come back in the matrix's genome order. Markers unknown to the
/// matrix contribute nothing.
pub fn genome_verdicts(
    matrix: &OccurrenceMatrix,
    markers: &[String],
    threshold: usize,
) -> Vec<GenomeVerdict> {
    let mut distinct = vec![0usize; matrix.n_genomes()];
    let mut totals = vec![0u64; matrix.n_genomes()];

    for family in markers.iter().filter_map(|m| matrix.family_position(m)) {
        for &(genome, count) in matrix.column(family) {
            distinct[genome] += 1;
            totals[genome] += count as u64;
        }
    }

    matrix
        .genomes()
        .iter()
        .zip(distinct.into_iter().zip(totals))
        .map(|(genome_id, (present, total))| GenomeVerdict {
            genome_id: genome_id.clone(),
            distinct_markers_present: present,
            total_marker_orf_count: total,
            kept: present >= threshold,
        })
        .collect()
}

/// Kept/discarded genome counts for a run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub threshold: usize,
    pub genomes_kept: usize,
    pub genomes_discarded: usize,
}

impl CoverageSummary {
    pub fn from_verdicts(verdicts: &[GenomeVerdict], threshold: usize) -> Self {
        let genomes_kept = verdicts.iter().filter(|v| v.kept).count();
        Self {
            threshold,
            genomes_kept,
            genomes_discarded: verdicts.len() - genomes_kept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AnnotationRecord;

    #[test]
    fn test_parse_min_markers() {
        assert_eq!("3".parse::<MinMarkers>().unwrap(), MinMarkers::Absolute(3));
        assert_eq!(" 50% ".parse::<MinMarkers>().unwrap(), MinMarkers::Fraction(0.5));
        assert_eq!("0.25".parse::<MinMarkers>().unwrap(), MinMarkers::Fraction(0.25));
        for bad in ["0", "-2", "abc", "0%", "150%", "1.5", "", "%"] {
            assert!(
                matches!(bad.parse::<MinMarkers>(), Err(MarselError::InvalidMinMarkers(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_min_markers() {
        assert_eq!("50%".parse::<MinMarkers>().unwrap().resolve(10), 5);
        assert_eq!("30%".parse::<MinMarkers>().unwrap().resolve(10), 3);
        assert_eq!("0.3".parse::<MinMarkers>().unwrap().resolve(10), 3);
        assert_eq!("50%".parse::<MinMarkers>().unwrap().resolve(5), 3);
        assert_eq!("1%".parse::<MinMarkers>().unwrap().resolve(5), 1);
        assert_eq!(MinMarkers::Absolute(7).resolve(5), 7);
    }

    #[test]
    fn test_min_markers_display_roundtrip() {
        for text in ["4", "50%"] {
            let parsed: MinMarkers = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    fn matrix() -> OccurrenceMatrix {
        let rows = [
            ("A_1", "K1"),
            ("A_2", "K1"),
            ("A_3", "K2"),
            ("A_4", "K3"),
            ("B_1", "K1"),
            ("C_1", "K4"),
        ];
        let records: Vec<AnnotationRecord> = rows
            .iter()
            .map(|(orf, family)| {
                AnnotationRecord::new(*orf, crate::record::genome_from_orf(orf), "a.tsv", 1.0, *family)
            })
            .collect();
        OccurrenceMatrix::build(&records).unwrap()
    }

    #[test]
    fn test_verdicts() {
        let markers = vec!["K1".to_string(), "K2".to_string()];
        let verdicts = genome_verdicts(&matrix(), &markers, 2);
        assert_eq!(
            verdicts,
            vec![
                GenomeVerdict {
                    genome_id: "A".to_string(),
                    distinct_markers_present: 2,
                    total_marker_orf_count: 3,
                    kept: true,
                },
                GenomeVerdict {
                    genome_id: "B".to_string(),
                    distinct_markers_present: 1,
                    total_marker_orf_count: 1,
                    kept: false,
                },
                GenomeVerdict {
                    genome_id: "C".to_string(),
                    distinct_markers_present: 0,
                    total_marker_orf_count: 0,
                    kept: false,
                },
            ]
        );

        let summary = CoverageSummary::from_verdicts(&verdicts, 2);
        assert_eq!(summary.genomes_kept, 1);
        assert_eq!(summary.genomes_discarded, 2);
    }

    #[test]
    fn test_percentage_threshold_discards_genome() {
        // k = 10 and 50% resolves to 5, so four markers are not enough
        let threshold = "50%".parse::<MinMarkers>().unwrap().resolve(10);
        let families: Vec<String> = (1..=10).map(|i| format!("K{}", i)).collect();
        let records: Vec<AnnotationRecord> = families
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, f)| AnnotationRecord::new(format!("G_{}", i), "G".to_string(), "a".to_string(), 1.0, f.clone()))
            .collect();
        let matrix = OccurrenceMatrix::build(&records).unwrap();
        let verdicts = genome_verdicts(&matrix, &families, threshold);
        assert_eq!(verdicts[0].distinct_markers_present, 4);
        assert!(!verdicts[0].kept);
    }
}
