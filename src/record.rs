use crate::error::{MarselError, Result};
use serde::{Deserialize, Serialize};

/// One ORF assigned to a gene family, as produced by the annotation normaliser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub orf_id: String,
    pub genome_id: String,
    pub source_file: String,
    pub bit_score: f64,
    pub gene_family: String,
}

impl AnnotationRecord {
    pub fn new<S: Into<String>>(
        orf_id: S,
        genome_id: S,
        source_file: S,
        bit_score: f64,
        gene_family: S,
    ) -> Self {
        Self {
            orf_id: orf_id.into(),
            genome_id: genome_id.into(),
            source_file: source_file.into(),
            bit_score,
            gene_family: gene_family.into(),
        }
    }

    /// Check the record against the normaliser contract
    pub fn validate(&self, index: usize) -> Result<()> {
        let reason = if self.orf_id.is_empty() {
            Some("empty ORF identifier")
        } else if self.genome_id.is_empty() {
            Some("empty genome identifier")
        } else if self.gene_family.is_empty() {
            Some("empty gene family")
        } else if !self.bit_score.is_finite() {
            Some("bit score is not a finite number")
        } else if self.bit_score < 0.0 {
            Some("negative bit score")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(MarselError::MalformedRecord {
                index,
                orf_id: self.orf_id.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Reject the whole stream on the first malformed record
pub fn validate_records(records: &[AnnotationRecord]) -> Result<()> {
    records
        .iter()
        .enumerate()
        .try_for_each(|(index, record)| record.validate(index))
}

/// Genome identifier encoded in an ORF identifier (text before the first underscore)
pub fn genome_from_orf(orf_id: &str) -> &str {
    orf_id.split('_').next().unwrap_or(orf_id)
}
