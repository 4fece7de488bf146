//! Per-marker ORF tables and coverage statistics for the selected markers.
//!
//! Only genomes that passed the coverage filter appear here; discarded genomes
//! are accounted for in the run summary instead.

use crate::coverage::GenomeVerdict;
use crate::optimizer::Selection;
use crate::record::AnnotationRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One ORF of a selected marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerOrf {
    pub orf_id: String,
    pub genome_id: String,
    pub source_file: String,
}

/// Markers carried by one kept genome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeMarkerStats {
    pub genome_id: String,
    pub number_of_different_markers: usize,
    pub total_number_of_markers: u64,
    /// Marker ORF counts, most frequent first
    pub details: Vec<(String, u64)>,
}

/// Kept genomes carrying one marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerGenomeStats {
    pub marker: String,
    pub number_of_genomes: usize,
    /// Per-genome ORF counts, most frequent first
    pub details: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerReport {
    /// ORFs per marker, in selection order
    pub orfs: Vec<(String, Vec<MarkerOrf>)>,
    /// Per kept genome, in genome order
    pub genomes: Vec<GenomeMarkerStats>,
    /// Per marker, in selection order
    pub markers: Vec<MarkerGenomeStats>,
}

/// Sort counts by decreasing count, then name
fn ranked(counts: HashMap<&str, u64>) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Render `name:count` pairs joined by `;`
pub fn format_details(details: &[(String, u64)]) -> String {
    details
        .iter()
        .map(|(name, count)| format!("{}:{}", name, count))
        .collect::<Vec<_>>()
        .join(";")
}

impl MarkerReport {
    /// Collect the filtered records of selected markers in kept genomes
    pub fn build(
        filtered: &[AnnotationRecord],
        selection: &Selection,
        verdicts: &[GenomeVerdict],
    ) -> Self {
        let markers = selection.families();
        let kept: HashSet<&str> = verdicts
            .iter()
            .filter(|v| v.kept)
            .map(|v| v.genome_id.as_str())
            .collect();
        let selected: HashSet<&str> = markers.iter().map(String::as_str).collect();

        let marker_records: Vec<&AnnotationRecord> = filtered
            .iter()
            .filter(|r| selected.contains(r.gene_family.as_str()))
            .filter(|r| kept.contains(r.genome_id.as_str()))
            .collect();

        let mut orfs: HashMap<&str, Vec<MarkerOrf>> = HashMap::new();
        let mut by_genome: BTreeMap<&str, HashMap<&str, u64>> = BTreeMap::new();
        let mut by_marker: HashMap<&str, HashMap<&str, u64>> = HashMap::new();

        for record in marker_records {
            orfs.entry(record.gene_family.as_str())
                .or_default()
                .push(MarkerOrf {
                    orf_id: record.orf_id.clone(),
                    genome_id: record.genome_id.clone(),
                    source_file: record.source_file.clone(),
                });
            *by_genome
                .entry(record.genome_id.as_str())
                .or_default()
                .entry(record.gene_family.as_str())
                .or_insert(0) += 1;
            *by_marker
                .entry(record.gene_family.as_str())
                .or_default()
                .entry(record.genome_id.as_str())
                .or_insert(0) += 1;
        }

        let genomes = by_genome
            .into_iter()
            .map(|(genome, counts)| GenomeMarkerStats {
                genome_id: genome.to_string(),
                number_of_different_markers: counts.len(),
                total_number_of_markers: counts.values().sum(),
                details: ranked(counts),
            })
            .collect();

        let marker_stats = markers
            .iter()
            .map(|marker| {
                let counts = by_marker.remove(marker.as_str()).unwrap_or_default();
                MarkerGenomeStats {
                    marker: marker.clone(),
                    number_of_genomes: counts.len(),
                    details: ranked(counts),
                }
            })
            .collect();

        let orfs = markers
            .iter()
            .map(|marker| {
                let rows = orfs.remove(marker.as_str()).unwrap_or_default();
                (marker.clone(), rows)
            })
            .collect();

        Self {
            orfs,
            genomes,
            markers: marker_stats,
        }
    }

    /// Total marker ORFs over all kept genomes
    pub fn total_marker_orfs(&self) -> u64 {
        self.genomes.iter().map(|g| g.total_number_of_markers).sum()
    }

    /// Write ORF tables and statistics under `output_dir`
    pub fn write(&self, selection: &Selection, output_dir: &Path) -> Result<()> {
        self.write_orf_tables(output_dir)?;
        self.write_statistics(selection, output_dir)?;
        Ok(())
    }

    /// One headerless `orf  genome  source_file` table per marker in `orfs/`
    pub fn write_orf_tables(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let orf_dir = output_dir.join("orfs");
        fs::create_dir_all(&orf_dir)
            .with_context(|| format!("Failed to create directory: {}", orf_dir.display()))?;

        let mut written = Vec::with_capacity(self.orfs.len());
        for (marker, rows) in &self.orfs {
            let path = orf_dir.join(format!("{}.txt", marker.replace(['/', '\\'], "_")));
            let mut writer = tsv_writer(&path)?;
            for row in rows {
                writer.write_record([&row.orf_id, &row.genome_id, &row.source_file])?;
            }
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }

    /// Per-genome, per-marker and selection tables in `statistics/`
    pub fn write_statistics(&self, selection: &Selection, output_dir: &Path) -> Result<()> {
        let stats_dir = output_dir.join("statistics");
        fs::create_dir_all(&stats_dir)
            .with_context(|| format!("Failed to create directory: {}", stats_dir.display()))?;

        let path = stats_dir.join("number_of_markers_per_genome.tsv");
        let mut writer = tsv_writer(&path)?;
        writer.write_record([
            "genome",
            "number_of_different_markers",
            "total_number_of_markers",
            "details",
        ])?;
        for genome in &self.genomes {
            writer.write_record([
                genome.genome_id.clone(),
                genome.number_of_different_markers.to_string(),
                genome.total_number_of_markers.to_string(),
                format_details(&genome.details),
            ])?;
        }
        writer.flush()?;

        let path = stats_dir.join("number_of_genomes_per_marker.tsv");
        let mut writer = tsv_writer(&path)?;
        writer.write_record(["marker", "number_of_genomes", "details"])?;
        for marker in &self.markers {
            writer.write_record([
                marker.marker.clone(),
                marker.number_of_genomes.to_string(),
                format_details(&marker.details),
            ])?;
        }
        writer.flush()?;

        let path = stats_dir.join("selected_markers.tsv");
        let mut writer = tsv_writer(&path)?;
        writer.write_record(["rank", "marker", "score", "number_of_genomes", "total_orfs"])?;
        for marker in &selection.markers {
            writer.write_record([
                marker.rank.to_string(),
                marker.family.clone(),
                format!("{:.6}", marker.score),
                marker.genomes.to_string(),
                marker.total_count.to_string(),
            ])?;
        }
        writer.flush()?;

        Ok(())
    }
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{SelectedMarker, SelectionStatus};
    use tempfile::tempdir;

    fn record(orf: &str, family: &str) -> AnnotationRecord {
        let genome = crate::record::genome_from_orf(orf);
        AnnotationRecord::new(orf, genome, "set.tsv", 1.0, family)
    }

    fn selection(families: &[&str]) -> Selection {
        Selection {
            markers: families
                .iter()
                .enumerate()
                .map(|(i, f)| SelectedMarker {
                    family: f.to_string(),
                    rank: i + 1,
                    score: 1.0 + i as f64,
                    genomes: 2,
                    total_count: 3,
                })
                .collect(),
            status: SelectionStatus::Complete,
        }
    }

    fn verdict(genome: &str, kept: bool) -> GenomeVerdict {
        GenomeVerdict {
            genome_id: genome.to_string(),
            distinct_markers_present: 0,
            total_marker_orf_count: 0,
            kept,
        }
    }

    fn sample() -> (Vec<AnnotationRecord>, Selection, Vec<GenomeVerdict>) {
        let records = vec![
            record("A_1", "K1"),
            record("A_2", "K1"),
            record("A_3", "K2"),
            record("A_4", "K9"),
            record("B_1", "K2"),
            record("C_1", "K1"),
        ];
        let verdicts = vec![verdict("A", true), verdict("B", true), verdict("C", false)];
        (records, selection(&["K2", "K1"]), verdicts)
    }

    #[test]
    fn test_build_report() {
        let (records, selection, verdicts) = sample();
        let report = MarkerReport::build(&records, &selection, &verdicts);

        assert_eq!(report.orfs[0].0, "K2");
        let k1_orfs: Vec<&str> = report.orfs[1].1.iter().map(|o| o.orf_id.as_str()).collect();
        assert_eq!(k1_orfs, vec!["A_1", "A_2"]);

        assert_eq!(report.genomes.len(), 2);
        assert_eq!(report.genomes[0].genome_id, "A");
        assert_eq!(report.genomes[0].number_of_different_markers, 2);
        assert_eq!(report.genomes[0].total_number_of_markers, 3);
        assert_eq!(format_details(&report.genomes[0].details), "K1:2;K2:1");

        assert_eq!(report.markers[1].marker, "K1");
        assert_eq!(report.markers[1].number_of_genomes, 1);
        assert_eq!(report.markers[0].number_of_genomes, 2);
        assert_eq!(format_details(&report.markers[0].details), "A:1;B:1");
        assert_eq!(report.total_marker_orfs(), 4);
    }

    #[test]
    fn test_write_report() {
        let (records, selection, verdicts) = sample();
        let report = MarkerReport::build(&records, &selection, &verdicts);
        let dir = tempdir().unwrap();
        report.write(&selection, dir.path()).unwrap();

        let k1 = fs::read_to_string(dir.path().join("orfs/K1.txt")).unwrap();
        assert_eq!(k1, "A_1\tA\tset.tsv\nA_2\tA\tset.tsv\n");

        let per_genome =
            fs::read_to_string(dir.path().join("statistics/number_of_markers_per_genome.tsv")).unwrap();
        let lines: Vec<&str> = per_genome.lines().collect();
        assert_eq!(
            lines[0],
            "genome\tnumber_of_different_markers\ttotal_number_of_markers\tdetails"
        );
        assert_eq!(lines[1], "A\t2\t3\tK1:2;K2:1");
        assert_eq!(lines[2], "B\t1\t1\tK2:1");

        let selected =
            fs::read_to_string(dir.path().join("statistics/selected_markers.tsv")).unwrap();
        assert!(selected.lines().nth(1).unwrap().starts_with("1\tK2\t"));
    }
}
