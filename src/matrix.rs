use crate::error::{MarselError, Result};
use crate::record::AnnotationRecord;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Sparse genome x gene family count matrix.
///
/// Genomes and gene families are kept in sorted order and addressed by index.
/// Each gene family stores its nonzero cells as `(genome index, count)` pairs
/// sorted by genome index. Genomes whose counts are all zero remain listed so
/// they can still be accounted for after selection.
#[derive(Debug, Clone)]
pub struct OccurrenceMatrix {
    genomes: Vec<String>,
    families: Vec<String>,
    genome_index: FxHashMap<String, usize>,
    family_index: FxHashMap<String, usize>,
    columns: Vec<Vec<(usize, u32)>>,
}

impl OccurrenceMatrix {
    /// Count retained records per (genome, gene family)
    pub fn build(records: &[AnnotationRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(MarselError::EmptyInput);
        }

        let genomes: Vec<String> = records
            .iter()
            .map(|r| r.genome_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let families: Vec<String> = records
            .iter()
            .map(|r| r.gene_family.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let genome_index = index_of(&genomes);
        let family_index = index_of(&families);

        let mut cells: FxHashMap<(usize, usize), u32> = FxHashMap::default();
        for record in records {
            let family = family_index[record.gene_family.as_str()];
            let genome = genome_index[record.genome_id.as_str()];
            *cells.entry((family, genome)).or_insert(0) += 1;
        }

        let mut columns = vec![Vec::new(); families.len()];
        for ((family, genome), count) in cells {
            columns[family].push((genome, count));
        }
        for column in &mut columns {
            column.sort_unstable_by_key(|&(genome, _)| genome);
        }

        Ok(Self {
            genomes,
            families,
            genome_index,
            family_index,
            columns,
        })
    }

    pub fn genomes(&self) -> &[String] {
        &self.genomes
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    pub fn n_genomes(&self) -> usize {
        self.genomes.len()
    }

    pub fn n_families(&self) -> usize {
        self.families.len()
    }

    pub fn genome_position(&self, genome: &str) -> Option<usize> {
        self.genome_index.get(genome).copied()
    }

    pub fn family_position(&self, family: &str) -> Option<usize> {
        self.family_index.get(family).copied()
    }

    /// Nonzero `(genome index, count)` cells of a gene family
    pub fn column(&self, family: usize) -> &[(usize, u32)] {
        &self.columns[family]
    }

    /// Retained ORF count for a genome and gene family (zero when absent)
    pub fn count(&self, genome: &str, family: &str) -> u32 {
        let (Some(g), Some(f)) = (self.genome_position(genome), self.family_position(family))
        else {
            return 0;
        };
        self.columns[f]
            .binary_search_by_key(&g, |&(genome, _)| genome)
            .map(|i| self.columns[f][i].1)
            .unwrap_or(0)
    }

    /// Number of genomes in which a gene family occurs
    pub fn prevalence(&self, family: usize) -> usize {
        self.columns[family].len()
    }

    /// Summed ORF count of a gene family over all genomes
    pub fn total_count(&self, family: usize) -> u64 {
        self.columns[family].iter().map(|&(_, c)| c as u64).sum()
    }

    /// Gene family counts of one genome, in gene family order
    pub fn genome_row(&self, genome: &str) -> Vec<(&str, u32)> {
        let Some(g) = self.genome_position(genome) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(f, column)| {
                column
                    .binary_search_by_key(&g, |&(genome, _)| genome)
                    .ok()
                    .map(|i| (self.families[f].as_str(), column[i].1))
            })
            .collect()
    }

    /// Drop gene families present in fewer than `min_genomes` genomes.
    ///
    /// Every genome is kept, even if it loses all of its gene families.
    /// Returns the number of gene families removed.
    pub fn drop_rare_families(&mut self, min_genomes: usize) -> usize {
        let before = self.families.len();
        let (families, columns): (Vec<String>, Vec<Vec<(usize, u32)>>) = self
            .families
            .drain(..)
            .zip(self.columns.drain(..))
            .filter(|(_, column)| column.len() >= min_genomes)
            .unzip();
        self.families = families;
        self.columns = columns;
        self.family_index = index_of(&self.families);
        before - self.families.len()
    }
}

fn index_of(names: &[String]) -> FxHashMap<String, usize> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}
