use crate::SelectionConfig;
use crate::annotations::load_annotations;
use crate::copies::filter_copies;
use crate::coverage::{CoverageSummary, GenomeVerdict, genome_verdicts};
use crate::error::Result as MarselResult;
use crate::matrix::OccurrenceMatrix;
use crate::optimizer::{Optimizer, Selection, SelectionStatus, Strategy};
use crate::params::SelectionParams;
use crate::record::{AnnotationRecord, validate_records};
use crate::report::MarkerReport;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::time::Instant;

/// Everything one selection run produces, before anything is written
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Records surviving the copy filter, in input order
    pub filtered: Vec<AnnotationRecord>,
    /// Occurrence matrix after rare families were dropped
    pub matrix: OccurrenceMatrix,
    pub orfs_in: usize,
    pub rare_families_removed: usize,
    pub selection: Selection,
    pub verdicts: Vec<GenomeVerdict>,
    pub coverage: CoverageSummary,
}

impl SelectionOutcome {
    pub fn report(&self) -> MarkerReport {
        MarkerReport::build(&self.filtered, &self.selection, &self.verdicts)
    }

    /// Genomes carrying at least the minimum number of markers
    pub fn kept_genomes(&self) -> Vec<&str> {
        self.verdicts
            .iter()
            .filter(|v| v.kept)
            .map(|v| v.genome_id.as_str())
            .collect()
    }
}

/// Run the whole selection on in-memory records.
///
/// Parameters are validated before any record is inspected. A short
/// candidate pool or an expired time budget is not an error: the partial
/// selection comes back with its status set accordingly.
pub fn select_markers(
    records: &[AnnotationRecord],
    params: &SelectionParams,
    progress: bool,
) -> MarselResult<SelectionOutcome> {
    let min_markers = params.validate()?;
    validate_records(records)?;

    let filtered = filter_copies(records, params.threshold)?;
    debug!(
        "Copy filter kept {} of {} records at threshold {}",
        filtered.len(),
        records.len(),
        params.threshold
    );

    let mut matrix = OccurrenceMatrix::build(&filtered)?;
    let rare_families_removed = matrix.drop_rare_families(params.min_genomes);
    debug!(
        "Dropped {} gene families present in fewer than {} genomes",
        rare_families_removed, params.min_genomes
    );

    let selection = Optimizer::new(&matrix, params.k)
        .with_exponent(params.exponent)
        .with_pseudocount(params.pseudocount)
        .with_time_budget(params.time_budget)
        .with_progress(progress)
        .run(params.strategy)?;

    let verdicts = genome_verdicts(&matrix, &selection.families(), min_markers);
    let coverage = CoverageSummary::from_verdicts(&verdicts, min_markers);
    info!(
        "Selected {} markers; {} genomes kept, {} discarded",
        selection.len(),
        coverage.genomes_kept,
        coverage.genomes_discarded
    );

    Ok(SelectionOutcome {
        orfs_in: records.len(),
        filtered,
        matrix,
        rare_families_removed,
        selection,
        verdicts,
        coverage,
    })
}

// JSON summary structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub version: String,
    pub input: String,
    pub input_dir: Option<String>,
    pub format: String,
    pub output_dir: String,
    pub params: SelectionParams,
    pub min_markers_threshold: usize,
    pub orfs_in: usize,
    pub orfs_after_copy_filter: usize,
    pub orfs_removed_by_copy_filter: usize,
    pub genomes: usize,
    pub gene_families: usize,
    pub gene_families_removed_rare: usize,
    pub markers_requested: usize,
    pub markers_selected: usize,
    pub markers: Vec<String>,
    pub status: SelectionStatus,
    pub final_score: f64,
    pub genomes_kept: usize,
    pub genomes_discarded: usize,
    pub marker_orfs_in_kept_genomes: u64,
    pub time: f64,
}

/// Load annotations, select markers and write every output of a run
pub fn run(config: &SelectionConfig) -> Result<RunSummary> {
    let start_time = Instant::now();
    let version = env!("CARGO_PKG_VERSION").to_string();
    let quiet = config.quiet;
    let params = &config.params;

    // Fail on bad options before reading any input
    let min_markers_threshold = params.validate()?;

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .context("Failed to initialize thread pool")?;
    }

    if !quiet {
        eprintln!(
            "Marsel v{}; mode: {}; options: k={}, th={}, p={}, min_markers={}, min_genomes={}, threads={}",
            version,
            match params.strategy {
                Strategy::Greedy => "greedy",
                Strategy::Exhaustive => "exhaustive",
            },
            params.k,
            params.threshold,
            params.exponent,
            params.min_markers,
            params.min_genomes,
            config.threads
        );
    }

    let load_start = Instant::now();
    let records = load_annotations(&config.input_path, config.input_dir.as_deref(), config.format)?;
    if !quiet {
        eprintln!(
            "Annotations: {} ORFs from {} ({:.1}s)",
            records.len(),
            config.input_path.display(),
            load_start.elapsed().as_secs_f64()
        );
    }

    let select_start = Instant::now();
    let outcome = select_markers(&records, params, !quiet)
        .context("Marker selection failed")?;
    drop(records);

    if !quiet {
        eprintln!(
            "Matrix: {} genomes, {} gene families ({} rare families dropped)",
            outcome.matrix.n_genomes(),
            outcome.matrix.n_families(),
            outcome.rare_families_removed
        );
        eprintln!(
            "Selected {} of {} markers, score {:.6} ({:.1}s)",
            outcome.selection.len(),
            params.k,
            outcome.selection.final_score(),
            select_start.elapsed().as_secs_f64()
        );
        match outcome.selection.status {
            SelectionStatus::Complete => {}
            SelectionStatus::InsufficientCandidates { requested, available } => eprintln!(
                "Warning: only {} candidate gene families available for {} requested markers",
                available, requested
            ),
            SelectionStatus::TimedOut { requested, selected } => eprintln!(
                "Warning: time limit reached after {} of {} markers",
                selected, requested
            ),
        }
        eprintln!(
            "Genomes: {} kept, {} discarded (minimum {} markers)",
            outcome.coverage.genomes_kept,
            outcome.coverage.genomes_discarded,
            min_markers_threshold
        );
    }

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    let report = outcome.report();
    report.write(&outcome.selection, &config.output_dir)?;
    if !quiet {
        eprintln!("Outputs saved to {:?}", config.output_dir);
    }

    let summary = RunSummary {
        version,
        input: config.input_path.to_string_lossy().to_string(),
        input_dir: config
            .input_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        format: config.format.to_string(),
        output_dir: config.output_dir.to_string_lossy().to_string(),
        params: params.clone(),
        min_markers_threshold,
        orfs_in: outcome.orfs_in,
        orfs_after_copy_filter: outcome.filtered.len(),
        orfs_removed_by_copy_filter: outcome.orfs_in - outcome.filtered.len(),
        genomes: outcome.matrix.n_genomes(),
        gene_families: outcome.matrix.n_families(),
        gene_families_removed_rare: outcome.rare_families_removed,
        markers_requested: params.k,
        markers_selected: outcome.selection.len(),
        markers: outcome.selection.families(),
        status: outcome.selection.status,
        final_score: outcome.selection.final_score(),
        genomes_kept: outcome.coverage.genomes_kept,
        genomes_discarded: outcome.coverage.genomes_discarded,
        marker_orfs_in_kept_genomes: report.total_marker_orfs(),
        time: start_time.elapsed().as_secs_f64(),
    };

    if let Some(summary_file) = &config.summary_path {
        let file = File::create(summary_file)
            .context(format!("Failed to create summary: {:?}", summary_file))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &summary).context("Failed to write summary")?;
        if !quiet {
            eprintln!("Summary saved to {:?}", summary_file);
        }
    }

    Ok(summary)
}
