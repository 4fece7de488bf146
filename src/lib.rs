//! # Marsel
//!
//! Selects a small set of marker gene families that covers a collection of
//! genomes as evenly as possible, starting from per-ORF gene family
//! annotations.
//!
//! This crate provides both a library and a binary for marker selection.
//!
#![doc = include_str!("../README.md")]

pub mod annotations;
pub mod copies;
pub mod coverage;
pub mod error;
pub mod matrix;
pub mod objective;
pub mod optimizer;
pub mod params;
pub mod pipeline;
pub mod record;
pub mod report;

// Re-export the important structures and functions for library users
pub use annotations::{AnnotationFormat, load_annotations};
pub use copies::filter_copies;
pub use coverage::{CoverageSummary, GenomeVerdict, MinMarkers, genome_verdicts};
pub use error::MarselError;
pub use matrix::OccurrenceMatrix;
pub use objective::{DEFAULT_PSEUDOCOUNT, Exponent};
pub use optimizer::{Optimizer, SelectedMarker, Selection, SelectionStatus, Strategy};
pub use params::{DEFAULT_MARKERS, DEFAULT_THRESHOLD, SelectionParams};
pub use pipeline::{RunSummary, SelectionOutcome, select_markers};
pub use record::AnnotationRecord;
pub use report::MarkerReport;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a file-driven selection run
pub struct SelectionConfig {
    /// Annotation file, or a list of genome names when `input_dir` is set
    pub input_path: PathBuf,

    /// Directory holding one annotation file per listed genome
    pub input_dir: Option<PathBuf>,

    /// Annotation table layout
    pub format: AnnotationFormat,

    /// Directory receiving `orfs/` and `statistics/`
    pub output_dir: PathBuf,

    /// Path to JSON summary file
    pub summary_path: Option<PathBuf>,

    pub params: SelectionParams,

    /// Suppress progress reporting
    pub quiet: bool,

    /// Number of execution threads (0 = auto)
    pub threads: usize,
}

impl SelectionConfig {
    /// Create a new selection configuration for the given input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Self {
        Self {
            input_path: input_path.as_ref().to_path_buf(),
            input_dir: None,
            format: AnnotationFormat::default(),
            output_dir: PathBuf::from("marsel_output"),
            summary_path: None,
            params: SelectionParams::default(),
            quiet: false,
            threads: 0,
        }
    }

    /// Read `input_path` as a file list resolved against this directory
    pub fn with_input_dir<P: AsRef<Path>>(mut self, input_dir: P) -> Self {
        self.input_dir = Some(input_dir.as_ref().to_path_buf());
        self
    }

    pub fn with_format(mut self, format: AnnotationFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output directory
    pub fn with_output_dir<P: AsRef<Path>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }

    /// Set the summary path
    pub fn with_summary<P: AsRef<Path>>(mut self, summary_path: P) -> Self {
        self.summary_path = Some(summary_path.as_ref().to_path_buf());
        self
    }

    /// Replace all selection parameters at once
    pub fn with_params(mut self, params: SelectionParams) -> Self {
        self.params = params;
        self
    }

    /// Set the number of markers
    pub fn with_k(mut self, k: usize) -> Self {
        self.params.k = k;
        self
    }

    /// Set the copy filter threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.params.threshold = threshold;
        self
    }

    pub fn with_exponent(mut self, exponent: Exponent) -> Self {
        self.params.exponent = exponent;
        self
    }

    pub fn with_min_markers(mut self, min_markers: MinMarkers) -> Self {
        self.params.min_markers = min_markers;
        self
    }

    pub fn with_min_genomes(mut self, min_genomes: usize) -> Self {
        self.params.min_genomes = min_genomes;
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.params.time_budget = Some(time_budget);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.params.strategy = strategy;
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set the num threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Execute the selection with this configuration
    pub fn execute(&self) -> Result<RunSummary> {
        pipeline::run(self)
    }
}
