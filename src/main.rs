use anyhow::{Context, Result};
use clap::Parser;
use marsel::{
    AnnotationFormat, DEFAULT_MARKERS, DEFAULT_PSEUDOCOUNT, DEFAULT_THRESHOLD, Exponent,
    MinMarkers, SelectionConfig, SelectionParams, Strategy,
};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MIN_GENOMES: usize = 4;

/// Parse a positive number of seconds into a duration
fn parse_time_limit(s: &str) -> Result<Duration> {
    let seconds: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid time limit: {}", s))?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(anyhow::anyhow!(
            "Invalid time limit: {} (must be a positive number of seconds)",
            s
        ));
    }
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("Invalid time limit: {} (too large)", s))
}

#[derive(Parser)]
#[command(author, version, about = "Select marker gene families that cover a genome collection evenly", long_about = None)]
struct Cli {
    /// Annotation file, or a list of genome names when --input-dir is given
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Directory containing one annotation file per listed genome
    #[arg(long = "input-dir")]
    input_dir: Option<PathBuf>,

    /// Annotation file layout
    #[arg(short = 'f', long = "format", default_value = "canonical", value_parser = ["canonical", "eggnog", "kegg"])]
    format: String,

    /// Output directory for ORF tables and statistics
    #[arg(short = 'o', long = "output-dir", default_value = "marsel_output")]
    output_dir: PathBuf,

    /// Number of markers to select
    #[arg(short = 'k', long = "markers", default_value_t = DEFAULT_MARKERS)]
    k: usize,

    /// Keep copies scoring at least this fraction of the best copy per genome and family (0-1)
    #[arg(long = "threshold", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Power mean exponent: a number, "min" or "max" (0 = geometric mean)
    #[arg(short = 'p', long = "exponent", default_value = "0", allow_hyphen_values = true)]
    exponent: Exponent,

    /// Minimum markers per kept genome: a count, a percentage of k ("50%") or a fraction ("0.5")
    #[arg(long = "min-markers", default_value = "1")]
    min_markers: MinMarkers,

    /// Ignore gene families present in fewer genomes than this
    #[arg(long = "min-genomes", default_value_t = DEFAULT_MIN_GENOMES)]
    min_genomes: usize,

    /// Value added to every genome's coverage before averaging
    #[arg(long = "pseudocount", default_value_t = DEFAULT_PSEUDOCOUNT)]
    pseudocount: f64,

    /// Stop the greedy search after this many seconds
    #[arg(long = "time-limit")]
    time_limit: Option<String>,

    /// Score every combination of k gene families instead of searching greedily
    #[arg(long = "exhaustive", default_value_t = false)]
    exhaustive: bool,

    /// Path to JSON summary file
    #[arg(short = 's', long = "summary")]
    summary: Option<PathBuf>,

    /// Number of execution threads (0 = auto)
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,

    /// Suppress progress reporting
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let format: AnnotationFormat = cli.format.parse()?;

    let mut params = SelectionParams::default()
        .with_k(cli.k)
        .with_threshold(cli.threshold)
        .with_exponent(cli.exponent)
        .with_min_markers(cli.min_markers)
        .with_min_genomes(cli.min_genomes)
        .with_pseudocount(cli.pseudocount)
        .with_strategy(if cli.exhaustive {
            Strategy::Exhaustive
        } else {
            Strategy::Greedy
        });
    if let Some(limit) = &cli.time_limit {
        params = params.with_time_budget(parse_time_limit(limit)?);
    }

    let mut config = SelectionConfig::new(&cli.input)
        .with_format(format)
        .with_output_dir(&cli.output_dir)
        .with_params(params)
        .with_quiet(cli.quiet)
        .with_threads(cli.threads);
    if let Some(input_dir) = &cli.input_dir {
        config = config.with_input_dir(input_dir);
    }
    if let Some(summary) = &cli.summary {
        config = config.with_summary(summary);
    }

    config.execute().context("Failed to select markers")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_limit() {
        assert_eq!(parse_time_limit("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_time_limit("0").is_err());
        assert!(parse_time_limit("-3").is_err());
        assert!(parse_time_limit("soon").is_err());
        assert!(parse_time_limit("1e30").is_err());
    }

    #[test]
    fn test_cli_parses_negative_exponent() {
        let cli = Cli::try_parse_from(["marsel", "-i", "in.tsv", "-p", "-1", "--min-markers", "50%"])
            .unwrap();
        assert_eq!(cli.exponent, Exponent::Power(-1.0));
        assert_eq!(cli.min_markers, MinMarkers::Fraction(0.5));
        assert_eq!(cli.min_genomes, DEFAULT_MIN_GENOMES);
    }
}
