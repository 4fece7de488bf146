//! Readers turning gene family annotation tables into [`AnnotationRecord`]s.
//!
//! Three tab-separated layouts are understood:
//!
//! - canonical: `orf_id  bit_score  gene_family`
//! - eggNOG-mapper `.emapper.annotations`: bit score in column 4, gene family
//!   is the most basal orthologous group of column 5
//! - KEGG (KofamScan-style `.tsv`): KO in column 2, bit score in column 4
//!
//! Lines starting with `#` are ignored. The genome of an ORF is the part of its
//! identifier before the first underscore. Compressed inputs (xz, gzip, zstd)
//! are recognised by their magic bytes.

use crate::error::MarselError;
use crate::record::{AnnotationRecord, genome_from_orf};
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use liblzma::read::XzDecoder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Layout of an annotation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationFormat {
    #[default]
    Canonical,
    Eggnog,
    Kegg,
}

impl AnnotationFormat {
    /// Suffix appended to names in a file list
    pub fn list_suffix(&self) -> &'static str {
        match self {
            AnnotationFormat::Canonical => "",
            AnnotationFormat::Eggnog => ".emapper.annotations",
            AnnotationFormat::Kegg => ".tsv",
        }
    }

    /// Column indices of (orf, bit score, gene family)
    fn columns(&self) -> (usize, usize, usize) {
        match self {
            AnnotationFormat::Canonical => (0, 1, 2),
            AnnotationFormat::Eggnog => (0, 3, 4),
            AnnotationFormat::Kegg => (0, 3, 1),
        }
    }

    fn gene_family<'a>(&self, field: &'a str) -> &'a str {
        match self {
            // "COG0001@1|root,COG0001@2|Bacteria" -> "COG0001"
            AnnotationFormat::Eggnog => field
                .split('|')
                .next()
                .and_then(|og| og.split('@').next())
                .unwrap_or(field),
            _ => field,
        }
    }
}

impl FromStr for AnnotationFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" => Ok(AnnotationFormat::Canonical),
            "eggnog" => Ok(AnnotationFormat::Eggnog),
            "kegg" => Ok(AnnotationFormat::Kegg),
            _ => Err(anyhow::anyhow!(
                "Unknown annotation format {:?}. Choose canonical, eggnog or kegg.",
                s
            )),
        }
    }
}

impl fmt::Display for AnnotationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationFormat::Canonical => "canonical",
            AnnotationFormat::Eggnog => "eggnog",
            AnnotationFormat::Kegg => "kegg",
        };
        write!(f, "{}", name)
    }
}

enum Codec {
    Plain,
    Xz,
    Gzip,
    Zstd,
}

/// Open a possibly compressed file for reading
pub fn open_decompressed(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open annotation file: {}", path.display()))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let head = reader
        .fill_buf()
        .with_context(|| format!("Failed to read annotation file: {}", path.display()))?;

    let codec = if head.starts_with(XZ_MAGIC) {
        Codec::Xz
    } else if head.starts_with(GZIP_MAGIC) {
        Codec::Gzip
    } else if head.starts_with(ZSTD_MAGIC) {
        Codec::Zstd
    } else {
        Codec::Plain
    };

    let decoded: Box<dyn Read + Send> = match codec {
        Codec::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
        Codec::Gzip => Box::new(MultiGzDecoder::new(reader)),
        Codec::Zstd => Box::new(
            zstd::stream::read::Decoder::with_buffer(reader)
                .context("Failed to initialise zstd decoder")?,
        ),
        Codec::Plain => Box::new(reader),
    };
    Ok(decoded)
}

/// Parse one annotation table.
///
/// Malformed records abort the whole table; the diagnostic names the record,
/// the file and the line.
pub fn parse_annotations<R: Read>(
    reader: R,
    source_file: &str,
    format: AnnotationFormat,
) -> Result<Vec<AnnotationRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let (orf_col, score_col, family_col) = format.columns();
    let mut records = Vec::new();

    for (index, row) in csv_reader.records().enumerate() {
        let row = row.with_context(|| format!("Failed to read a line of {}", source_file))?;
        let line = row.position().map_or(0, |p| p.line());

        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let field = |col: usize| row.get(col).map(str::trim).unwrap_or("");
        let orf_id = field(orf_col);
        let malformed = |reason: String| MarselError::MalformedRecord {
            index,
            orf_id: orf_id.to_string(),
            reason: format!("{} ({}:{})", reason, source_file, line),
        };

        if row.len() <= orf_col.max(score_col).max(family_col) {
            return Err(malformed(format!(
                "expected at least {} {} columns, found {}",
                orf_col.max(score_col).max(family_col) + 1,
                format,
                row.len()
            ))
            .into());
        }

        let bit_score: f64 = field(score_col)
            .parse()
            .map_err(|_| malformed(format!("invalid bit score {:?}", field(score_col))))?;

        let record = AnnotationRecord {
            orf_id: orf_id.to_string(),
            genome_id: genome_from_orf(orf_id).to_string(),
            source_file: source_file.to_string(),
            bit_score,
            gene_family: format.gene_family(field(family_col)).to_string(),
        };
        record.validate(index)?;
        records.push(record);
    }

    Ok(records)
}

/// Read and parse a single annotation file
pub fn load_annotation_file(path: &Path, format: AnnotationFormat) -> Result<Vec<AnnotationRecord>> {
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let reader = open_decompressed(path)?;
    parse_annotations(reader, &source_file, format)
        .with_context(|| format!("Failed to parse annotation file: {}", path.display()))
}

/// Resolve the entries of a file list against an input directory.
///
/// Compressed variants (`.xz`, `.gz`, `.zst`) are picked up when the plain
/// name does not exist.
pub fn resolve_file_list(
    list_path: &Path,
    input_dir: &Path,
    format: AnnotationFormat,
) -> Result<Vec<PathBuf>> {
    let list = std::fs::read_to_string(list_path)
        .with_context(|| format!("Failed to read file list: {}", list_path.display()))?;

    let mut paths = Vec::new();
    for name in list.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let base = input_dir.join(format!("{}{}", name, format.list_suffix()));
        let candidates = [
            base.clone(),
            PathBuf::from(format!("{}.xz", base.display())),
            PathBuf::from(format!("{}.gz", base.display())),
            PathBuf::from(format!("{}.zst", base.display())),
        ];
        let path = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| anyhow::anyhow!("Annotation file does not exist: {}", base.display()))?;
        paths.push(path);
    }

    if paths.is_empty() {
        return Err(anyhow::anyhow!(
            "File list contains no annotation files: {}",
            list_path.display()
        ));
    }
    Ok(paths)
}

/// Load annotations from one file, or from every file named in a list when an
/// input directory is given. Files are parsed in parallel; record order
/// follows the list.
pub fn load_annotations(
    input: &Path,
    input_dir: Option<&Path>,
    format: AnnotationFormat,
) -> Result<Vec<AnnotationRecord>> {
    if !input.exists() {
        return Err(anyhow::anyhow!("Input file does not exist: {}", input.display()));
    }

    let Some(input_dir) = input_dir else {
        return load_annotation_file(input, format);
    };

    let paths = resolve_file_list(input, input_dir, format)?;
    let per_file: Vec<Vec<AnnotationRecord>> = paths
        .par_iter()
        .map(|path| load_annotation_file(path, format))
        .collect::<Result<_>>()?;

    let mut records = Vec::with_capacity(per_file.iter().map(Vec::len).sum());
    for batch in per_file {
        records.extend(batch);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    const CANONICAL: &str = "# orf\tscore\tfamily\nG1_1\t120.5\tK00001\nG1_2\t80\tK00002\n\nG2_1\t99.9\tK00001\n";

    #[test]
    fn test_parse_canonical() {
        let records =
            parse_annotations(CANONICAL.as_bytes(), "sample.tsv", AnnotationFormat::Canonical).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            AnnotationRecord::new("G1_1", "G1", "sample.tsv", 120.5, "K00001")
        );
        assert_eq!(records[2].genome_id, "G2");
    }

    #[test]
    fn test_parse_eggnog() {
        let line = "G7_12\t1234.SEED\t1e-50\t210.3\tCOG0012@1|root,COG0012@2|Bacteria\tX\n";
        let records =
            parse_annotations(line.as_bytes(), "G7.emapper.annotations", AnnotationFormat::Eggnog)
                .unwrap();
        assert_eq!(records[0].gene_family, "COG0012");
        assert_eq!(records[0].bit_score, 210.3);
        assert_eq!(records[0].genome_id, "G7");
    }

    #[test]
    fn test_parse_kegg() {
        let line = "G3_5\tK02946\t150.0\t301.2\t1.2e-90\n";
        let records = parse_annotations(line.as_bytes(), "G3.tsv", AnnotationFormat::Kegg).unwrap();
        assert_eq!(records[0].gene_family, "K02946");
        assert_eq!(records[0].bit_score, 301.2);
    }

    #[test]
    fn test_bad_score_is_malformed() {
        let input = "G1_1\t10\tK1\nG1_2\tnot-a-number\tK1\n";
        let err = parse_annotations(input.as_bytes(), "bad.tsv", AnnotationFormat::Canonical)
            .unwrap_err();
        match err.downcast_ref::<MarselError>() {
            Some(MarselError::MalformedRecord { index, orf_id, reason }) => {
                assert_eq!(*index, 1);
                assert_eq!(orf_id, "G1_2");
                assert!(reason.contains("bad.tsv:2"));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns_and_negative_scores() {
        let short = "G1_1\t10\n";
        assert!(parse_annotations(short.as_bytes(), "s.tsv", AnnotationFormat::Canonical).is_err());
        let negative = "G1_1\t-3\tK1\n";
        assert!(parse_annotations(negative.as_bytes(), "n.tsv", AnnotationFormat::Canonical).is_err());
    }

    #[test]
    fn test_gzip_and_file_list() {
        let dir = tempdir().unwrap();

        let plain = dir.path().join("G1.tsv");
        std::fs::write(&plain, "G1_1\tK1\t1\t50.0\n").unwrap();

        let compressed = dir.path().join("G2.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&compressed).unwrap(), Compression::default());
        encoder.write_all(b"G2_1\tK1\t1\t40.0\nG2_2\tK2\t1\t30.0\n").unwrap();
        encoder.finish().unwrap();

        let list = dir.path().join("genomes.txt");
        std::fs::write(&list, "G1\nG2\n\n").unwrap();

        let records = load_annotations(&list, Some(dir.path()), AnnotationFormat::Kegg).unwrap();
        let orfs: Vec<&str> = records.iter().map(|r| r.orf_id.as_str()).collect();
        assert_eq!(orfs, vec!["G1_1", "G2_1", "G2_2"]);
        assert_eq!(records[1].source_file, "G2.tsv.gz");
    }

    #[test]
    fn test_xz_and_zstd_files() {
        let dir = tempdir().unwrap();

        // Two concatenated xz streams
        let xz_path = dir.path().join("G1.tsv.xz");
        let mut xz_bytes = Vec::new();
        for chunk in ["G1_1\t120.5\tK00001\n", "G1_2\t80\tK00002\n"] {
            let mut encoder = liblzma::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(chunk.as_bytes()).unwrap();
            xz_bytes.extend(encoder.finish().unwrap());
        }
        std::fs::write(&xz_path, xz_bytes).unwrap();

        let records = load_annotation_file(&xz_path, AnnotationFormat::Canonical).unwrap();
        let orfs: Vec<&str> = records.iter().map(|r| r.orf_id.as_str()).collect();
        assert_eq!(orfs, vec!["G1_1", "G1_2"]);
        assert_eq!(records[1].gene_family, "K00002");
        assert_eq!(records[0].source_file, "G1.tsv.xz");

        let zstd_path = dir.path().join("G2.tsv.zst");
        let mut encoder = zstd::stream::write::Encoder::new(File::create(&zstd_path).unwrap(), 0)
            .unwrap();
        encoder.write_all(CANONICAL.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let records = load_annotation_file(&zstd_path, AnnotationFormat::Canonical).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            AnnotationRecord::new("G1_1", "G1", "G2.tsv.zst", 120.5, "K00001")
        );
        assert_eq!(records[2].orf_id, "G2_1");
    }

    #[test]
    fn test_missing_listed_file() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("genomes.txt");
        std::fs::write(&list, "absent\n").unwrap();
        assert!(load_annotations(&list, Some(dir.path()), AnnotationFormat::Eggnog).is_err());
    }

    #[test]
    fn test_format_names() {
        assert_eq!("EggNOG".parse::<AnnotationFormat>().unwrap(), AnnotationFormat::Eggnog);
        assert_eq!(AnnotationFormat::Kegg.to_string(), "kegg");
        assert!("pfam".parse::<AnnotationFormat>().is_err());
    }
}
