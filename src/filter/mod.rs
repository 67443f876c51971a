use crate::bio::fasta::SequenceIndex;
use crate::{Result, ScreenError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Number of columns in the fixed tabular layout produced by the search
pub const HIT_FIELD_COUNT: usize = 14;

/// Report column names, minus the optional trailing `qseq`
const REPORT_HEADER: [&str; 15] = [
    "qid", "sid", "ident%", "aln_len", "miss", "gap", "qstart", "qend", "sstart", "send", "qlen",
    "slen", "evalue", "bitscore", "qcov%",
];

/// Immutable parameters for one filtering pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum percent identity for a hit to be kept
    pub identity_threshold: f64,
    /// Minimum query coverage percentage for a hit to be kept
    pub coverage_threshold: f64,
    /// Hits considered per query, in input order, before any thresholding
    pub max_hits_per_query: usize,
    /// Append the query sequence text as a trailing `qseq` column
    pub include_query_sequence: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            identity_threshold: 0.0,
            coverage_threshold: 0.0,
            max_hits_per_query: 1,
            include_query_sequence: true,
        }
    }
}

/// One alignment hit in the fixed 14-column tabular layout.
///
/// Column text is kept verbatim so the report reproduces the search tool's
/// own number formatting. The four fields used in computation are parsed up
/// front, so a bad row fails as `MalformedRecord` at parse time instead of
/// partway through the pass.
#[derive(Debug, Clone)]
pub struct HitRecord {
    pub query_id: String,
    pub subject_id: String,
    pub identity: String,
    pub alignment_length: String,
    pub mismatches: String,
    pub gap_opens: String,
    pub query_start: String,
    pub query_end: String,
    pub subject_start: String,
    pub subject_end: String,
    pub query_length: String,
    pub subject_length: String,
    pub evalue: String,
    pub bit_score: String,

    pub pident: f64,
    pub qstart: f64,
    pub qend: f64,
    pub qlen: f64,
}

impl HitRecord {
    /// Split a tab-separated line into the fixed 14-column record
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != HIT_FIELD_COUNT {
            return Err(ScreenError::MalformedRecord {
                line: line_number,
                reason: format!(
                    "expected {} tab-separated columns, found {}",
                    HIT_FIELD_COUNT,
                    fields.len()
                ),
            });
        }

        let numeric = |index: usize, name: &str| -> Result<f64> {
            fields[index].parse::<f64>().map_err(|_| ScreenError::MalformedRecord {
                line: line_number,
                reason: format!("column {} ({}) is not numeric: {:?}", index + 1, name, fields[index]),
            })
        };

        let pident = numeric(2, "pident")?;
        let qstart = numeric(6, "qstart")?;
        let qend = numeric(7, "qend")?;
        let qlen = numeric(10, "qlen")?;
        if qlen == 0.0 {
            // Coverage divides by qlen; a zero here would otherwise leak
            // inf/NaN through the threshold checks into the report
            return Err(ScreenError::MalformedRecord {
                line: line_number,
                reason: "column 11 (qlen) must be non-zero".to_string(),
            });
        }

        Ok(Self {
            query_id: fields[0].to_string(),
            subject_id: fields[1].to_string(),
            identity: fields[2].to_string(),
            alignment_length: fields[3].to_string(),
            mismatches: fields[4].to_string(),
            gap_opens: fields[5].to_string(),
            query_start: fields[6].to_string(),
            query_end: fields[7].to_string(),
            subject_start: fields[8].to_string(),
            subject_end: fields[9].to_string(),
            query_length: fields[10].to_string(),
            subject_length: fields[11].to_string(),
            evalue: fields[12].to_string(),
            bit_score: fields[13].to_string(),
            pident,
            qstart,
            qend,
            qlen,
        })
    }

    /// Query coverage percentage, `100 * (qend - qstart) / qlen`
    pub fn query_coverage(&self) -> f64 {
        100.0 * (self.qend - self.qstart) / self.qlen
    }

    fn columns(&self) -> [&str; HIT_FIELD_COUNT] {
        [
            self.query_id.as_str(),
            self.subject_id.as_str(),
            self.identity.as_str(),
            self.alignment_length.as_str(),
            self.mismatches.as_str(),
            self.gap_opens.as_str(),
            self.query_start.as_str(),
            self.query_end.as_str(),
            self.subject_start.as_str(),
            self.subject_end.as_str(),
            self.query_length.as_str(),
            self.subject_length.as_str(),
            self.evalue.as_str(),
            self.bit_score.as_str(),
        ]
    }
}

/// Single-pass filter over query-grouped hit records.
///
/// Precondition: records sharing a query id are contiguous in the input
/// (the search tool emits them that way). Only transitions between adjacent
/// records are tracked, so non-contiguous grouping silently breaks the
/// per-query cap.
///
/// The per-query cap is applied BEFORE the identity/coverage thresholds:
/// a low-quality hit still consumes a cap slot before being dropped.
/// Downstream consumers rely on this ordering; changing it is a behavior
/// change, not a fix.
pub struct HitStreamFilter<'a> {
    config: &'a FilterConfig,
    index: Option<&'a SequenceIndex>,
}

impl<'a> HitStreamFilter<'a> {
    pub fn new(config: &'a FilterConfig) -> Self {
        Self { config, index: None }
    }

    /// Supply a sequence index for the `qseq` annotation column
    pub fn with_index(mut self, index: &'a SequenceIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Run the pass, returning the number of data rows written.
    ///
    /// The header line is emitted lazily before the first passing row, so a
    /// run with zero qualifying hits produces zero bytes of output.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<usize> {
        let annotate = self.config.include_query_sequence && self.index.is_some();
        let mut rows_written = 0usize;
        let mut current_query = String::new();
        let mut hits_for_query = 0usize;

        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let record = HitRecord::parse(&line, index + 1)?;

            if record.query_id == current_query {
                hits_for_query += 1;
                if hits_for_query > self.config.max_hits_per_query {
                    // Over the cap: never evaluated against thresholds
                    continue;
                }
            } else {
                current_query.clear();
                current_query.push_str(&record.query_id);
                hits_for_query = 1;
            }

            let coverage = record.query_coverage();
            if record.pident < self.config.identity_threshold
                || coverage < self.config.coverage_threshold
            {
                // Dropped by quality, but the cap slot above is already spent
                continue;
            }

            if rows_written == 0 {
                self.write_header(&mut output, annotate)?;
            }
            self.write_row(&mut output, &record, coverage, annotate)?;
            rows_written += 1;
        }

        output.flush()?;
        Ok(rows_written)
    }

    fn write_header<W: Write>(&self, output: &mut W, annotate: bool) -> Result<()> {
        let mut columns: Vec<&str> = REPORT_HEADER.to_vec();
        if annotate {
            columns.push("qseq");
        }
        writeln!(output, "{}", columns.join("\t"))?;
        Ok(())
    }

    fn write_row<W: Write>(
        &self,
        output: &mut W,
        record: &HitRecord,
        coverage: f64,
        annotate: bool,
    ) -> Result<()> {
        let mut row = record.columns().join("\t");
        row.push('\t');
        row.push_str(&format!("{:.1}", coverage));
        if annotate {
            // An identifier absent from the index is an empty annotation,
            // not an error
            let sequence = self
                .index
                .and_then(|index| index.get(&record.query_id))
                .unwrap_or("");
            row.push('\t');
            row.push_str(sequence);
        }
        writeln!(output, "{}", row)?;
        Ok(())
    }
}
