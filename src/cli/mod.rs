use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bio::fasta::SequenceIndex;
use crate::config::{self, Config};
use crate::filter::{FilterConfig, HitStreamFilter};
use crate::tools::blast::{BlastProgram, BlastRunner};

#[derive(Parser, Debug)]
#[command(
    name = "blastscreen",
    version,
    about = "Run a BLAST+ search and post-process the hits into a filtered, annotated report",
    long_about = "Blastscreen wraps the BLAST+ command-line tools: it formats a database when \
                  needed, runs the search with a fixed tabular output layout, then filters the \
                  hits by identity and query coverage, caps hits per query, computes a query \
                  coverage column, and optionally appends the query sequence to each surviving \
                  row. Requires BLAST+ on PATH."
)]
pub struct Cli {
    /// Query FASTA file
    #[arg(short = 'q', long, value_name = "FILE")]
    pub query: PathBuf,

    /// Final report path (default: <query file name>_blast.out)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// FASTA file to format as a BLAST database
    #[arg(short = 'd', long, value_name = "FILE", conflicts_with = "database")]
    pub database_fasta: Option<PathBuf>,

    /// Prefix of a BLAST database that has already been formatted
    #[arg(long, value_name = "PREFIX")]
    pub database: Option<PathBuf>,

    /// Maximum e-value for the search [default: 1e-5]
    #[arg(short = 'e', long, value_name = "EVALUE")]
    pub evalue: Option<f64>,

    /// Hits considered per query before thresholding [default: 1]
    #[arg(short = 'm', long = "max-target-seqs", value_name = "N")]
    pub max_target_seqs: Option<usize>,

    /// Threads used by the BLAST+ search [default: 3]
    #[arg(short = 'n', long = "num-threads", value_name = "N")]
    pub num_threads: Option<usize>,

    /// BLAST program: blastp, blastn, blastx or tblastn [default: blastp]
    #[arg(short = 'b', long, value_name = "PROGRAM")]
    pub program: Option<BlastProgram>,

    /// Minimum percent identity for a hit to be kept [default: 0]
    #[arg(long = "identity", value_name = "PCT")]
    pub identity_threshold: Option<f64>,

    /// Minimum query coverage percentage for a hit to be kept [default: 0]
    #[arg(long = "qcov", value_name = "PCT")]
    pub coverage_threshold: Option<f64>,

    /// Omit the query sequence column from the report
    #[arg(long = "no-qseq")]
    pub no_qseq: bool,

    /// Configuration file (TOML); command-line flags take precedence
    #[arg(short = 'c', long, value_name = "FILE", env = "BLASTSCREEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log level for the tracing filter: `BLASTSCREEN_LOG` provides the
/// baseline, and each `-v` raises it (debug, then trace)
pub fn log_level(verbose: u8) -> String {
    match verbose {
        0 => std::env::var("BLASTSCREEN_LOG").unwrap_or_else(|_| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    let program = match &cli.program {
        Some(program) => *program,
        None => config
            .blast
            .program
            .parse::<BlastProgram>()
            .map_err(crate::ScreenError::Config)?,
    };

    let output = cli.output.clone().unwrap_or_else(|| {
        let name = cli
            .query
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "query".to_string());
        PathBuf::from(format!("{}_blast.out", name))
    });

    let runner = BlastRunner::new(program, config.blast.evalue, config.blast.num_threads);
    let version = runner
        .check_version()
        .map_err(|e| crate::ScreenError::Tool(format!("{:#}", e)))?;
    info!("{}", version.lines().next().unwrap_or(&version));

    let database = resolve_database(&cli, &runner)?;

    // Raw search output lands in a temp file beside the report
    let search_tmp = PathBuf::from(format!("{}_blast.tmp", output.display()));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(format!("Running {} search...", program));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    runner
        .search(&cli.query, &database, &search_tmp)
        .map_err(|e| crate::ScreenError::Tool(format!("{:#}", e)))?;
    spinner.finish_with_message("Search complete");

    let index = if config.filter.include_query_sequence {
        let index = SequenceIndex::from_path(&cli.query)
            .with_context(|| format!("indexing query sequences from {:?}", cli.query))?;
        info!("indexed {} query sequences", index.len());
        Some(index)
    } else {
        None
    };

    let rows = write_report(&search_tmp, &output, &config.filter, index.as_ref());
    fs::remove_file(&search_tmp).ok();
    let rows = rows?;

    if rows == 0 {
        println!(
            "{} no hits passed the filters; {} is empty",
            "Done:".green().bold(),
            output.display()
        );
    } else {
        println!(
            "{} {} rows written to {}",
            "Done:".green().bold(),
            rows,
            output.display()
        );
    }
    Ok(())
}

/// Merge the optional config file with command-line overrides
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        config::load_config(path)
            .with_context(|| format!("loading configuration from {:?}", path))?
    } else {
        config::default_config()
    };

    if let Some(threshold) = cli.identity_threshold {
        config.filter.identity_threshold = threshold;
    }
    if let Some(threshold) = cli.coverage_threshold {
        config.filter.coverage_threshold = threshold;
    }
    if let Some(max_hits) = cli.max_target_seqs {
        config.filter.max_hits_per_query = max_hits;
    }
    if cli.no_qseq {
        config.filter.include_query_sequence = false;
    }
    if let Some(evalue) = cli.evalue {
        config.blast.evalue = evalue;
    }
    if let Some(threads) = cli.num_threads {
        config.blast.num_threads = threads;
    }

    if config.filter.max_hits_per_query < 1 {
        bail!("max hits per query must be at least 1");
    }
    if config.filter.identity_threshold < 0.0 || config.filter.coverage_threshold < 0.0 {
        bail!("identity and coverage thresholds must be non-negative");
    }

    Ok(config)
}

/// Use an existing database prefix, or format one from the given FASTA
fn resolve_database(cli: &Cli, runner: &BlastRunner) -> Result<PathBuf> {
    if let Some(fasta) = &cli.database_fasta {
        let prefix = std::env::current_dir()?.join(format!("{}.db", fasta.display()));
        if BlastRunner::database_exists(&prefix) {
            info!("reusing BLAST database at {:?}", prefix);
        } else {
            runner
                .make_database(fasta, &prefix)
                .map_err(|e| crate::ScreenError::Tool(format!("{:#}", e)))?;
        }
        Ok(prefix)
    } else if let Some(database) = &cli.database {
        Ok(database.clone())
    } else {
        bail!("either --database-fasta or --database is required");
    }
}

/// Filter the raw search output into the final report.
///
/// The report is assembled in a scratch file beside the destination and
/// moved into place only when the whole pass succeeds, so an abort never
/// leaves a half-written report at the final path. A pass with zero
/// qualifying rows finalizes as a zero-byte file.
fn write_report(
    search_output: &Path,
    destination: &Path,
    config: &FilterConfig,
    index: Option<&SequenceIndex>,
) -> Result<usize> {
    let input = fs::File::open(search_output)
        .with_context(|| format!("opening search output {:?}", search_output))?;
    let reader = BufReader::new(input);

    let scratch = PathBuf::from(format!("{}.partial", destination.display()));
    let writer = BufWriter::new(fs::File::create(&scratch)?);

    let mut filter = HitStreamFilter::new(config);
    if let Some(index) = index {
        filter = filter.with_index(index);
    }

    let rows = match filter.run(reader, writer) {
        Ok(rows) => rows,
        Err(e) => {
            fs::remove_file(&scratch).ok();
            return Err(e.into());
        }
    };

    fs::rename(&scratch, destination)
        .with_context(|| format!("finalizing report at {:?}", destination))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_raises_log_level() {
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(2), "trace");
        assert_eq!(log_level(7), "trace");
    }
}
