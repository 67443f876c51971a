use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info};

/// Tabular layout consumed by the hit filter. Column positions are fixed;
/// exposing this as an option would break parsing downstream, so it is a
/// constant.
pub const OUTFMT: &str = "6 qseqid sseqid pident length mismatch gapopen qstart qend sstart send qlen slen evalue bitscore";

/// BLAST+ search programs supported by the wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlastProgram {
    Blastp,
    Blastn,
    Blastx,
    Tblastn,
}

impl BlastProgram {
    /// Database type expected by makeblastdb for this program
    pub fn db_type(&self) -> &'static str {
        match self {
            BlastProgram::Blastp | BlastProgram::Blastx => "prot",
            BlastProgram::Blastn | BlastProgram::Tblastn => "nucl",
        }
    }

    pub fn binary(&self) -> &'static str {
        match self {
            BlastProgram::Blastp => "blastp",
            BlastProgram::Blastn => "blastn",
            BlastProgram::Blastx => "blastx",
            BlastProgram::Tblastn => "tblastn",
        }
    }
}

impl FromStr for BlastProgram {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blastp" => Ok(BlastProgram::Blastp),
            "blastn" => Ok(BlastProgram::Blastn),
            "blastx" => Ok(BlastProgram::Blastx),
            "tblastn" => Ok(BlastProgram::Tblastn),
            _ => Err(format!(
                "unknown BLAST program: {} (expected blastp, blastn, blastx or tblastn)",
                s
            )),
        }
    }
}

impl fmt::Display for BlastProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// BLAST+ integration: formats databases and runs searches through the
/// installed command-line tools
pub struct BlastRunner {
    program: BlastProgram,
    evalue: f64,
    num_threads: usize,
}

impl BlastRunner {
    pub fn new(program: BlastProgram, evalue: f64, num_threads: usize) -> Self {
        Self {
            program,
            evalue,
            num_threads,
        }
    }

    /// Check that the BLAST+ installation is reachable
    pub fn check_version(&self) -> Result<String> {
        let output = Command::new(self.program.binary())
            .arg("-version")
            .output()
            .with_context(|| format!("failed to run {} (is BLAST+ on PATH?)", self.program))?;

        if !output.status.success() {
            anyhow::bail!("{} -version returned an error", self.program);
        }

        let version = String::from_utf8_lossy(&output.stdout);
        Ok(version.trim().to_string())
    }

    /// True when a formatted database already exists at this prefix
    pub fn database_exists(prefix: &Path) -> bool {
        ["phr", "nhr"]
            .iter()
            .any(|ext| PathBuf::from(format!("{}.{}", prefix.display(), ext)).exists())
    }

    /// Format a FASTA file into a BLAST database
    pub fn make_database(&self, fasta: &Path, out: &Path) -> Result<()> {
        info!("building {} BLAST database from {:?}", self.program.db_type(), fasta);

        let mut cmd = Command::new("makeblastdb");
        cmd.arg("-in")
            .arg(fasta)
            .arg("-dbtype")
            .arg(self.program.db_type())
            .arg("-parse_seqids")
            .arg("-out")
            .arg(out);
        debug!("executing {:?}", cmd);

        let status = cmd
            .status()
            .context("failed to run makeblastdb (is BLAST+ on PATH?)")?;
        if !status.success() {
            anyhow::bail!("makeblastdb failed with exit code {:?}", status.code());
        }
        Ok(())
    }

    /// Run the search, writing the fixed 14-column tabular output
    pub fn search(&self, query: &Path, database: &Path, output: &Path) -> Result<()> {
        info!("running {} against {:?}", self.program, database);

        let mut cmd = Command::new(self.program.binary());
        cmd.arg("-query")
            .arg(query)
            .arg("-out")
            .arg(output)
            .arg("-db")
            .arg(database)
            .arg("-evalue")
            .arg(format!("{:e}", self.evalue))
            .arg("-outfmt")
            .arg(OUTFMT)
            .arg("-num_threads")
            .arg(self.num_threads.to_string());
        debug!("executing {:?}", cmd);

        let status = cmd
            .status()
            .with_context(|| format!("failed to start {}", self.program))?;
        if !status.success() {
            anyhow::bail!("{} search failed with exit code {:?}", self.program, status.code());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::HIT_FIELD_COUNT;

    #[test]
    fn test_program_from_str() {
        assert_eq!("blastp".parse::<BlastProgram>().unwrap(), BlastProgram::Blastp);
        assert_eq!("BLASTN".parse::<BlastProgram>().unwrap(), BlastProgram::Blastn);
        assert_eq!("tblastn".parse::<BlastProgram>().unwrap(), BlastProgram::Tblastn);
        assert!("blastq".parse::<BlastProgram>().is_err());
        assert!("".parse::<BlastProgram>().is_err());
    }

    #[test]
    fn test_db_type_mapping() {
        assert_eq!(BlastProgram::Blastp.db_type(), "prot");
        assert_eq!(BlastProgram::Blastx.db_type(), "prot");
        assert_eq!(BlastProgram::Blastn.db_type(), "nucl");
        assert_eq!(BlastProgram::Tblastn.db_type(), "nucl");
    }

    #[test]
    fn test_outfmt_matches_record_arity() {
        // "6" plus the column names the filter expects
        let columns: Vec<&str> = OUTFMT.split_whitespace().skip(1).collect();
        assert_eq!(columns.len(), HIT_FIELD_COUNT);
        assert_eq!(columns[0], "qseqid");
        assert_eq!(columns[13], "bitscore");
    }

    #[test]
    fn test_database_exists() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("db");
        assert!(!BlastRunner::database_exists(&prefix));

        std::fs::write(format!("{}.phr", prefix.display()), b"").unwrap();
        assert!(BlastRunner::database_exists(&prefix));

        let nucl_prefix = dir.path().join("nucl_db");
        std::fs::write(format!("{}.nhr", nucl_prefix.display()), b"").unwrap();
        assert!(BlastRunner::database_exists(&nucl_prefix));
    }
}
