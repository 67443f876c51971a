use crate::filter::FilterConfig;
use crate::{Result, ScreenError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub blast: BlastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastConfig {
    /// BLAST program to run (blastp, blastn, blastx, tblastn)
    pub program: String,
    /// Maximum e-value passed to the search
    pub evalue: f64,
    /// Threads used by the BLAST+ search itself
    pub num_threads: usize,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self {
            program: "blastp".to_string(),
            evalue: 1e-5,
            num_threads: 3,
        }
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| ScreenError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<()> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| ScreenError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = default_config();
        assert_eq!(config.filter.identity_threshold, 0.0);
        assert_eq!(config.filter.coverage_threshold, 0.0);
        assert_eq!(config.filter.max_hits_per_query, 1);
        assert!(config.filter.include_query_sequence);
        assert_eq!(config.blast.program, "blastp");
        assert_eq!(config.blast.evalue, 1e-5);
        assert_eq!(config.blast.num_threads, 3);
    }

    #[test]
    fn test_load_partial_config_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[filter]\nidentity_threshold = 30.0\nmax_hits_per_query = 5\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.filter.identity_threshold, 30.0);
        assert_eq!(config.filter.max_hits_per_query, 5);
        assert_eq!(config.filter.coverage_threshold, 0.0);
        assert_eq!(config.blast.program, "blastp");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blastscreen.toml");

        let mut config = default_config();
        config.filter.identity_threshold = 75.0;
        config.filter.max_hits_per_query = 4;
        config.filter.include_query_sequence = false;
        config.blast.program = "tblastn".to_string();
        config.blast.evalue = 1e-8;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.filter.identity_threshold, 75.0);
        assert_eq!(loaded.filter.max_hits_per_query, 4);
        assert!(!loaded.filter.include_query_sequence);
        assert_eq!(loaded.blast.program, "tblastn");
        assert_eq!(loaded.blast.evalue, 1e-8);
        assert_eq!(loaded.blast.num_threads, config.blast.num_threads);
    }

    #[test]
    fn test_save_to_unwritable_path_is_io_error() {
        let config = default_config();
        let result = save_config("/nonexistent/dir/blastscreen.toml", &config);
        assert!(matches!(result, Err(ScreenError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[filter\nbroken").unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ScreenError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = load_config("/nonexistent/blastscreen.toml");
        assert!(matches!(result, Err(ScreenError::Io(_))));
    }
}
