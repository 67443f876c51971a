pub mod bio;
pub mod cli;
pub mod config;
pub mod filter;
pub mod tools;

pub use crate::bio::fasta::SequenceIndex;
pub use crate::filter::{FilterConfig, HitStreamFilter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed hit record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("BLAST+ error: {0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, ScreenError>;
