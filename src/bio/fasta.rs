use crate::{Result, ScreenError};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use memmap2::Mmap;
use nom::{
    bytes::complete::{tag, take_till},
    IResult,
};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Parse the identifier out of a FASTA header line: the first
/// whitespace-delimited token after the `>` marker.
fn parse_header(input: &str) -> IResult<&str, &str> {
    let (rest, _) = tag(">")(input)?;
    take_till(|c: char| c.is_whitespace())(rest)
}

/// Query identifier → full sequence text, in first-seen order.
///
/// Built once from the query FASTA before a filtering pass and read-only
/// afterwards. A repeated header identifier does not reset anything: later
/// sequence lines keep growing the existing entry. The original wrapper
/// accumulated into a defaultdict and downstream output depends on that,
/// so no duplicate validation is added here.
#[derive(Debug, Default)]
pub struct SequenceIndex {
    entries: IndexMap<String, String>,
}

impl SequenceIndex {
    /// Build the index from a FASTA file (supports .gz compression)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            let file = File::open(path)?;
            let mut decoder = GzDecoder::new(BufReader::new(file));
            let mut buffer = String::new();
            decoder.read_to_string(&mut buffer)?;
            Ok(Self::from_text(&buffer))
        } else {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            let text = std::str::from_utf8(&mmap[..]).map_err(|e| {
                ScreenError::Parse(format!("query FASTA is not valid UTF-8: {}", e))
            })?;
            Ok(Self::from_text(text))
        }
    }

    /// Build the index from FASTA text already in memory.
    ///
    /// Non-header lines are stripped of surrounding whitespace and appended
    /// to the current entry; sequences may wrap over multiple lines. Lines
    /// before the first header are ignored.
    pub fn from_text(text: &str) -> Self {
        let mut entries: IndexMap<String, String> = IndexMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            if let Ok((_, id)) = parse_header(line) {
                entries.entry(id.to_string()).or_default();
                current = Some(id.to_string());
            } else if let Some(id) = &current {
                if let Some(sequence) = entries.get_mut(id) {
                    sequence.push_str(line.trim());
                }
            }
        }

        Self { entries }
    }

    /// Look up the sequence text for an identifier
    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
