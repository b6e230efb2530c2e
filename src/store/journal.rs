use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use super::error::{StoreError, StoreResult};

pub const JOURNAL_FILE: &str = "journal";
pub const JOURNAL_FILE_TMP: &str = "journal.tmp";

const MAGIC: &str = "objcache.journal";
const FORMAT_VERSION: &str = "1";
const VALUE_COUNT: &str = "1";

/// One line of the journal body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// An editor was opened for the entry
    Dirty(String),
    /// The entry was published with the given length
    Clean(String, u64),
    /// The entry was read
    Read(String),
    /// The entry was removed or its first edit aborted
    Remove(String),
}

impl Record {
    pub fn parse(line: &str) -> StoreResult<Self> {
        let mut parts = line.split(' ');
        let op = parts.next().unwrap_or_default();
        let digest = parts
            .next()
            .filter(|d| is_digest(d))
            .ok_or_else(|| StoreError::CorruptJournal(format!("bad record: {line:?}")))?
            .to_string();

        let record = match (op, parts.next()) {
            ("DIRTY", None) => Record::Dirty(digest),
            ("READ", None) => Record::Read(digest),
            ("REMOVE", None) => Record::Remove(digest),
            ("CLEAN", Some(len)) => {
                let len = len
                    .parse()
                    .map_err(|_| StoreError::CorruptJournal(format!("bad length: {line:?}")))?;
                Record::Clean(digest, len)
            }
            _ => return Err(StoreError::CorruptJournal(format!("bad record: {line:?}"))),
        };

        if parts.next().is_some() {
            return Err(StoreError::CorruptJournal(format!("trailing data: {line:?}")));
        }
        Ok(record)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Dirty(d) => write!(f, "DIRTY {d}"),
            Record::Clean(d, len) => write!(f, "CLEAN {d} {len}"),
            Record::Read(d) => write!(f, "READ {d}"),
            Record::Remove(d) => write!(f, "REMOVE {d}"),
        }
    }
}

/// Result of reading a journal from disk
#[derive(Debug, Default)]
pub struct Replay {
    pub records: Vec<Record>,
    /// The last line was cut short by a crash and was ignored
    pub truncated: bool,
}

fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn write_header(out: &mut impl Write, app_version: u32) -> io::Result<()> {
    writeln!(out, "{MAGIC}")?;
    writeln!(out, "{FORMAT_VERSION}")?;
    writeln!(out, "{app_version}")?;
    writeln!(out, "{VALUE_COUNT}")?;
    writeln!(out)
}

/// Read and validate a journal written for `app_version`.
///
/// A header that does not match (including a different app version) is
/// reported as `CorruptJournal`; the caller resets the directory.
pub fn read(path: &Path, app_version: u32) -> StoreResult<Replay> {
    let content = fs::read_to_string(path)?;
    let truncated = !content.is_empty() && !content.ends_with('\n');
    let mut lines = content.split('\n');

    let expected_version = app_version.to_string();
    let header = [
        MAGIC,
        FORMAT_VERSION,
        expected_version.as_str(),
        VALUE_COUNT,
        "",
    ];
    for expected in header {
        let line = lines.next().unwrap_or_default();
        if line != expected {
            return Err(StoreError::CorruptJournal(format!(
                "unexpected header line {line:?}, wanted {expected:?}"
            )));
        }
    }

    let body: Vec<&str> = lines.collect();
    // split leaves an empty tail after the final newline, or the partial
    // line when the write was interrupted
    let complete = body.len().saturating_sub(1);

    let records = body[..complete]
        .iter()
        .map(|line| Record::parse(line))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Replay { records, truncated })
}
