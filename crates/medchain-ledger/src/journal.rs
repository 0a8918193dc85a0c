use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::records::{Block, Transaction};

/// Sealed blocks, in index order.
pub type BlockJournal = Journal<Block>;

/// Submitted transactions not yet sealed, in submission order.
pub type PendingLog = Journal<Transaction>;

/// Something that can be written to a [`Journal`].
pub trait JournalEntry: Serialize + DeserializeOwned {
    /// Short label used in log lines and checksum errors.
    fn describe(&self) -> String;
}

impl JournalEntry for Block {
    fn describe(&self) -> String {
        format!("block {}", self.index)
    }
}

impl JournalEntry for Transaction {
    fn describe(&self) -> String {
        format!("transaction {}", self.id)
    }
}

/// Where the pending log of the block journal at `journal` lives.
pub fn pending_log_path(journal: &Path) -> PathBuf {
    journal.with_extension("pending.jsonl")
}

/// One journal line.
///
/// On-disk format, one JSON object per line:
/// ```text
/// {"crc":<CRC32 of the entry JSON>,"entry":{...}}
/// ```
#[derive(Serialize, Deserialize)]
struct JournalRecord<T> {
    crc: u32,
    entry: T,
}

/// Append-only JSON-lines log.
///
/// A torn final line (an interrupted write) is logged and dropped on load,
/// and cut from the file by [`recover`](Self::recover). Any other unreadable
/// line, or a checksum mismatch, is an error: the journal was edited and is
/// not loaded.
pub struct Journal<T> {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    _entry: PhantomData<fn(T)>,
}

struct Scan<T> {
    entries: Vec<T>,
    /// Byte length of the readable prefix.
    valid_len: u64,
    torn: bool,
    /// The last entry decoded but has no trailing newline.
    unterminated: bool,
}

impl<T: JournalEntry> Journal<T> {
    /// Open (or create) the journal at `path` for appending.
    ///
    /// Call [`recover`](Self::recover) first on a journal that may end in a
    /// torn line, or the next append lands on that line.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            _entry: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it.
    pub fn append(&self, entry: &T) -> Result<(), LedgerError> {
        let line = encode(entry)?;
        let mut writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(entry = %entry.describe(), path = %self.path.display(), "journal append");
        Ok(())
    }

    /// Replace the journal contents with `entries`.
    pub fn rewrite<'a, I>(&self, entries: I) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut contents = String::new();
        let mut count = 0usize;
        for entry in entries {
            contents.push_str(&encode(entry)?);
            contents.push('\n');
            count += 1;
        }

        let mut writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;
        writer.flush()?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        *writer = BufWriter::new(file);
        debug!(entries = count, path = %self.path.display(), "journal rewritten");
        Ok(())
    }

    /// Read every entry recorded at `path`. A missing file yields nothing.
    /// The file is not modified.
    pub fn load(path: &Path) -> Result<Vec<T>, LedgerError> {
        Ok(Self::scan(path)?.entries)
    }

    /// Like [`load`](Self::load), but also repairs the file so appends
    /// continue on a fresh line: a torn tail is truncated and an
    /// unterminated last record gets its newline.
    pub fn recover(path: &Path) -> Result<Vec<T>, LedgerError> {
        let scan = Self::scan(path)?;
        if scan.torn {
            OpenOptions::new().write(true).open(path)?.set_len(scan.valid_len)?;
            warn!(path = %path.display(), len = scan.valid_len, "torn journal tail truncated");
        } else if scan.unterminated {
            OpenOptions::new().append(true).open(path)?.write_all(b"\n")?;
        }
        Ok(scan.entries)
    }

    fn scan(path: &Path) -> Result<Scan<T>, LedgerError> {
        let mut scan = Scan {
            entries: Vec::new(),
            valid_len: 0,
            torn: false,
            unterminated: false,
        };
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(scan),
            Err(e) => return Err(e.into()),
        };

        let mut offset = 0u64;
        for (number, line) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
            offset += line.len() as u64;
            let terminated = line.ends_with(b"\n");
            let body = line.trim_ascii();
            if body.is_empty() {
                if terminated {
                    scan.valid_len = offset;
                }
                continue;
            }
            match decode::<T>(body) {
                Ok(entry) => {
                    scan.entries.push(entry);
                    scan.valid_len = offset;
                    scan.unterminated = !terminated;
                }
                Err(e) if !terminated => {
                    warn!(line = number + 1, error = %e, "torn journal tail; ignoring");
                    scan.torn = true;
                    break;
                }
                Err(e) => {
                    return Err(LedgerError::Journal(format!("line {}: {e}", number + 1)));
                }
            }
        }
        if !scan.torn && scan.valid_len < offset {
            // Whitespace after the last newline.
            scan.torn = true;
        }

        debug!(entries = scan.entries.len(), path = %path.display(), "journal loaded");
        Ok(scan)
    }
}

fn encode<T: JournalEntry>(entry: &T) -> Result<String, LedgerError> {
    let crc = crc32fast::hash(&serde_json::to_vec(entry)?);
    Ok(serde_json::to_string(&JournalRecord { crc, entry })?)
}

fn decode<T: JournalEntry>(line: &[u8]) -> Result<T, LedgerError> {
    let record: JournalRecord<T> = serde_json::from_slice(line)?;
    let actual = crc32fast::hash(&serde_json::to_vec(&record.entry)?);
    if actual != record.crc {
        return Err(LedgerError::Journal(format!(
            "checksum mismatch for {}: expected {:08x}, got {actual:08x}",
            record.entry.describe(),
            record.crc
        )));
    }
    Ok(record.entry)
}
