//! Aggregate views over a chronologically ordered [`SourceSet`]
//!
//! Both views rewind every source before reading, so running a view twice over
//! the same set sees the same data. Either view fails as a whole on the first
//! parse or read error; no partial result is returned.

use crate::error::{Error, Result};
use crate::parser::RecordStream;
use crate::sources::{SourceFile, SourceSet};
use crate::types::ExitNodeRecord;
use std::collections::HashMap;
use std::io::Seek;
use std::num::NonZeroUsize;
use std::thread;
use tracing::{debug, info};

/// Latest record per fingerprint across all sources
///
/// Files are read in set order and records in file order; each record
/// overwrites any earlier one with the same fingerprint, so the survivor comes
/// from the last file (and last occurrence within that file) that mentions it.
/// Map order carries no meaning.
///
/// # Example
/// ```no_run
/// use tor_exit_history::aggregate::most_recent_view;
/// use tor_exit_history::sources::enumerate_sources;
/// use std::path::Path;
///
/// # fn example() -> tor_exit_history::error::Result<()> {
/// let mut sources = enumerate_sources(Path::new("/tmp/work"))?;
/// let latest = most_recent_view(&mut sources)?;
/// println!("{} relays", latest.len());
/// # Ok(())
/// # }
/// ```
pub fn most_recent_view(sources: &mut SourceSet) -> Result<HashMap<String, ExitNodeRecord>> {
    let mut latest = HashMap::new();

    for file in sources.files_mut() {
        rewind(file)?;
        let mut records = 0usize;
        for record in RecordStream::new(file.reader()) {
            let record = record?;
            latest.insert(record.fingerprint.clone(), record);
            records += 1;
        }
        debug!(path = ?file.path(), records, "folded source file");
    }

    info!(files = sources.len(), relays = latest.len(), "built most-recent view");
    Ok(latest)
}

/// Every record that used `ip` as an exit address, newest file first
///
/// Files are scanned in parallel; each file's matches land in a slot reserved
/// for its index. Workers are bounded by `available_parallelism()`, so each
/// scoped thread scans a contiguous run of files rather than one thread per
/// file; a month holds hundreds of hourly lists. The slots are concatenated
/// oldest file first and the whole sequence is reversed, which also reverses
/// record order within a file.
/// Matching is exact string equality. Records are not deduplicated.
pub fn ip_history_view(sources: &mut SourceSet, ip: &str) -> Result<Vec<ExitNodeRecord>> {
    let files = sources.files_mut();
    let mut slots: Vec<Vec<ExitNodeRecord>> = files.iter().map(|_| Vec::new()).collect();

    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let chunk = files.len().div_ceil(workers).max(1);

    let outcomes: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks_mut(chunk)
            .zip(slots.chunks_mut(chunk))
            .map(|(files, slots)| {
                scope.spawn(move || {
                    for (file, slot) in files.iter_mut().zip(slots.iter_mut()) {
                        scan_file(file, ip, slot)?;
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::TaskFailed("parse worker panicked".into())))
            })
            .collect()
    });

    // Chunks are in file order, so the first failure is the earliest file's
    outcomes.into_iter().collect::<Result<()>>()?;

    let mut matches: Vec<ExitNodeRecord> = slots.into_iter().flatten().collect();
    matches.reverse();

    info!(ip, files = sources.len(), matches = matches.len(), "built IP history view");
    Ok(matches)
}

fn scan_file(file: &mut SourceFile, ip: &str, slot: &mut Vec<ExitNodeRecord>) -> Result<()> {
    rewind(file)?;
    for record in RecordStream::new(file.reader()) {
        let record = record?;
        if record.has_exit_address(ip) {
            slot.push(record);
        }
    }
    debug!(path = ?file.path(), ip, matches = slot.len(), "scanned source file");
    Ok(())
}

fn rewind(file: &mut SourceFile) -> Result<()> {
    let path = file.path().to_path_buf();
    file.reader()
        .rewind()
        .map_err(|e| Error::local_io(format!("rewind {}", path.display()), path, e))
}
