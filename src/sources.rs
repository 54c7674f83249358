//! Source enumeration over an extracted working directory
//!
//! Every regular file under the root is listed depth first with siblings in
//! lexical order, opened for reading, and tagged with the [`Period`] named by its
//! first path component below the root (`<root>/2024-01/...`). The list is then
//! stably sorted by that tag so callers see files in chronological order even if
//! the directory layout would walk differently.

use crate::error::{Error, Result};
use crate::types::Period;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One opened source file
#[derive(Debug)]
pub struct SourceFile {
    index: usize,
    period: Option<Period>,
    path: PathBuf,
    reader: BufReader<File>,
}

impl SourceFile {
    /// Position in the enumeration, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    /// Period this file belongs to, if it sits inside a period directory
    pub fn period(&self) -> Option<Period> {
        self.period
    }

    /// Absolute path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open read handle
    pub fn reader(&mut self) -> &mut BufReader<File> {
        &mut self.reader
    }
}

/// Chronologically ordered set of opened source files
///
/// Dropping the set closes every handle; [`SourceSet::release`] does the same
/// explicitly.
#[derive(Debug)]
pub struct SourceSet {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl SourceSet {
    /// Directory the set was enumerated from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in chronological order
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Mutable access to the files, in chronological order
    pub fn files_mut(&mut self) -> &mut [SourceFile] {
        &mut self.files
    }

    /// Paths of all files, in chronological order
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }

    /// Close every handle
    pub fn release(self) {
        debug!(root = ?self.root, files = self.files.len(), "releasing source handles");
        drop(self);
    }
}

/// Walk `root` and open every regular file beneath it
///
/// # Errors
/// [`Error::LocalIo`] if any directory cannot be read or any file cannot be
/// opened. Handles opened before the failure are closed and nothing is returned.
///
/// # Example
/// ```no_run
/// use tor_exit_history::sources::enumerate_sources;
/// use std::path::Path;
///
/// # fn example() -> tor_exit_history::error::Result<()> {
/// let sources = enumerate_sources(Path::new("/tmp/work"))?;
/// for file in sources.files() {
///     println!("{:?} {}", file.period(), file.path().display());
/// }
/// sources.release();
/// # Ok(())
/// # }
/// ```
pub fn enumerate_sources(root: &Path) -> Result<SourceSet> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            Error::local_io(format!("walk {}", path.display()), path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let reader = File::open(&path)
            .map(BufReader::new)
            .map_err(|e| Error::local_io(format!("open source {}", path.display()), &path, e))?;

        files.push(SourceFile {
            index: 0,
            period: period_of(root, &path),
            path,
            reader,
        });
    }

    // Stable: walk order is kept within a period
    files.sort_by_key(|f| f.period);
    for (index, file) in files.iter_mut().enumerate() {
        file.index = index;
    }

    info!(?root, files = files.len(), "enumerated source files");

    Ok(SourceSet {
        root: root.to_path_buf(),
        files,
    })
}

/// Period named by the first component of `path` below `root`
fn period_of(root: &Path, path: &Path) -> Option<Period> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A file directly under the root is not inside a period directory
    components.next()?;
    first.as_os_str().to_str()?.parse().ok()
}
