use crate::error::{ArchiveStage, Error, Result};
use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Magic bytes opening every xz stream
const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];

/// Archive extractor for `.tar.xz` exit-list bundles
pub struct TarXzExtractor;

impl TarXzExtractor {
    /// Decompress and unpack `archive_path` next to itself, then delete it
    ///
    /// Only regular files and directories are materialized; other entry types are
    /// skipped. The archive is removed only after every entry unpacked cleanly, so a
    /// failed run leaves the archive (and possibly a partial tree) behind.
    ///
    /// `cancel` is checked before every tar entry.
    pub fn try_extract(archive_path: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
        let dest_path = archive_path.parent().unwrap_or_else(|| Path::new(""));
        debug!(?archive_path, ?dest_path, "attempting tar.xz extraction");

        let extracted_files = Self::unpack(archive_path, dest_path, cancel)?;

        std::fs::remove_file(archive_path).map_err(|e| {
            Error::local_io(
                format!("remove extracted archive {}", archive_path.display()),
                archive_path,
                e,
            )
        })?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "tar.xz extraction successful"
        );

        Ok(extracted_files)
    }

    fn unpack(
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let mut file = File::open(archive_path).map_err(|e| {
            Error::local_io(format!("open archive {}", archive_path.display()), archive_path, e)
        })?;

        check_xz_magic(&mut file, archive_path)?;

        // Read errors raised by the decoder flag the compression stage; anything the
        // tar reader rejects without that flag set is a tar-stage failure.
        let decoder_failed = Rc::new(Cell::new(false));
        let decoder = StageProbe {
            inner: XzDecoder::new(BufReader::new(file)),
            failed: Rc::clone(&decoder_failed),
        };
        let corrupt = |e: io::Error| corrupt_archive(archive_path, &decoder_failed, e);

        let mut archive = tar::Archive::new(decoder);
        let mut extracted_files = Vec::new();

        for entry in archive.entries().map_err(corrupt)? {
            if cancel.is_cancelled() {
                warn!(?archive_path, "extraction cancelled between entries");
                return Err(Error::Cancelled { stage: "tar entry" });
            }

            let mut entry = entry.map_err(corrupt)?;
            let entry_type = entry.header().entry_type();
            let entry_path = entry.path().map_err(corrupt)?.into_owned();

            let Some(target) = enclosed_path(dest_path, &entry_path) else {
                warn!(?archive_path, ?entry_path, "skipping entry with unsafe path");
                continue;
            };

            match entry_type {
                tar::EntryType::Directory => {
                    std::fs::create_dir_all(&target).map_err(|e| {
                        Error::local_io(format!("create directory {}", target.display()), &target, e)
                    })?;
                }
                tar::EntryType::Regular => {
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            Error::local_io(
                                format!("create parent directories for {}", target.display()),
                                parent,
                                e,
                            )
                        })?;
                    }

                    let mut outfile = File::create(&target).map_err(|e| {
                        Error::local_io(format!("create {}", target.display()), &target, e)
                    })?;
                    copy_entry(&mut entry, &mut outfile, &target, &corrupt)?;
                    extracted_files.push(target);
                }
                other => {
                    debug!(?entry_path, entry_type = ?other, "skipping unsupported entry type");
                }
            }
        }

        Ok(extracted_files)
    }
}

/// Copy one entry's payload, keeping read (archive) and write (disk) failures apart
fn copy_entry(
    entry: &mut impl Read,
    outfile: &mut File,
    target: &Path,
    corrupt: &impl Fn(io::Error) -> Error,
) -> Result<()> {
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(corrupt(e)),
        };
        outfile
            .write_all(&buf[..n])
            .map_err(|e| Error::local_io(format!("write {}", target.display()), target, e))?;
    }
    Ok(())
}

fn check_xz_magic(file: &mut File, archive_path: &Path) -> Result<()> {
    let mut magic = [0u8; XZ_MAGIC.len()];
    match file.read_exact(&mut magic) {
        Ok(()) if magic == XZ_MAGIC => {}
        Ok(()) => {
            return Err(Error::CorruptArchive {
                archive: archive_path.to_path_buf(),
                stage: ArchiveStage::Compression,
                reason: "not an xz stream (bad header magic)".into(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(Error::CorruptArchive {
                archive: archive_path.to_path_buf(),
                stage: ArchiveStage::Compression,
                reason: "file too short to be an xz stream".into(),
            });
        }
        Err(e) => {
            return Err(Error::local_io(
                format!("read archive header {}", archive_path.display()),
                archive_path,
                e,
            ));
        }
    }

    // The decoder needs the stream from its first byte
    file.rewind().map_err(|e| {
        Error::local_io(format!("rewind archive {}", archive_path.display()), archive_path, e)
    })
}

fn corrupt_archive(archive_path: &Path, decoder_failed: &Cell<bool>, e: io::Error) -> Error {
    let stage = if decoder_failed.get() {
        ArchiveStage::Compression
    } else {
        ArchiveStage::Tar
    };
    Error::CorruptArchive {
        archive: archive_path.to_path_buf(),
        stage,
        reason: e.to_string(),
    }
}

/// Join `entry_path` onto `dest_path`, refusing absolute paths and `..` components
fn enclosed_path(dest_path: &Path, entry_path: &Path) -> Option<PathBuf> {
    let mut target = dest_path.to_path_buf();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(target)
}

/// Reader that records whether its inner reader ever failed
struct StageProbe<R> {
    inner: R,
    failed: Rc<Cell<bool>>,
}

impl<R: Read> Read for StageProbe<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed.set(true))
    }
}
