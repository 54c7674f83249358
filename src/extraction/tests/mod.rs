use crate::error::{ArchiveStage, Error};
use crate::extraction::*;
use crate::test_helpers::{SAMPLE_EXIT_LIST, TarEntry, tar_bytes, write_tar_xz, xz_bytes};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write an exit-list bundle laid out like the upstream collector archives
fn write_collector_bundle(dir: &TempDir) -> std::path::PathBuf {
    let archive = dir.path().join("exit-list-2024-01.tar.xz");
    write_tar_xz(
        &archive,
        &[
            TarEntry::Dir("exit-list-2024-01"),
            TarEntry::Dir("exit-list-2024-01/01"),
            TarEntry::File(
                "exit-list-2024-01/01/2024-01-01-00-02-00",
                SAMPLE_EXIT_LIST.as_bytes(),
            ),
            TarEntry::Dir("exit-list-2024-01/02"),
            TarEntry::File("exit-list-2024-01/02/2024-01-02-00-02-00", b"@type tordnsel 1.0\n"),
        ],
    );
    archive
}

fn assert_corrupt(err: Error, expected: ArchiveStage) {
    match err {
        Error::CorruptArchive { stage, .. } => assert_eq!(stage, expected),
        other => panic!("expected CorruptArchive({expected}), got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn test_extract_unpacks_tree_next_to_archive_and_removes_it() {
    let dir = TempDir::new().unwrap();
    let archive = write_collector_bundle(&dir);

    let files = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap();

    let first = dir.path().join("exit-list-2024-01/01/2024-01-01-00-02-00");
    let second = dir.path().join("exit-list-2024-01/02/2024-01-02-00-02-00");
    assert_eq!(files, vec![first.clone(), second.clone()]);
    assert_eq!(std::fs::read_to_string(&first).unwrap(), SAMPLE_EXIT_LIST);
    assert_eq!(
        std::fs::read_to_string(&second).unwrap(),
        "@type tordnsel 1.0\n"
    );
    assert!(!archive.exists(), "archive must be removed after extraction");
}

#[test]
fn test_extract_creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("bundle.tar.xz");
    // No explicit directory entries
    write_tar_xz(&archive, &[TarEntry::File("a/b/c.txt", b"deep")]);

    let files = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap();

    assert_eq!(files, vec![dir.path().join("a/b/c.txt")]);
    assert_eq!(std::fs::read(dir.path().join("a/b/c.txt")).unwrap(), b"deep");
}

#[test]
fn test_extract_empty_tar_succeeds_with_no_files() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("empty.tar.xz");
    write_tar_xz(&archive, &[]);

    let files = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap();

    assert!(files.is_empty());
    assert!(!archive.exists());
}

#[tokio::test]
async fn test_extract_archive_runs_on_blocking_pool() {
    let dir = TempDir::new().unwrap();
    let archive = write_collector_bundle(&dir);

    let files = extract_archive(&archive, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert!(!archive.exists());
}

// ---------------------------------------------------------------------------
// Unsupported and unsafe entries
// ---------------------------------------------------------------------------

#[test]
fn test_extract_skips_symlinks() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("links.tar.xz");
    write_tar_xz(
        &archive,
        &[
            TarEntry::File("data/real", b"x"),
            TarEntry::Symlink("data/link", "real"),
        ],
    );

    let files = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap();

    assert_eq!(files, vec![dir.path().join("data/real")]);
    assert!(
        std::fs::symlink_metadata(dir.path().join("data/link")).is_err(),
        "symlink entries must not be materialized"
    );
}

#[test]
fn test_extract_skips_entries_escaping_destination() {
    let outer = TempDir::new().unwrap();
    let work = outer.path().join("work");
    std::fs::create_dir(&work).unwrap();
    let archive = work.join("evil.tar.xz");
    write_tar_xz(
        &archive,
        &[
            TarEntry::RawName("../escaped", b"nope"),
            TarEntry::File("kept", b"yes"),
        ],
    );

    let files = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap();

    assert_eq!(files, vec![work.join("kept")]);
    assert!(!outer.path().join("escaped").exists());
}

// ---------------------------------------------------------------------------
// Corrupt input
// ---------------------------------------------------------------------------

#[test]
fn test_extract_non_xz_input_is_compression_error_and_keeps_archive() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("exit-list-2024-01.tar.xz");
    std::fs::write(&archive, b"test\n").unwrap();

    let err = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap_err();

    assert_corrupt(err, ArchiveStage::Compression);
    assert!(archive.exists(), "archive must stay in place on failure");
}

#[test]
fn test_extract_wrong_magic_of_sufficient_length_is_compression_error() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("gzip-in-disguise.tar.xz");
    std::fs::write(&archive, [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap();

    let err = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap_err();

    assert_corrupt(err, ArchiveStage::Compression);
    assert!(archive.exists());
}

#[test]
fn test_extract_truncated_xz_stream_is_compression_error() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("truncated.tar.xz");
    let full = xz_bytes(&tar_bytes(&[TarEntry::File(
        "exit-list",
        SAMPLE_EXIT_LIST.as_bytes(),
    )]));
    std::fs::write(&archive, &full[..full.len() / 2]).unwrap();

    let err = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap_err();

    assert_corrupt(err, ArchiveStage::Compression);
    assert!(archive.exists());
}

#[test]
fn test_extract_valid_xz_with_non_tar_payload_is_tar_error() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("not-a-tar.tar.xz");
    std::fs::write(&archive, xz_bytes(&[b'A'; 1024])).unwrap();

    let err = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap_err();

    assert!(err.to_string().contains("(tar)"), "got: {err}");
    assert_corrupt(err, ArchiveStage::Tar);
    assert!(archive.exists());
}

// ---------------------------------------------------------------------------
// Local I/O and cancellation
// ---------------------------------------------------------------------------

#[test]
fn test_extract_directory_blocked_by_file_is_local_io_error() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("clash.tar.xz");
    write_tar_xz(
        &archive,
        &[TarEntry::File("clash", b"file"), TarEntry::File("clash/inner", b"x")],
    );

    let err = TarXzExtractor::try_extract(&archive, &CancellationToken::new()).unwrap_err();

    assert!(matches!(err, Error::LocalIo { .. }), "got {err:?}");
    assert!(archive.exists());
}

#[test]
fn test_extract_missing_archive_is_local_io_error() {
    let dir = TempDir::new().unwrap();
    let err = TarXzExtractor::try_extract(
        &dir.path().join("missing.tar.xz"),
        &CancellationToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::LocalIo { .. }));
}

#[test]
fn test_extract_observes_cancellation_between_entries() {
    let dir = TempDir::new().unwrap();
    let archive = write_collector_bundle(&dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = TarXzExtractor::try_extract(&archive, &cancel).unwrap_err();

    assert!(matches!(err, Error::Cancelled { stage: "tar entry" }));
    assert!(archive.exists());
    assert!(!dir.path().join("exit-list-2024-01").exists());
}

#[tokio::test]
async fn test_extract_archive_skips_stage_when_already_cancelled() {
    let dir = TempDir::new().unwrap();
    let archive = write_collector_bundle(&dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = extract_archive(&archive, &cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled { stage: "extract" }));
    assert!(archive.exists());
}
