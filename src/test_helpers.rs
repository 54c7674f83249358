//! Shared fixtures for unit tests: exit-list text and in-memory `.tar.xz` bundles

use std::io::Write;
use std::path::Path;

/// Exit list with two relays, in the upstream tordnsel format
pub(crate) const SAMPLE_EXIT_LIST: &str = "@type tordnsel 1.0
Downloaded 2024-01-30 13:02:00
ExitNode FE39F07EBE7870DCE124AB30DF3ABD0700A43F75
Published 2024-01-30 00:10:50
LastStatus 2024-01-30 10:00:00
ExitAddress 185.241.208.231 2024-01-30 10:21:54
ExitAddress 185.241.208.232 2024-01-30 10:21:55
ExitNode 23B49521BDC4588C7CCF3C38E552504118326B66
Published 2024-01-30 05:44:30
LastStatus 2024-01-30 11:00:00
ExitAddress 194.26.192.64 2024-01-30 11:30:06
";

/// One tar entry to write into a fixture archive
pub(crate) enum TarEntry<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
    /// Regular file whose raw header name bypasses the builder's path checks
    RawName(&'a str, &'a [u8]),
}

/// Build an uncompressed tar stream
pub(crate) fn tar_bytes(entries: &[TarEntry<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        match entry {
            TarEntry::Dir(path) => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
            TarEntry::File(path, data) => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                builder.append_data(&mut header, path, *data).unwrap();
            }
            TarEntry::Symlink(path, target) => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                header.set_link_name(target).unwrap();
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
            TarEntry::RawName(name, data) => {
                let mut header = tar::Header::new_old();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                let raw = &mut header.as_old_mut().name;
                raw[..name.len()].copy_from_slice(name.as_bytes());
                header.set_cksum();
                builder.append(&header, *data).unwrap();
            }
        }
    }
    builder.into_inner().unwrap()
}

/// xz-compress `data`
pub(crate) fn xz_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Build a `.tar.xz` bundle
pub(crate) fn tar_xz_bytes(entries: &[TarEntry<'_>]) -> Vec<u8> {
    xz_bytes(&tar_bytes(entries))
}

/// Write a `.tar.xz` bundle to `path`
pub(crate) fn write_tar_xz(path: &Path, entries: &[TarEntry<'_>]) {
    std::fs::write(path, tar_xz_bytes(entries)).unwrap();
}

/// Render one relay block in the upstream format
pub(crate) fn exit_node_block(fingerprint: &str, published: &str, ips: &[&str]) -> String {
    let mut block = format!(
        "ExitNode {fingerprint}\nPublished {published}\nLastStatus {published}\n"
    );
    for ip in ips {
        block.push_str(&format!("ExitAddress {ip} {published}\n"));
    }
    block
}
