//! Bundle extraction for both archive formats.
//!
//! Zip archives are unpacked into a staging directory next to the
//! destination and merged in only once every entry extracted. Tar+gzip
//! bundles are streamed entry by entry straight into the destination; an
//! entry that would land outside it, by path or through a symlink, fails the
//! extraction.

use flate2::read::GzDecoder;
use qlscan_core::{ArchiveFormat, QlscanError, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Extract `archive` into `dest` according to `format`
///
/// Blocks until every entry has been written.
pub fn extract(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<()> {
    debug!(archive = %archive.display(), dest = %dest.display(), %format, "extracting");
    fs::create_dir_all(dest).map_err(|e| QlscanError::io(dest, e))?;
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
    }
}

/// Run [`extract`] on the blocking thread pool
pub async fn extract_async(archive: PathBuf, dest: PathBuf, format: ArchiveFormat) -> Result<()> {
    let label = archive.clone();
    tokio::task::spawn_blocking(move || extract(&archive, &dest, format))
        .await
        .map_err(|e| QlscanError::extraction(&label, format!("extraction task failed: {e}")))?
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| QlscanError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| QlscanError::extraction(archive, e))?;

    let parent = dest.parent().unwrap_or(dest);
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(|e| QlscanError::io(parent, e))?;

    zip.extract(staging.path())
        .map_err(|e| QlscanError::extraction(archive, e))?;
    trace!(entries = zip.len(), "zip staged");

    merge_into(staging.path(), dest)
}

/// Move every entry of `src` into `dest`, replacing files and merging directories
fn merge_into(src: &Path, dest: &Path) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|e| QlscanError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| QlscanError::io(src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());

        if from.is_dir() && to.is_dir() {
            merge_into(&from, &to)?;
            continue;
        }
        if to.is_dir() {
            fs::remove_dir_all(&to).map_err(|e| QlscanError::io(&to, e))?;
        } else if to.exists() {
            fs::remove_file(&to).map_err(|e| QlscanError::io(&to, e))?;
        }
        fs::rename(&from, &to).map_err(|e| QlscanError::io(&to, e))?;
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| QlscanError::io(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let root = dest.canonicalize().map_err(|e| QlscanError::io(dest, e))?;

    let entries = tar
        .entries()
        .map_err(|e| QlscanError::extraction(archive, e))?;

    let mut written = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| QlscanError::extraction(archive, e))?;
        let raw = entry
            .path()
            .map_err(|e| QlscanError::extraction(archive, e))?
            .into_owned();
        let escapes = || {
            QlscanError::extraction(archive, format!("entry escapes destination: {}", raw.display()))
        };
        let relative = enclosed(&raw).ok_or_else(escapes)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(&relative);
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            if out.exists() && !out.is_dir() {
                debug!(path = %out.display(), "directory entry shadows existing file, keeping file");
                continue;
            }
        } else if !(kind.is_file() || kind.is_symlink() || kind.is_hard_link()) {
            trace!(path = %raw.display(), ?kind, "skipping special entry");
            continue;
        } else if out.is_dir() && parent_within(&root, &out) {
            fs::remove_dir_all(&out).map_err(|e| QlscanError::io(&out, e))?;
        }

        // unpack_in refuses entries whose resolved parent leaves `dest`,
        // including through symlinks created by earlier entries
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| QlscanError::extraction(archive, format!("{}: {e}", raw.display())))?;
        if !unpacked {
            return Err(escapes());
        }
        if !kind.is_dir() {
            written += 1;
        }
    }

    debug!(files = written, "tar.gz extracted");
    Ok(())
}

/// Whether the existing parent of `path` resolves inside `root`
fn parent_within(root: &Path, path: &Path) -> bool {
    path.parent()
        .and_then(|p| p.canonicalize().ok())
        .is_some_and(|p| p.starts_with(root))
}

/// Relative path inside the destination, or `None` when the entry would escape it
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_gz(dir: &Path, files: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("bundle.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    fn zip_file(dir: &Path, files: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("bundle.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_tar_gz_preserves_relative_paths() {
        let work = TempDir::new().unwrap();
        let archive = tar_gz(
            work.path(),
            &[("codeql/codeql", b"#!/bin/sh\n"), ("codeql/tools/linux64/lib.so", b"elf")],
        );
        let dest = work.path().join("install");

        extract(&archive, &dest, ArchiveFormat::TarGz).unwrap();

        assert_eq!(fs::read(dest.join("codeql/codeql")).unwrap(), b"#!/bin/sh\n");
        assert!(dest.join("codeql/tools/linux64/lib.so").is_file());
    }

    #[test]
    fn test_tar_gz_file_entries_overwrite() {
        let work = TempDir::new().unwrap();
        let dest = work.path().join("install");
        fs::create_dir_all(dest.join("codeql")).unwrap();
        fs::write(dest.join("codeql/codeql"), "old").unwrap();

        let archive = tar_gz(work.path(), &[("codeql/codeql", b"new")]);
        extract(&archive, &dest, ArchiveFormat::TarGz).unwrap();

        assert_eq!(fs::read_to_string(dest.join("codeql/codeql")).unwrap(), "new");
    }

    #[test]
    fn test_tar_gz_directory_entry_keeps_existing_file() {
        let work = TempDir::new().unwrap();
        let dest = work.path().join("install");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("shared"), "keep me").unwrap();

        let path = work.path().join("dirs.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "shared/", std::io::empty()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        extract(&path, &dest, ArchiveFormat::TarGz).unwrap();
        assert_eq!(fs::read_to_string(dest.join("shared")).unwrap(), "keep me");
    }

    #[test]
    fn test_corrupt_tar_gz_is_extraction_error() {
        let work = TempDir::new().unwrap();
        let archive = work.path().join("broken.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract(&archive, &work.path().join("out"), ArchiveFormat::TarGz).unwrap_err();
        assert!(matches!(err, QlscanError::Extraction { .. }));
    }

    #[test]
    fn test_zip_extracts_and_merges() {
        let work = TempDir::new().unwrap();
        let dest = work.path().join("install");
        fs::create_dir_all(dest.join("codeql")).unwrap();
        fs::write(dest.join("codeql/unrelated.txt"), "stays").unwrap();

        let archive = zip_file(
            work.path(),
            &[("codeql/codeql.exe", b"MZ"), ("codeql/qlpacks/pack.yml", b"name: x")],
        );
        extract(&archive, &dest, ArchiveFormat::Zip).unwrap();

        assert_eq!(fs::read(dest.join("codeql/codeql.exe")).unwrap(), b"MZ");
        assert!(dest.join("codeql/qlpacks/pack.yml").is_file());
        assert!(dest.join("codeql/unrelated.txt").is_file());
        let leftovers: Vec<_> = fs::read_dir(work.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".extract-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_zip_leaves_destination_untouched() {
        let work = TempDir::new().unwrap();
        let archive = work.path().join("broken.zip");
        fs::write(&archive, b"PK\x03\x04 truncated").unwrap();
        let dest = work.path().join("install");

        let err = extract(&archive, &dest, ArchiveFormat::Zip).unwrap_err();
        assert!(matches!(err, QlscanError::Extraction { .. }));
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_tar_gz_rejects_writes_through_symlink() {
        let work = TempDir::new().unwrap();
        let outside = work.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let dest = work.path().join("install");

        let path = work.path().join("link.tar.gz");
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        link.set_link_name(&outside).unwrap();
        link.set_cksum();
        builder.append_data(&mut link, "codeql/link", std::io::empty()).unwrap();
        let body = b"escaped";
        let mut file = tar::Header::new_gnu();
        file.set_size(body.len() as u64);
        file.set_mode(0o644);
        file.set_cksum();
        builder
            .append_data(&mut file, "codeql/link/escaped.txt", &body[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = extract(&path, &dest, ArchiveFormat::TarGz).unwrap_err();

        assert!(matches!(err, QlscanError::Extraction { .. }));
        assert!(!outside.join("escaped.txt").exists());
    }

    #[test]
    fn test_enclosed_rejects_escapes() {
        assert_eq!(enclosed(Path::new("./a/b")), Some(PathBuf::from("a/b")));
        assert_eq!(enclosed(Path::new("../etc/passwd")), None);
        assert_eq!(enclosed(Path::new("/etc/passwd")), None);
    }
}
