use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path};
use tar::{Archive, Builder};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{ArchiveCreationError, Error, Result};

pub const ARCHIVE_EXT: &str = "tar.gz";

/// Runs `fill` against a gzip-compressed tar stream on top of `out` and
/// returns `out` once the stream has been finished.
fn write_tar_gz<W, F>(out: W, level: u32, fill: F) -> io::Result<W>
where
    W: Write,
    F: FnOnce(&mut Builder<GzEncoder<W>>) -> io::Result<()>,
{
    let mut builder = Builder::new(GzEncoder::new(out, Compression::new(level.min(9))));
    fill(&mut builder)?;
    builder.into_inner()?.finish()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// A group must be a plain relative path that stays inside the artifact root.
fn is_safe_group(group: &str) -> bool {
    let path = Path::new(group);
    !group.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Creates `dest` containing the full recursive contents of each named
/// component group under `root`, in the order given, and nothing else.
///
/// Entry paths are relative to `root`; the process working directory is
/// never touched. A partially written `dest` is removed on failure.
pub fn build_archive(root: &Path, dest: &Path, groups: &[String], level: u32) -> Result<()> {
    let parent = parent_dir(dest);
    if !parent.is_dir() {
        return Err(Error::archive(dest, ArchiveCreationError::MissingDestination(parent.to_path_buf())));
    }
    if !root.is_dir() {
        return Err(Error::archive(dest, ArchiveCreationError::NotADirectory(root.to_path_buf())));
    }
    for group in groups {
        if !is_safe_group(group) || !root.join(group).is_dir() {
            return Err(Error::archive(
                dest,
                ArchiveCreationError::MissingGroup { group: group.clone(), root: root.to_path_buf() },
            ));
        }
    }

    let written = File::create(dest).and_then(|file| {
        let file = write_tar_gz(file, level, |builder| {
            for group in groups {
                tracing::debug!("adding {} from {}", group, root.display());
                builder.append_dir_all(group, root.join(group))?;
            }
            Ok(())
        })?;
        file.sync_all()
    });

    if let Err(e) = written {
        let _ = fs::remove_file(dest);
        return Err(Error::archive(dest, e));
    }
    Ok(())
}

/// Archives everything inside `dir` (entries relative to `dir`, sorted by
/// name) into `dest`.
///
/// The archive is written to a temporary file beside `dest` and moved into
/// place once complete, replacing any previous archive of the same name.
pub fn bundle_dir(dir: &Path, dest: &Path, level: u32) -> Result<()> {
    let parent = parent_dir(dest);
    if !parent.is_dir() {
        return Err(Error::archive(dest, ArchiveCreationError::MissingDestination(parent.to_path_buf())));
    }
    if !dir.is_dir() {
        return Err(Error::archive(dest, ArchiveCreationError::NotADirectory(dir.to_path_buf())));
    }

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::archive(dest, e))?;
    write_tar_gz(tmp.as_file_mut(), level, |builder| {
        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let rel = entry.path().strip_prefix(dir).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if entry.file_type().is_dir() {
                builder.append_dir(rel, entry.path())?;
            } else {
                builder.append_path_with_name(entry.path(), rel)?;
            }
        }
        Ok(())
    })
    .and_then(|file| file.sync_all())
    .map_err(|e| Error::archive(dest, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tmp.as_file().set_permissions(fs::Permissions::from_mode(0o644));
    }

    tmp.persist(dest).map_err(|e| Error::archive(dest, e.error))?;
    Ok(())
}

/// Lists the entry paths of a `.tar.gz` archive, without trailing slashes.
pub fn list_entries(archive_path: &Path) -> Result<Vec<String>> {
    let file = File::open(archive_path).map_err(|e| Error::fs(archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut names = Vec::new();
    let entries = archive.entries().map_err(|e| Error::fs(archive_path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs(archive_path, e))?;
        let path = entry.path().map_err(|e| Error::fs(archive_path, e))?;
        let name = path.to_string_lossy().trim_end_matches('/').to_string();
        if !name.is_empty() && name != "." {
            names.push(name);
        }
    }
    Ok(names)
}

/// Compute SHA-256 checksum of a file, returning lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::fs(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| Error::fs(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
