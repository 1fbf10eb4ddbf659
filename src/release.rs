//! src/release.rs
//! Drives a packaging run: stage one archive per artifact root, bundle the
//! staged archives into the release archive, then drop the scratch directory.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compress::{self, ARCHIVE_EXT};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::profile::ReleaseProfile;
use crate::staging::ScratchDir;

/// Which tree the component groups are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRoot {
    Compiled,
    Source,
}

impl ArtifactRoot {
    pub fn path<'a>(&self, cfg: &'a AppConfig) -> &'a Path {
        match self {
            ArtifactRoot::Compiled => &cfg.compiled_root,
            ArtifactRoot::Source => &cfg.source_root,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ArtifactRoot::Compiled => "compiled",
            ArtifactRoot::Source => "source",
        }
    }

    /// Identifier used in staged archive names: the root's directory name.
    pub fn identifier(&self, cfg: &AppConfig) -> String {
        self.path(cfg)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.label().to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StagedArchive {
    pub root: ArtifactRoot,
    pub file_name: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub profile: ReleaseProfile,
    pub release_archive: PathBuf,
    pub staged: Vec<StagedArchive>,
    pub sha256: Option<String>,
}

pub fn staged_file_name(profile: &ReleaseProfile, root: ArtifactRoot, cfg: &AppConfig) -> String {
    format!("{}-{}.{}", profile.tag(), root.identifier(cfg), ARCHIVE_EXT)
}

pub fn release_archive_path(profile: &ReleaseProfile, cfg: &AppConfig) -> PathBuf {
    cfg.release_dir.join(format!("{}.{}", profile.tag(), ARCHIVE_EXT))
}

fn stage(cfg: &AppConfig, scratch: &ScratchDir, profile: &ReleaseProfile, root: ArtifactRoot) -> Result<StagedArchive> {
    let file_name = staged_file_name(profile, root, cfg);
    let dest = scratch.path().join(&file_name);
    tracing::info!(
        "staging {} groups [{}] from {} into {}",
        root.label(),
        profile.groups.join(", "),
        root.path(cfg).display(),
        file_name
    );
    compress::build_archive(root.path(cfg), &dest, &profile.groups, cfg.compression)?;
    let entries = compress::list_entries(&dest)?.len();
    tracing::debug!("{} holds {} entries", file_name, entries);
    Ok(StagedArchive { root, file_name, entries })
}

/// Produces the release archive for `profile`.
///
/// Any staging or bundling failure aborts the run; the scratch directory is
/// removed whether or not the run succeeds. Callers must not run two
/// packaging runs against the same release directory at once.
pub fn package_release(cfg: &AppConfig, profile: &ReleaseProfile, include_source: bool) -> Result<ReleaseReport> {
    fs::create_dir_all(&cfg.release_dir).map_err(|e| Error::fs(&cfg.release_dir, e))?;
    let scratch = ScratchDir::acquire(cfg.scratch_path())?;

    let mut staged = vec![stage(cfg, &scratch, profile, ArtifactRoot::Compiled)?];
    if include_source {
        staged.push(stage(cfg, &scratch, profile, ArtifactRoot::Source)?);
    }

    let release_archive = release_archive_path(profile, cfg);
    tracing::info!("bundling {} staged archive(s) into {}", staged.len(), release_archive.display());
    compress::bundle_dir(scratch.path(), &release_archive, cfg.compression)?;
    scratch.remove()?;

    let sha256 = if cfg.write_checksum {
        Some(write_checksum(&release_archive)?)
    } else {
        // A sidecar from an earlier run would no longer describe this archive.
        let sidecar = checksum_path(&release_archive);
        if sidecar.exists() {
            fs::remove_file(&sidecar).map_err(|e| Error::fs(&sidecar, e))?;
        }
        None
    };

    Ok(ReleaseReport { profile: profile.clone(), release_archive, staged, sha256 })
}

pub fn checksum_path(archive: &Path) -> PathBuf {
    let mut sidecar = archive.as_os_str().to_owned();
    sidecar.push(".sha256");
    PathBuf::from(sidecar)
}

/// Writes `<archive>.sha256` in `sha256sum` format and returns the digest.
fn write_checksum(archive: &Path) -> Result<String> {
    let digest = compress::sha256_file(archive)?;
    let name = archive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let sidecar = checksum_path(archive);
    fs::write(&sidecar, format!("{}  {}\n", digest, name)).map_err(|e| Error::fs(&sidecar, e))?;
    Ok(digest)
}
