//! Reading single files out of release archives.
//!
//! Release archives are gzipped tarballs or zip files. The binary may sit at
//! any depth inside the archive, so lookups match on the file name of an
//! entry rather than on its full path.
use std::{
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use fs_err::File;

use crate::error::ExtractError;

/// The archive formats a release can be published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detects the format from the suffix of `file_name`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if file_name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// The extension used in published archive names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// An archive on disk together with its format.
#[derive(Debug, Clone)]
pub enum ArchiveReader {
    TarGz(PathBuf),
    Zip(PathBuf),
}

/// The last path component of an archive entry name.
fn entry_file_name(entry: &str) -> &str {
    let trimmed = entry.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

fn tar_error(err: std::io::Error) -> ExtractError {
    ExtractError::TarExtractionError(err.to_string())
}

fn zip_error(err: zip::result::ZipError) -> ExtractError {
    match err {
        zip::result::ZipError::FileNotFound => {
            ExtractError::EntryNotFound("<unknown>".to_string())
        }
        zip::result::ZipError::Io(err) => ExtractError::from(err),
        other => ExtractError::ZipExtractionError(other.to_string()),
    }
}

impl ArchiveReader {
    /// Opens the archive at `path`, choosing the format from its file name.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let format = ArchiveFormat::from_file_name(&file_name)
            .ok_or(ExtractError::UnsupportedArchive(file_name))?;

        // Surface a missing file here rather than on first read.
        fs_err::metadata(&path)?;

        Ok(match format {
            ArchiveFormat::TarGz => Self::TarGz(path),
            ArchiveFormat::Zip => Self::Zip(path),
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        match self {
            Self::TarGz(_) => ArchiveFormat::TarGz,
            Self::Zip(_) => ArchiveFormat::Zip,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::TarGz(path) | Self::Zip(path) => path,
        }
    }

    /// Names of all regular files in the archive, in archive order.
    pub fn list_entries(&self) -> Result<Vec<String>, ExtractError> {
        match self {
            Self::TarGz(path) => {
                let mut names = Vec::new();
                scan_tar(path, |name| {
                    names.push(name.to_string());
                    false
                })?;
                Ok(names)
            }
            Self::Zip(path) => {
                let archive = open_zip(path)?;
                Ok(archive
                    .file_names()
                    .filter(|name| !name.ends_with('/'))
                    .map(str::to_string)
                    .collect())
            }
        }
    }

    /// The first regular file whose file name equals `file_name`, at any depth.
    pub fn find_entry(&self, file_name: &str) -> Result<Option<String>, ExtractError> {
        Ok(self
            .list_entries()?
            .into_iter()
            .find(|entry| entry_file_name(entry) == file_name))
    }

    /// Writes the contents of the entry called `entry_name` to `writer` and
    /// returns the number of bytes written.
    pub fn extract(&self, entry_name: &str, writer: &mut dyn Write) -> Result<u64, ExtractError> {
        match self {
            Self::TarGz(path) => extract_tar_entry(path, |name| name == entry_name, writer)?
                .map(|(_, written)| written)
                .ok_or_else(|| ExtractError::EntryNotFound(entry_name.to_string())),
            Self::Zip(path) => {
                let mut archive = open_zip(path)?;
                let mut file = archive.by_name(entry_name).map_err(|err| match zip_error(err) {
                    ExtractError::EntryNotFound(_) => {
                        ExtractError::EntryNotFound(entry_name.to_string())
                    }
                    other => other,
                })?;
                if file.is_dir() {
                    return Err(ExtractError::EntryNotFound(entry_name.to_string()));
                }
                Ok(std::io::copy(&mut file, writer)?)
            }
        }
    }

    /// Finds the first regular file named `file_name` and writes it to
    /// `writer`, returning the full entry name.
    ///
    /// Tarballs are scanned once; zip archives look the entry up in their
    /// central directory.
    pub fn extract_file_named(
        &self,
        file_name: &str,
        writer: &mut dyn Write,
    ) -> Result<String, ExtractError> {
        match self {
            Self::TarGz(path) => {
                extract_tar_entry(path, |name| entry_file_name(name) == file_name, writer)?
                    .map(|(name, _)| name)
                    .ok_or_else(|| ExtractError::EntryNotFound(file_name.to_string()))
            }
            Self::Zip(_) => {
                let entry = self
                    .find_entry(file_name)?
                    .ok_or_else(|| ExtractError::EntryNotFound(file_name.to_string()))?;
                self.extract(&entry, writer)?;
                Ok(entry)
            }
        }
    }
}

fn open_tar(path: &Path) -> Result<tar::Archive<GzDecoder<BufReader<File>>>, ExtractError> {
    let file = File::open(path)?;
    Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
}

/// Visits the regular files of a tarball until `visit` returns true.
fn scan_tar(path: &Path, mut visit: impl FnMut(&str) -> bool) -> Result<(), ExtractError> {
    let mut archive = open_tar(path)?;
    for entry in archive.entries().map_err(tar_error)? {
        let entry = entry.map_err(tar_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_err(tar_error)?.to_string_lossy().into_owned();
        if visit(&name) {
            break;
        }
    }
    Ok(())
}

/// Copies the first regular file accepted by `matches` into `writer`.
fn extract_tar_entry(
    path: &Path,
    matches: impl Fn(&str) -> bool,
    writer: &mut dyn Write,
) -> Result<Option<(String, u64)>, ExtractError> {
    let mut archive = open_tar(path)?;
    for entry in archive.entries().map_err(tar_error)? {
        let mut entry = entry.map_err(tar_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_err(tar_error)?.to_string_lossy().into_owned();
        if matches(&name) {
            let written = std::io::copy(&mut entry, writer)?;
            return Ok(Some((name, written)));
        }
    }
    Ok(None)
}

fn open_zip(path: &Path) -> Result<zip::ZipArchive<BufReader<File>>, ExtractError> {
    let file = File::open(path)?;
    zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ExtractError::InvalidZip(e.to_string()))
}
