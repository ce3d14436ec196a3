//! Directory packing and unpacking.
//!
//! A published directory tree is serialized into a single gzip-compressed tar
//! archive so the remote store only ever sees one object per directory
//! artifact. Relative paths are the identity: unpacking reproduces exactly
//! the published relative-path set and per-file bytes, including empty
//! directories. Archive work is synchronous, so both directions run under
//! `spawn_blocking`.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::DatastoreError;

/// Pack a directory tree into a gzip-compressed tar archive.
///
/// Entries are recorded with paths relative to `dir`, in sorted order so the
/// archive bytes do not depend on filesystem iteration order. Empty
/// directories get explicit entries.
pub async fn pack_directory(dir: &Path) -> Result<Vec<u8>, DatastoreError> {
    let dir: PathBuf = dir.to_path_buf();
    tokio::task::spawn_blocking(move || pack_directory_blocking(&dir))
        .await
        .map_err(|e| DatastoreError::Io(std::io::Error::other(e)))?
}

fn pack_directory_blocking(dir: &Path) -> Result<Vec<u8>, DatastoreError> {
    let mut entries: Vec<(PathBuf, bool)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| DatastoreError::Io(std::io::Error::other(e)))?;
        entries.push((entry.path().to_path_buf(), entry.file_type().is_dir()));
    }
    entries.sort();

    let encoder: GzEncoder<Vec<u8>> = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder: Builder<GzEncoder<Vec<u8>>> = Builder::new(encoder);

    for (path, is_dir) in &entries {
        // Relative path within the tree is the entry identity.
        let rel: &Path = path
            .strip_prefix(dir)
            .map_err(|e| DatastoreError::Io(std::io::Error::other(e)))?;
        if *is_dir {
            builder.append_dir(rel, path)?;
        } else {
            builder.append_path_with_name(path, rel)?;
        }
    }

    let encoder: GzEncoder<Vec<u8>> = builder.into_inner()?;
    let bytes: Vec<u8> = encoder.finish()?;
    debug!(
        dir = %dir.display(),
        entries = entries.len(),
        bytes = bytes.len(),
        "packed directory"
    );
    Ok(bytes)
}

/// Unpack an archive produced by [`pack_directory`] under `dest`.
///
/// `dest` must already exist. Entries whose paths would escape `dest` make
/// the whole archive corrupt; the caller (the download coordinator's staging
/// step) discards `dest` on any error, so a bad archive never becomes a
/// visible cache entry.
pub async fn unpack_archive(
    bytes: Vec<u8>,
    dest: &Path,
    object_id: &str,
) -> Result<(), DatastoreError> {
    let dest: PathBuf = dest.to_path_buf();
    let object_id: String = object_id.to_string();
    tokio::task::spawn_blocking(move || unpack_archive_blocking(&bytes, &dest, &object_id))
        .await
        .map_err(|e| DatastoreError::Io(std::io::Error::other(e)))?
}

fn unpack_archive_blocking(
    bytes: &[u8],
    dest: &Path,
    object_id: &str,
) -> Result<(), DatastoreError> {
    let corrupt = |message: String| DatastoreError::CorruptArchive {
        object_id: object_id.to_string(),
        message,
    };

    let decoder: GzDecoder<Cursor<&[u8]>> = GzDecoder::new(Cursor::new(bytes));
    let mut archive: Archive<GzDecoder<Cursor<&[u8]>>> = Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| corrupt(format!("unreadable archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| corrupt(format!("unreadable entry: {e}")))?;
        let rel: PathBuf = entry
            .path()
            .map_err(|e| corrupt(format!("invalid entry path: {e}")))?
            .into_owned();

        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(corrupt(format!("entry escapes archive root: {}", rel.display())));
        }

        entry
            .unpack(dest.join(&rel))
            .map_err(|e| corrupt(format!("failed to unpack {}: {e}", rel.display())))?;
    }

    Ok(())
}
