//! Artifact coordinates and remote object id derivation.
//!
//! Every published artifact is identified by (group, name, version, kind).
//! The remote object id is derived deterministically from those coordinates:
//! `{group}/{name}-v{version}` for files and `{group}/{name}-d{version}` for
//! directories. The `v`/`d` marker keeps a file and a directory with the same
//! name and version on distinct remote objects, and the same string doubles as
//! the cache-relative path so remote naming and cache layout stay in lock-step.

use std::fmt;

/// Identifies one logical datastore instance (one remote namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreId(String);

impl StoreId {
    /// Create a store id from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The store name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an artifact is a single file or a packed directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A single file.
    File,
    /// A directory tree, stored remotely as one archive object.
    Directory,
}

impl ArtifactKind {
    /// Single-character marker used in object ids (`v` for files, `d` for
    /// directories).
    pub fn marker(&self) -> char {
        match self {
            ArtifactKind::File => 'v',
            ArtifactKind::Directory => 'd',
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::File => f.write_str("file"),
            ArtifactKind::Directory => f.write_str("directory"),
        }
    }
}

/// Coordinates of one immutable published artifact.
///
/// Versions are chosen by the caller, not auto-incremented; two keys differing
/// only in version are unrelated artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    /// Namespace within the store.
    pub group: String,
    /// Artifact name within the group.
    pub name: String,
    /// Caller-chosen version.
    pub version: u32,
    /// File or directory.
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    /// Create a key for a file artifact.
    pub fn file(group: impl Into<String>, name: impl Into<String>, version: u32) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version,
            kind: ArtifactKind::File,
        }
    }

    /// Create a key for a directory artifact.
    pub fn directory(group: impl Into<String>, name: impl Into<String>, version: u32) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version,
            kind: ArtifactKind::Directory,
        }
    }

    /// Derive the remote object id for these coordinates.
    pub fn object_id(&self) -> RemoteObjectId {
        RemoteObjectId(format!(
            "{}/{}-{}{}",
            self.group,
            self.name,
            self.kind.marker(),
            self.version
        ))
    }

    /// Object id prefix shared by every version of this (group, name, kind).
    ///
    /// Used with `RemoteStore::list` to enumerate published versions.
    pub fn version_prefix(&self) -> String {
        format!("{}/{}-{}", self.group, self.name, self.kind.marker())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {} v{}", self.group, self.name, self.kind, self.version)
    }
}

/// Deterministic remote-storage key derived from artifact coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectId(String);

impl RemoteObjectId {
    /// The object id as a string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when a group or name is safe to embed in an object id.
///
/// Object ids use `/` to separate the group from the versioned name segment,
/// and the cache layout splits on it again, so a `/` inside either coordinate
/// would alias two distinct keys onto one object id (and one cache path).
/// Path-segment names are rejected for the same reason.
pub(crate) fn is_valid_coordinate(value: &str) -> bool {
    !value.is_empty() && !value.contains('/') && value != "." && value != ".."
}

/// Split a `{name}-v{version}` / `{name}-d{version}` segment back into parts.
///
/// The marker is searched from the end so names containing `-v` or `-d` still
/// parse, as long as the trailing suffix is the version. Returns None when no
/// well-formed suffix is present.
pub(crate) fn parse_versioned_segment(segment: &str) -> Option<(String, ArtifactKind, u32)> {
    let idx: usize = segment.rfind('-')?;
    let name: &str = &segment[..idx];
    let suffix: &str = &segment[idx + 1..];
    if name.is_empty() || suffix.len() < 2 {
        return None;
    }

    let kind: ArtifactKind = match suffix.as_bytes()[0] {
        b'v' => ArtifactKind::File,
        b'd' => ArtifactKind::Directory,
        _ => return None,
    };
    let version: u32 = suffix[1..].parse().ok()?;
    Some((name.to_string(), kind, version))
}
