//! The `datastore://` URL scheme.
//!
//! `datastore://<store>/<group>/<name>-v<version>` identifies a published
//! file; `datastore://<store>/<group>/<name>-d<version>/<rel/path>` a file
//! inside a published directory. [`UrlResolver`] holds a registry of
//! datastores by store name and opens these identifiers as byte streams, so
//! consumers can dereference a URL without importing the facade API.

use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::datastore::Datastore;
use crate::error::DatastoreError;
use crate::key::{parse_versioned_segment, ArtifactKind};

/// A boxed stream of bytes for artifact content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DatastoreError>> + Send>>;

/// URL scheme understood by the resolver.
pub const SCHEME: &str = "datastore";

/// A parsed `datastore://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreUrl {
    /// Store name (the URL host).
    pub store: String,
    /// Artifact group.
    pub group: String,
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: u32,
    /// File or directory artifact.
    pub kind: ArtifactKind,
    /// Relative path inside a directory artifact. Only valid when `kind` is
    /// [`ArtifactKind::Directory`].
    pub member: Option<PathBuf>,
}

impl DatastoreUrl {
    /// Parse a `datastore://` URL string.
    pub fn parse(input: &str) -> Result<Self, DatastoreError> {
        let invalid = |message: String| DatastoreError::InvalidUrl {
            url: input.to_string(),
            message,
        };

        let url: Url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != SCHEME {
            return Err(invalid(format!("expected scheme {SCHEME:?}, got {:?}", url.scheme())));
        }
        let store: &str = url
            .host_str()
            .ok_or_else(|| invalid("missing store name".to_string()))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let [group, artifact, member @ ..] = segments.as_slice() else {
            return Err(invalid("expected <group>/<name>-v<version> path".to_string()));
        };

        let (name, kind, version) = parse_versioned_segment(artifact)
            .ok_or_else(|| invalid(format!("segment {artifact:?} is not <name>-v<version> or <name>-d<version>")))?;

        let member: Option<PathBuf> = if member.is_empty() {
            None
        } else {
            if kind == ArtifactKind::File {
                return Err(invalid("file urls cannot carry a member path".to_string()));
            }
            let path: PathBuf = member.iter().collect();
            if path.components().any(|c| !matches!(c, Component::Normal(_))) {
                return Err(invalid(format!("member path escapes the artifact: {}", path.display())));
            }
            Some(path)
        };

        Ok(Self {
            store: store.to_string(),
            group: group.to_string(),
            name,
            version,
            kind,
            member,
        })
    }
}

impl FromStr for DatastoreUrl {
    type Err = DatastoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for DatastoreUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{SCHEME}://{}/{}/{}-{}{}",
            self.store,
            self.group,
            self.name,
            self.kind.marker(),
            self.version
        )?;
        if let Some(member) = &self.member {
            for component in member.components() {
                write!(f, "/{}", component.as_os_str().to_string_lossy())?;
            }
        }
        Ok(())
    }
}

/// Registry of datastores, opened by URL.
///
/// This is the generic stream-opening handler: register each datastore once,
/// then any holder of the resolver can dereference `datastore://` URLs.
#[derive(Default)]
pub struct UrlResolver {
    stores: DashMap<String, Arc<Datastore>>,
}

impl UrlResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a datastore under its store name. Replaces any previous
    /// registration for the same name.
    pub fn register(&self, datastore: Arc<Datastore>) {
        self.stores
            .insert(datastore.store_id().name().to_string(), datastore);
    }

    /// Resolve a URL to a local filesystem path, fetching on first access.
    ///
    /// File URLs resolve to the cached file; directory URLs resolve to the
    /// member path under the fetched directory root, or to the root itself
    /// when no member path is given.
    pub async fn resolve_path(&self, url: &str) -> Result<PathBuf, DatastoreError> {
        let parsed: DatastoreUrl = DatastoreUrl::parse(url)?;
        let datastore: Arc<Datastore> = self
            .stores
            .get(&parsed.store)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DatastoreError::UnknownStore {
                store: parsed.store.clone(),
            })?;

        debug!(url, "resolving datastore url");
        match parsed.kind {
            ArtifactKind::File => {
                datastore
                    .file_path(&parsed.group, &parsed.name, parsed.version)
                    .await
            }
            ArtifactKind::Directory => {
                let root: PathBuf = datastore
                    .directory_path(&parsed.group, &parsed.name, parsed.version)
                    .await?;
                match parsed.member {
                    None => Ok(root),
                    Some(member) => {
                        let path: PathBuf = root.join(&member);
                        if !path.exists() {
                            return Err(DatastoreError::MemberNotFound {
                                path: member.display().to_string(),
                            });
                        }
                        Ok(path)
                    }
                }
            }
        }
    }

    /// Open a URL as a byte stream.
    ///
    /// Directory URLs must carry a member path naming a file inside the
    /// artifact; the bytes are identical to reading the path returned by the
    /// facade directly.
    pub async fn open(&self, url: &str) -> Result<ByteStream, DatastoreError> {
        let path: PathBuf = self.resolve_path(url).await?;
        if path.is_dir() {
            return Err(DatastoreError::InvalidUrl {
                url: url.to_string(),
                message: "directory urls need a member path to open as a stream".to_string(),
            });
        }
        open_file_stream(&path).await
    }
}

/// Stream a local file's bytes.
async fn open_file_stream(path: &Path) -> Result<ByteStream, DatastoreError> {
    let file: tokio::fs::File = tokio::fs::File::open(path).await?;
    let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(DatastoreError::Io));
    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_url() {
        let parsed: DatastoreUrl =
            DatastoreUrl::parse("datastore://main/models/weights.bin-v12").unwrap();
        assert_eq!(parsed.store, "main");
        assert_eq!(parsed.group, "models");
        assert_eq!(parsed.name, "weights.bin");
        assert_eq!(parsed.version, 12);
        assert_eq!(parsed.kind, ArtifactKind::File);
        assert_eq!(parsed.member, None);
    }

    #[test]
    fn test_parse_directory_url_with_member() {
        let parsed: DatastoreUrl =
            DatastoreUrl::parse("datastore://main/models/bundle-d3/config/net.json").unwrap();
        assert_eq!(parsed.kind, ArtifactKind::Directory);
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.member, Some(PathBuf::from("config/net.json")));
    }

    #[test]
    fn test_parse_directory_url_without_member() {
        let parsed: DatastoreUrl = DatastoreUrl::parse("datastore://main/g/bundle-d3").unwrap();
        assert_eq!(parsed.kind, ArtifactKind::Directory);
        assert_eq!(parsed.member, None);
    }

    #[test]
    fn test_parse_rejects_wrong_scheme() {
        assert!(matches!(
            DatastoreUrl::parse("http://main/g/a-v1"),
            Err(DatastoreError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_unversioned_segment() {
        assert!(matches!(
            DatastoreUrl::parse("datastore://main/g/plain-name"),
            Err(DatastoreError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_member_on_file_url() {
        assert!(matches!(
            DatastoreUrl::parse("datastore://main/g/a-v1/inner.txt"),
            Err(DatastoreError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_escaping_member() {
        assert!(matches!(
            DatastoreUrl::parse("datastore://main/g/bundle-d1/../../etc/passwd"),
            Err(DatastoreError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for input in [
            "datastore://main/models/weights.bin-v12",
            "datastore://main/models/bundle-d3/config/net.json",
        ] {
            let parsed: DatastoreUrl = DatastoreUrl::parse(input).unwrap();
            assert_eq!(parsed.to_string(), input);
        }
    }

    #[test]
    fn test_parse_rejects_missing_segments() {
        assert!(DatastoreUrl::parse("datastore://main").is_err());
        assert!(DatastoreUrl::parse("datastore://main/g").is_err());
    }
}
