//! Image domain types

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Tag appended to untagged references before a pull
pub const DEFAULT_TAG: &str = "latest";

/// A named container image, optionally tagged or pinned by digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Name exactly as supplied (e.g. "registry.example.com/agent:1.0")
    name: String,
    /// Repository part without tag or digest
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    /// Parses an image reference
    ///
    /// The tag is the text after the last `:` that follows the last `/`, so a
    /// registry port (`host:5000/img`) is not mistaken for a tag.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidImageRef {
                reference: name.to_string(),
                reason: "image name is empty".to_string(),
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidImageRef {
                reference: name.to_string(),
                reason: "image name contains whitespace".to_string(),
            });
        }

        let (rest, digest) = match name.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (name, None),
        };

        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&rest[..split], Some(rest[split + 1..].to_string()))
            }
            None => (rest, None),
        };

        if repository.is_empty() || tag.as_deref() == Some("") || digest.as_deref() == Some("") {
            return Err(CoreError::InvalidImageRef {
                reference: name.to_string(),
                reason: "empty repository, tag or digest".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// The name as originally supplied, used for inspection lookups
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Reference handed to the pull call
    ///
    /// A name with neither `:` nor `@` gets `:latest` appended so the pull
    /// fetches one tag instead of every tag of the repository.
    pub fn pull_reference(&self) -> String {
        if self.name.contains([':', '@']) {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, DEFAULT_TAG)
        }
    }

    /// Tag used when pushing; untagged images push `latest`
    pub fn push_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An image known to be present on the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub image: ImageRef,
    /// Opaque identifier assigned by the engine (e.g. "sha256:...")
    pub id: String,
    /// True when the pull failed and a previously cached copy is used
    pub stale: bool,
}

impl ResolvedImage {
    /// Short form of the identifier for display (12 hex chars, no algorithm)
    pub fn short_id(&self) -> &str {
        let hex = self
            .id
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(&self.id);
        &hex[..hex.len().min(12)]
    }
}
