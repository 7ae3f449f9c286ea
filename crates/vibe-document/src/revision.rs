//! Content revisions
//!
//! Provides [`Revision`], a Blake3 digest over a variant's markup and CSS.
//! Two variants with identical content share a revision, which makes it
//! usable as a cache key for analyses and as an optimistic-concurrency tag
//! on the HTTP surface.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Separator fed to the hasher between markup and CSS so that
/// `("ab", "c")` and `("a", "bc")` never collide.
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// 32-byte content revision (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision([u8; 32]);

impl Revision {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest of a document's markup and stylesheet
    #[must_use]
    pub fn of(html: &str, css: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(html.as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(css.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Digest of arbitrary bytes
    #[inline]
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex characters, for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| RevisionError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors from parsing a textual revision
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// Input was not hex
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Input decoded to the wrong number of bytes
    #[error("revision must be 32 bytes, got {0}")]
    InvalidLength(usize),
}
