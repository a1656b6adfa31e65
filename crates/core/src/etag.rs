use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::resource::ResourceKind;
use crate::value::Value;

const DIGEST_LEN: usize = 16;

/// Version token attached to every published resource state.
///
/// `sequence` is drawn from a store-wide counter and never repeats, so the
/// token changes on every write even when the content does not. `digest`
/// is a BLAKE3 prefix over the canonical encoding of the published content,
/// so equal tokens always denote equal values.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Etag {
    sequence: u64,
    digest: [u8; DIGEST_LEN],
}

impl Etag {
    pub fn compute(sequence: u64, kind: ResourceKind, value: &Value) -> Result<Self, CoreError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&value.to_msgpack()?);
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&hasher.finalize().as_bytes()[..DIGEST_LEN]);
        Ok(Self { sequence, digest })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// True when both tokens were computed over the same content, regardless
    /// of which write produced them.
    pub fn same_content(&self, other: &Etag) -> bool {
        self.digest == other.digest
    }
}

impl fmt::Debug for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Etag({self})")
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.sequence)?;
        for byte in &self.digest[..4] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
