//! Content identifier types.

use crate::*;

/// Multihash code of the identity "hash", which inlines the data itself.
pub const MH_IDENTITY: u64 = 0x00;

/// Multihash code of sha2-256.
pub const MH_SHA2_256: u64 = 0x12;

/// Codec of a Filecoin unsealed sector commitment (CommD).
pub const CODEC_FIL_COMMITMENT_UNSEALED: u64 = 0xf101;

/// Codec of a Filecoin sealed sector commitment (CommR).
pub const CODEC_FIL_COMMITMENT_SEALED: u64 = 0xf102;

/// Codec of raw binary blocks.
pub const CODEC_RAW: u64 = 0x55;

/// A self-describing content address.
///
/// Parsed from a text token, either a base58 CIDv0 (`Qm...`) or a
/// multibase encoded CIDv1 (`bafy...`). Immutable once parsed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentId(pub cid::Cid);

impl std::ops::Deref for ContentId {
    type Target = cid::Cid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<cid::Cid> for ContentId {
    fn from(c: cid::Cid) -> Self {
        Self(c)
    }
}

impl std::fmt::Debug for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ContentId {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        cid::Cid::try_from(s.trim())
            .map(Self)
            .map_err(|e| PullError::other_src(format!("invalid cid {s:?}"), e))
    }
}

impl ContentId {
    /// The multihash function code of this identifier.
    pub fn hash_code(&self) -> u64 {
        self.0.hash().code()
    }

    /// The multicodec of the addressed content.
    pub fn codec(&self) -> u64 {
        self.0.codec()
    }

    /// Returns true if following a link to this identifier cannot yield
    /// a fetchable block.
    ///
    /// Identity hashes carry their data inline, and Filecoin piece
    /// commitments do not address blocks at all.
    pub fn is_unwalkable(&self) -> bool {
        if self.hash_code() == MH_IDENTITY {
            return true;
        }

        matches!(
            self.codec(),
            CODEC_FIL_COMMITMENT_SEALED | CODEC_FIL_COMMITMENT_UNSEALED
        )
    }
}

/// Drop links which cannot be walked to a fetchable block.
///
/// Retrieval is currently flat, so nothing in the fetch pipeline walks
/// links. This is the filter a link-traversal strategy must apply.
pub fn filter_unwalkable_links(links: &[ContentId]) -> Vec<ContentId> {
    links
        .iter()
        .filter(|l| !l.is_unwalkable())
        .copied()
        .collect()
}
