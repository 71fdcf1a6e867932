//! Per-identifier fetch results.

use cidpull_api::*;

/// The result of fetching one identifier.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The object was retrieved.
    Fetched {
        /// The identifier as it appeared in the input.
        token: String,

        /// The decoded identifier.
        id: ContentId,

        /// The reported object size in bytes.
        size: u64,
    },

    /// The fetch failed.
    Failed {
        /// The identifier as it appeared in the input.
        token: String,

        /// Why the fetch failed.
        error: FetchError,
    },
}

impl FetchOutcome {
    /// The identifier as it appeared in the input.
    pub fn token(&self) -> &str {
        match self {
            Self::Fetched { token, .. } | Self::Failed { token, .. } => token,
        }
    }

    /// Returns true if the object was retrieved.
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }

    /// The object size, if it was retrieved.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Fetched { size, .. } => Some(*size),
            Self::Failed { .. } => None,
        }
    }

    /// The failure, if the fetch failed.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Fetched { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
