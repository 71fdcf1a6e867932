//! cidpull error types.
//!
//! Errors come in two tiers. A [PullError] is fatal: it ends a run before
//! any fetching happens, or reports why a setup step could not complete.
//! A [FetchError] belongs to a single identifier: it is recorded in that
//! identifier's outcome and the run carries on. [RetrieveError] is what a
//! content client hands back, and becomes a [FetchError::Retrieve].

use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The fatal cidpull error type.
///
/// Configuration, identifier source, node construction and bootstrap
/// failures are reported with this type. It is also the cause carried
/// inside the per-item [FetchError] kinds, which is why it is `Clone`:
/// outcomes are copied into the run report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PullError {
    /// Generic cidpull error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl PullError {
    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }
}

/// The fatal cidpull result type.
pub type PullResult<T> = Result<T, PullError>;

/// A failure reported by a [crate::node::ContentClient] while retrieving
/// an object.
///
/// Retrieval may fail part way through a transfer, in which case the
/// number of bytes received so far is reported in `partial_size`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source}")]
pub struct RetrieveError {
    /// Bytes received before the failure, if known.
    pub partial_size: Option<u64>,

    /// The underlying failure.
    #[source]
    pub source: PullError,
}

impl RetrieveError {
    /// A retrieval failure that received some bytes first.
    pub fn partial(partial_size: u64, source: PullError) -> Self {
        Self {
            partial_size: Some(partial_size),
            source,
        }
    }
}

impl From<PullError> for RetrieveError {
    fn from(source: PullError) -> Self {
        Self {
            partial_size: None,
            source,
        }
    }
}

/// Per-item fetch failure.
///
/// These never abort a run. They are collected into the run report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The identifier token could not be decoded as a CID.
    #[error("error decoding cid: {0}")]
    Decode(PullError),

    /// The content client failed to retrieve the object.
    #[error("error getting cid: {source}")]
    Retrieve {
        /// Bytes received before the failure, if known.
        partial_size: Option<u64>,

        /// The underlying failure.
        #[source]
        source: PullError,
    },

    /// The fetch did not complete before its deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The run was cancelled before the fetch completed.
    #[error("fetch cancelled")]
    Cancelled,

    /// The worker task terminated without reporting.
    #[error("fetch task aborted: {0}")]
    Aborted(Arc<str>),
}

impl FetchError {
    /// Retrieval failures and timeouts may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retrieve { .. } | Self::Timeout(_))
    }
}

impl From<RetrieveError> for FetchError {
    fn from(e: RetrieveError) -> Self {
        Self::Retrieve {
            partial_size: e.partial_size,
            source: e.source,
        }
    }
}
