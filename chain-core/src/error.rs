//! Error handling (spec.md §7).
//!
//! Every error kind in §7 except one is explicitly *not* exceptional to the
//! caller: empty input, query failure/timeout, election ties, depth-exceeded
//! halts and pruner rollback are all logged in place and degrade the result
//! rather than failing the request. `ChainError` exists for the single kind
//! that *does* fail closed: a detected cycle (or other internal
//! inconsistency) that survives the normal guards.
use thiserror::Error;

use crate::model::TraceId;

#[derive(Debug, Error)]
pub enum ChainError {
    /// A cycle or other structurally invalid state was detected after the
    /// guards in builder/extender were supposed to prevent it. Per spec.md
    /// §7 the whole request fails closed rather than returning a
    /// partially-corrupt graph.
    #[error("unrecoverable internal graph state: {0}")]
    CorruptGraph(String),

    /// Invariant violation caught during the root/broken identifier or the
    /// explore-root synthesizer: a `traceId` ended up with more than one
    /// root, or none after the explore-root phase should have guaranteed
    /// one.
    #[error("trace {0} does not have exactly one root after explore-root synthesis")]
    MultipleOrMissingRoots(TraceId),

    /// Open Question 3 (spec.md §9): a `processGuid` was observed under two
    /// different `traceId`s in the same request. The source's one-to-one
    /// assumption is enforced here rather than silently merged.
    #[error("processGuid {guid} observed under multiple traceIds: {first} and {second}")]
    CrossTraceCollision {
        guid: String,
        first: String,
        second: String,
    },
}

pub type ChainResult<T> = Result<T, ChainError>;
