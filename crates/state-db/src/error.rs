use basalt_common::Digest;
use thiserror::Error;

/// The `state_db` error category from the specification's error taxonomy
/// (§7), covering both the delta/backend layer and the index/database layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateDbError {
    #[error("state node is finalized and accepts no further writes")]
    NotFinalized,

    #[error("operation requires a complete state node")]
    NotComplete,

    #[error("parent state node must be complete before a child can be created from it")]
    ParentNotComplete,

    #[error("parent state node must not be complete for a squash to apply to it")]
    ParentAlreadyComplete,

    #[error("state node {0} was not found in the index")]
    UnknownNode(Digest),

    #[error("state node {0} already exists in the index")]
    DuplicateNode(Digest),

    #[error("a node being squashed or discarded has live children")]
    NodeHasChildren,

    #[error("the database has no root; call reset() or open() with a genesis root first")]
    NoRoot,

    #[error("requested revision {0} does not exist on any known fork")]
    UnknownRevision(u64),
}
