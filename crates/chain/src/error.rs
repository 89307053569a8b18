use basalt_codec::CodecError;
use basalt_state_db::StateDbError;
use basalt_vm::VmError;
use thiserror::Error;

use crate::resource::{ResourceCategory, ResourceLimitExceeded};

/// Transaction-local failures (§7's `Reversion` category): caught at the
/// transaction boundary, recorded as `reverted = true` in the receipt, and
/// charge the payer for resources already consumed. Block application
/// continues after one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReversionError {
    #[error("uploaded bytecode is not a valid program")]
    InvalidProgram,

    #[error("event name is invalid")]
    InvalidEventName,

    #[error("account reference is invalid")]
    InvalidAccount,

    #[error("insufficient privileges to perform this operation")]
    InsufficientPrivileges,

    #[error("insufficient resources to complete the operation")]
    InsufficientResources,

    #[error("unknown operation tag: {0}")]
    UnknownOperation(u8),

    #[error("write attempted against a read-only context")]
    ReadOnlyContext,

    #[error("call stack overflow")]
    StackOverflow,

    #[error("bad file descriptor")]
    BadFileDescriptor,
}

impl From<VmError> for ReversionError {
    fn from(value: VmError) -> Self {
        match value {
            VmError::InvalidArguments | VmError::InvalidPointer | VmError::InvalidContext => {
                ReversionError::InvalidAccount
            }
            VmError::ResourceLimitExceeded => ReversionError::InsufficientResources,
            VmError::StackOverflow => ReversionError::StackOverflow,
            _ => ReversionError::InvalidProgram,
        }
    }
}

impl From<ResourceLimitExceeded> for ReversionError {
    fn from(_value: ResourceLimitExceeded) -> Self {
        ReversionError::InsufficientResources
    }
}

/// Block-level failures (§7's `Controller` category): abort block
/// application entirely, without advancing the chain head.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("authorization set does not satisfy the required account")]
    AuthorizationFailure,

    #[error("invalid transaction nonce")]
    InvalidNonce,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("block is malformed")]
    MalformedBlock,

    #[error("transaction is malformed")]
    MalformedTransaction,

    #[error("insufficient resources reserved for this transaction")]
    InsufficientResources,

    #[error("unknown previous block")]
    UnknownPreviousBlock,

    #[error("unexpected block height")]
    UnexpectedHeight,

    #[error("block-level state error: {0}")]
    BlockStateError(String),

    #[error("computed state merkle root does not match the header")]
    StateMerkleMismatch,

    #[error("network id does not match")]
    NetworkIdMismatch,

    #[error("block timestamp is out of bounds")]
    TimestampOutOfBounds,

    #[error("network bandwidth limit exceeded")]
    NetworkBandwidthLimitExceeded,

    #[error("compute bandwidth limit exceeded")]
    ComputeBandwidthLimitExceeded,

    #[error("disk storage limit exceeded")]
    DiskStorageLimitExceeded,

    #[error("block precedes the irreversible chain head")]
    PreIrreversibilityBlock,
}

impl From<StateDbError> for ControllerError {
    fn from(value: StateDbError) -> Self {
        ControllerError::BlockStateError(value.to_string())
    }
}

impl From<CodecError> for ControllerError {
    fn from(_value: CodecError) -> Self {
        ControllerError::MalformedBlock
    }
}

impl From<ResourceLimitExceeded> for ControllerError {
    fn from(value: ResourceLimitExceeded) -> Self {
        match value.0 {
            ResourceCategory::DiskStorage => ControllerError::DiskStorageLimitExceeded,
            ResourceCategory::NetworkBandwidth => ControllerError::NetworkBandwidthLimitExceeded,
            ResourceCategory::ComputeBandwidth => ControllerError::ComputeBandwidthLimitExceeded,
        }
    }
}
