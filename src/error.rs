use thiserror::Error;

use crate::bus::PublishError;
use crate::codec::CodecError;
use crate::invoker::InvokeError;
use crate::lock::LockError;
use crate::store::StoreError;

/// Message used whenever an EXECUTED-level record has no reply channel.
pub(crate) const NO_CONFIRM_DESTINATION: &str = "no confirm destination configured";

/// Error type for the consistency core.
///
/// Only programmer errors (bad arguments, bad configuration) and
/// collaborator failures surface here. Transient publish failures inside
/// the retry path are folded into the record's `fail_cause` instead.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// Caller passed an unusable argument (empty payload, empty destination).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration or lifecycle misuse (missing confirm destination,
    /// duplicate registration, closed subscription).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Store collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Payload or reply could not be encoded/decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport rejected a send or a receive.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Per-record lock could not be acquired.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// A registered invoker failed; the delivery must not be acknowledged.
    #[error("consistency invocation failed (txId={tx_id}): {source}")]
    Execution {
        tx_id: String,
        #[source]
        source: InvokeError,
    },
}

impl ConsistencyError {
    pub(crate) fn no_confirm_destination() -> Self {
        ConsistencyError::IllegalState(NO_CONFIRM_DESTINATION.to_string())
    }
}

pub type ConsistencyResult<T> = Result<T, ConsistencyError>;
