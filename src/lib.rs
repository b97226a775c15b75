//! Transactional outbox with confirmation levels.
//!
//! Producers persist a `ConsistencyRecord` in the same transaction as
//! their business write and send it after the commit; a compensation sweep
//! retries what did not go out. Consumers register invokers per
//! destination and, for `ConfirmLevel::Executed`, reply once the callback
//! succeeded.

pub mod bus;
mod codec;
mod config;
mod confirm;
mod error;
mod invoker;
mod key;
pub mod lock;
mod outbox;
mod record;
pub mod store;
pub mod subscription;
mod transaction;

#[cfg(feature = "bitcode")]
pub use codec::BitcodeCodec;
pub use codec::{Codec, CodecError, JsonCodec};
pub use config::{ConsistencyConfig, CONFIRM_DESTINATION_ENV};
pub use confirm::{
    outbound_message, ConfirmMessage, ConfirmationReceiver, InboundHeaders, CONFIRM_LEVEL_HEADER,
    TX_ID_HEADER,
};
pub use error::{ConsistencyError, ConsistencyResult};
pub use invoker::{local_host_info, ConsistencyInvoker, InvokeError, InvokerDispatch, InvokerRegistrar};
pub use key::{BusinessKey, Keyed};
pub use outbox::{
    CompensationResult, CompensationStats, CompensationWorker, Compensator, ConsistencyHandler,
    RetryPolicy, EXHAUSTED_CAUSE, ROLLED_BACK_CAUSE,
};
pub use record::{
    ConfirmLevel, ConfirmStatus, ConsistencyRecord, RetryStatus, DEFAULT_RETRY_INTERVAL_SECS,
};
pub use transaction::{AfterCommit, CommitAction, NoTransaction, TransactionScope};
