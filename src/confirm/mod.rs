//! Confirmation protocol.
//!
//! Producer side: every outbound message carries `txId` and
//! `confirmLevel` headers; EXECUTED-level messages also name the queue the
//! consumer must reply on. Consumer side (see `invoker`): after a
//! successful invocation of an EXECUTED-level message, a `ConfirmMessage`
//! goes back on that queue. Producer side again: `ConfirmationReceiver`
//! applies the reply to the stored record.

mod message;
mod protocol;
mod receiver;

pub use message::ConfirmMessage;
pub use protocol::{outbound_message, InboundHeaders, CONFIRM_LEVEL_HEADER, TX_ID_HEADER};
pub use receiver::ConfirmationReceiver;
