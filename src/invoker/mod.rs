//! Consumer side: registered callbacks for consistency messages.
//!
//! ```text
//!   InvokerRegistrar::register_invoker("orders.created", invoker)
//!        │
//!        ▼
//!   QueueSubscription (gated) ──► InvokerDispatch
//!                                     │ decode payload (codec)
//!                                     │ invoker.invoke(payload)
//!                                     │ Executed level? ─► ConfirmMessage ─► reply_to
//!                                     ▼
//!                                  ack / nack
//! ```

mod dispatch;
mod host;
mod invoker;
mod registrar;

pub use dispatch::InvokerDispatch;
pub use host::local_host_info;
pub use invoker::{ConsistencyInvoker, InvokeError};
pub use registrar::InvokerRegistrar;
