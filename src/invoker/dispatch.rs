use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::{ConsistencyInvoker, InvokeError};
use crate::bus::{Message, Sender};
use crate::codec::Codec;
use crate::confirm::{ConfirmMessage, InboundHeaders};
use crate::error::{ConsistencyError, ConsistencyResult};
use crate::subscription::MessageHandler;

/// Wraps an invoker with decoding, error mapping and the execution reply.
pub struct InvokerDispatch<P, I, C, S> {
    destination: String,
    invoker: I,
    codec: C,
    replies: Arc<S>,
    host_info: String,
    _payload: PhantomData<fn() -> P>,
}

impl<P, I, C, S> InvokerDispatch<P, I, C, S>
where
    P: DeserializeOwned + 'static,
    I: ConsistencyInvoker<P>,
    C: Codec,
    S: Sender + 'static,
{
    pub fn new(
        destination: impl Into<String>,
        invoker: I,
        codec: C,
        replies: Arc<S>,
        host_info: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            invoker,
            codec,
            replies,
            host_info: host_info.into(),
            _payload: PhantomData,
        }
    }

    /// Handle one delivery.
    ///
    /// Any `Err` means the message was not processed and must be nacked.
    /// No reply is sent in that case.
    pub fn dispatch(&self, message: &Message) -> ConsistencyResult<()> {
        let headers = InboundHeaders::parse(message);
        let tx_id = headers.tx_id_or_default();

        let payload: P = self
            .codec
            .decode(&message.payload)
            .map_err(|e| self.execution_failed(tx_id, e.into()))?;
        self.invoker
            .invoke(payload)
            .map_err(|e| self.execution_failed(tx_id, e))?;

        debug!(destination = %self.destination, tx_id, "consistency message executed");

        if headers.wants_confirmation() {
            let reply_to = message
                .reply_to
                .as_deref()
                .filter(|d| !d.is_empty())
                .ok_or_else(ConsistencyError::no_confirm_destination)?;
            let reply = ConfirmMessage::executed(tx_id, self.host_info.as_str()).to_message()?;
            self.replies.send(reply_to, reply)?;
            debug!(tx_id, reply_to, "execution confirmed");
        }
        Ok(())
    }

    fn execution_failed(&self, tx_id: &str, source: InvokeError) -> ConsistencyError {
        error!(
            destination = %self.destination,
            tx_id,
            invoker = self.invoker.name(),
            error = %source,
            "consistency invocation failed"
        );
        ConsistencyError::Execution {
            tx_id: tx_id.to_string(),
            source,
        }
    }

    pub fn into_handler(self) -> MessageHandler {
        let dispatch = Arc::new(self);
        Arc::new(move |message: &Message| dispatch.dispatch(message))
    }
}
