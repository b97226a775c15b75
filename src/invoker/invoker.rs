use std::error::Error;

use thiserror::Error;

use crate::codec::CodecError;

/// Why a consumer callback did not complete.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("payload could not be decoded: {0}")]
    Decode(#[from] CodecError),

    /// The callback refused the message; it will be redelivered.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

impl InvokeError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        InvokeError::Rejected(reason.into())
    }
}

/// Business callback for one destination's messages.
pub trait ConsistencyInvoker<T>: Send + Sync + 'static {
    fn invoke(&self, payload: T) -> Result<(), InvokeError>;

    /// Label used in logs and duplicate-registration errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T, F> ConsistencyInvoker<T> for F
where
    F: Fn(T) -> Result<(), InvokeError> + Send + Sync + 'static,
{
    fn invoke(&self, payload: T) -> Result<(), InvokeError> {
        self(payload)
    }
}
