//! Combined trait for bidirectional queue communication.

use super::listener::Listener;
use super::sender::Sender;

/// A transport that can both send and listen.
pub trait Transport: Sender + Listener {}

// Blanket implementation
impl<T: Sender + Listener + ?Sized> Transport for T {}
