//! Transport adapters, client identity, and the session event hub.

pub mod hub;
pub mod identity;
pub mod rest;
pub mod stream;

use guessme_types::GuessmeError;

pub use hub::EventHub;
pub use identity::{resolve_client_id, ClientIdStore, FileIdStore, MemoryIdStore};
pub use rest::{DigitPredictor, HttpPredictor};
pub use stream::{
    ConnectionState, FrameRouter, RouteOutcome, StreamConnector, StreamHandler, StreamLink,
    StreamingAdapter, WsConnector,
};

/// Generate an error aligned with transport semantics.
pub fn network_error(message: impl Into<String>) -> GuessmeError {
    GuessmeError::Network(message.into())
}
