//! Streaming conversation engine.
//!
//! `decoder` turns the chat response body into [`protocol::StreamEvent`]s,
//! `reducer` folds them into the assistant [`types::Message`], `phase`
//! derives the progress label shown before the first token, and `session`
//! ties one turn at a time to the transport.

pub mod decoder;
pub mod phase;
pub mod protocol;
pub mod reducer;
pub mod session;
pub mod types;

use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;

pub use decoder::Decoded;
pub use phase::{resolve_phase, Phase};
pub use session::{SessionController, SubmitRejected, Turn, TurnOutcome};
pub use types::{ChatRequest, ContextBlock, Message, RoleContext};

/// Raw response body of one chat turn, chunk by chunk.
pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<Vec<u8>>> + Send>>;

/// Opens the streaming response for one turn. Each call owns its own
/// connection; nothing is pooled across turns at this level.
pub trait ChatTransport: Clone + Send + Sync + 'static {
    fn open_chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = anyhow::Result<ChunkStream>> + Send;
}
