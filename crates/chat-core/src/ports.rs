//! Port traits — the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use chat_types::{Result, wire::CompletionRequest};

use crate::cancel::CancelSignal;

/// Text chunks of a response body, in arrival order.
///
/// Ends (`None`) when the body is exhausted; yields `Err` on a failure
/// below the protocol layer, after which it should not be polled again.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>>>>;

// ─── Transport Port ──────────────────────────────────────────

#[async_trait(?Send)]
pub trait TransportPort {
    /// Issue the completion request and hand back its body as a chunk
    /// stream. Connection errors and non-success statuses surface here as
    /// `Err`. The transport must stop producing chunks once `cancel` fires.
    async fn open(
        &self,
        endpoint: &str,
        body: &CompletionRequest,
        cancel: CancelSignal,
    ) -> Result<ChunkStream>;

    /// Name of this transport (for logging/debug)
    fn transport_name(&self) -> &str;
}
