//! Subject-keyed publish/subscribe seam.
//!
//! The transport itself lives outside the node's core logic. Components only
//! see [`MessageBus`]: they publish JSON payloads to named subjects and
//! register one [`MessageHandler`] per subject. Handlers for the same subject
//! are invoked sequentially; different subjects may dispatch concurrently.

mod handler;
mod in_proc;

pub use handler::*;
pub use in_proc::*;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("subject '{0}' already has a handler")]
    AlreadySubscribed(String),

    #[error("bus is closed")]
    Closed,

    #[error("failed to encode payload for '{subject}': {source}")]
    Encode {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode payload for '{subject}': {source}")]
    Decode {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler for '{subject}' failed: {message}")]
    Handler { subject: String, message: String },
}

/// Receives raw payloads for one subject.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, subject: &str, payload: &[u8])
    -> Result<(), BusError>;
}

/// At-least-once publish/subscribe transport keyed by subject name.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish_bytes(
        &self,
        subject: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError>;

    /// Registers the single handler for `subject`.
    async fn subscribe(
        &self,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BusError>;
}

/// Typed helpers layered over any [`MessageBus`].
#[async_trait]
pub trait MessageBusExt: MessageBus {
    async fn publish_json<T>(
        &self,
        subject: &str,
        payload: &T,
    ) -> Result<(), BusError>
    where
        T: Serialize + Sync,
    {
        let bytes =
            serde_json::to_vec(payload).map_err(|source| BusError::Encode {
                subject: subject.to_string(),
                source,
            })?;
        self.publish_bytes(subject, bytes).await
    }
}

impl<B: MessageBus + ?Sized> MessageBusExt for B {}
