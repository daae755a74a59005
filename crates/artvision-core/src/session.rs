//! Turns user actions into service calls and records the outcome in the log.
//!
//! Both submit operations follow the same shape: record the user's message,
//! add the pending placeholder, call the service, then replace the placeholder
//! with either the reply or a fixed error message. Failures never escape to
//! the caller; they only learn whether a reply was recorded.

use std::sync::Arc;
use std::time::Duration;

use crate::ai::{ArtService, ArtVisionClient};
use crate::conversation::ConversationStore;
use crate::error::ServiceError;
use crate::state::{ImageRef, Message};

/// Shown in place of a reply whenever a request fails
pub const CONNECTION_ERROR_MESSAGE: &str = "❌ Could not connect to the server.";

/// A conversation bound to a service. Cheap to clone; clones share the log.
#[derive(Clone)]
pub struct Session {
    store: ConversationStore,
    service: Arc<dyn ArtService>,
}

impl Session {
    pub fn new(service: Arc<dyn ArtService>) -> Self {
        Self::with_store(ConversationStore::new(), service)
    }

    /// Session talking HTTP to the service at `endpoint`
    pub fn connect(endpoint: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let client = match timeout {
            Some(timeout) => ArtVisionClient::with_timeout(endpoint, timeout)?,
            None => ArtVisionClient::new(endpoint),
        };
        tracing::debug!(endpoint = client.base_url(), ?timeout, "session connected");
        Ok(Self::new(Arc::new(client)))
    }

    pub fn with_store(store: ConversationStore, service: Arc<dyn ArtService>) -> Self {
        Self { store, service }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Send an image for analysis. Returns `true` when the service replied.
    pub async fn submit_image(&self, image: ImageRef) -> bool {
        self.store.append(Message::user_image(image.clone()));
        self.store.append(Message::pending());

        let result = self.service.analyze(&image).await;
        self.store.remove_pending();

        match result {
            Ok(report) => {
                tracing::info!(image = %image.path().display(), "analysis received");
                self.store.append(Message::assistant_text(report));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, image = %image.path().display(), "analysis request failed");
                self.store.append(Message::assistant_text(CONNECTION_ERROR_MESSAGE));
                false
            }
        }
    }

    /// Send a chat message along with the text history so far.
    ///
    /// Blank input is ignored and returns `false`, as does a failed request.
    pub async fn submit_text(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let history = self.store.history();
        self.store.append(Message::user_text(text));
        self.store.append(Message::pending());

        let result = self.service.chat(text, &history).await;
        self.store.remove_pending();

        match result {
            Ok(reply) => {
                tracing::info!(turns = history.len(), "chat reply received");
                self.store.append(Message::assistant_text(reply));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.store.append(Message::assistant_text(CONNECTION_ERROR_MESSAGE));
                false
            }
        }
    }
}
