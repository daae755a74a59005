pub mod artvision;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::state::{ChatTurn, ImageRef};

pub use artvision::ArtVisionClient;

/// The remote analysis/chat backend
#[async_trait]
pub trait ArtService: Send + Sync {
    /// Upload an image and return the generated analysis report
    async fn analyze(&self, image: &ImageRef) -> Result<String, ServiceError>;

    /// Send a chat message with the prior conversation and return the reply
    async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String, ServiceError>;
}
