pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{ArtService, ArtVisionClient};
pub use config::Config;
pub use conversation::{ConversationEvent, ConversationStore};
pub use error::{ConfigError, ImageError, ServiceError};
pub use session::{Session, CONNECTION_ERROR_MESSAGE};
pub use state::{ChatTurn, ImageRef, Message, MessageBody, MessageKind, Sender};
