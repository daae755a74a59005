//! UI-agnostic conversation types
//!
//! These types are shared by every front-end (TUI, one-shot CLI commands) and
//! don't depend on any UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ImageError;

/// Who authored a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// The kind of a message, derived from its body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Pending,
}

/// Handle to an image file that will be forwarded to the analysis service.
///
/// Only the path and size are kept; the bytes are read when the request is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    path: PathBuf,
    size: u64,
}

impl ImageRef {
    /// Validate that `path` names a readable regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|source| ImageError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        if !metadata.is_file() {
            return Err(ImageError::NotAFile(path.to_path_buf()));
        }

        // Opening catches permission problems that metadata alone does not.
        std::fs::File::open(path).map_err(|source| ImageError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// File name for display, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub async fn read(&self) -> Result<Vec<u8>, ImageError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ImageError::Unreadable {
                path: self.path.clone(),
                source,
            })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} KB)", self.display_name(), self.size.div_ceil(1024))
    }
}

/// Payload of a message; the variant decides the message kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Image(ImageRef),
    Pending,
}

/// A single entry of the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub body: MessageBody,
}

impl Message {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            body: MessageBody::Text(content.into()),
        }
    }

    pub fn user_image(image: ImageRef) -> Self {
        Self {
            sender: Sender::User,
            body: MessageBody::Image(image),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            body: MessageBody::Text(content.into()),
        }
    }

    /// Placeholder shown while the service is working on a reply
    pub fn pending() -> Self {
        Self {
            sender: Sender::Assistant,
            body: MessageBody::Pending,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Text(_) => MessageKind::Text,
            MessageBody::Image(_) => MessageKind::Image,
            MessageBody::Pending => MessageKind::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.body, MessageBody::Pending)
    }

    /// Text content, present only for text messages
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(content) => Some(content),
            _ => None,
        }
    }

    /// Image handle, present only for image messages
    pub fn image(&self) -> Option<&ImageRef> {
        match &self.body {
            MessageBody::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// A user/assistant exchange rebuilt from the log, sent as chat history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub bot: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_kind_follows_body() {
        assert_eq!(Message::user_text("hi").kind(), MessageKind::Text);
        assert_eq!(Message::pending().kind(), MessageKind::Pending);
        assert!(Message::pending().content().is_none());
        assert_eq!(Message::assistant_text("ok").content(), Some("ok"));
    }

    #[test]
    fn test_image_ref_open_reads_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 2048]).unwrap();

        let image = ImageRef::open(file.path()).unwrap();
        assert_eq!(image.size(), 2048);
        assert!(image.to_string().ends_with("(2 KB)"));

        let message = Message::user_image(image.clone());
        assert_eq!(message.kind(), MessageKind::Image);
        assert_eq!(message.image(), Some(&image));
    }

    #[test]
    fn test_image_ref_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageRef::open(dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, ImageError::Unreadable { .. }));
    }

    #[test]
    fn test_image_ref_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageRef::open(dir.path()).unwrap_err();
        assert!(matches!(err, ImageError::NotAFile(_)));
    }

    #[test]
    fn test_chat_turn_wire_shape() {
        let turn = ChatTurn {
            user: "who painted this?".to_string(),
            bot: "Monet".to_string(),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({ "user": "who painted this?", "bot": "Monet" }));
    }
}
