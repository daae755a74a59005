//! The conversation log backing the chat view.
//!
//! `ConversationStore` is an ordered, append-only list of messages. The only
//! removal it supports is dropping the pending placeholder once a reply (or an
//! error) arrives. Every mutation is reported to the registered observers so a
//! front-end can scroll to the newest entry.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::state::{ChatTurn, Message, MessageBody, Sender};

/// A change applied to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationEvent {
    Appended { index: usize },
    PendingRemoved { index: usize },
}

pub type Observer = Arc<dyn Fn(ConversationEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    observers: Vec<Observer>,
}

/// Shared handle to a conversation log. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct ConversationStore {
    inner: Arc<RwLock<Inner>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked after every mutation.
    ///
    /// Observers run outside the store's lock, so they may read the store.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(ConversationEvent) + Send + Sync + 'static,
    {
        self.write().observers.push(Arc::new(observer));
    }

    /// Add a message to the end of the log
    pub fn append(&self, message: Message) {
        let (index, observers) = {
            let mut inner = self.write();
            inner.messages.push(message);
            (inner.messages.len() - 1, inner.observers.clone())
        };
        tracing::trace!(index, "message appended");
        notify(&observers, ConversationEvent::Appended { index });
    }

    /// Drop the pending placeholder, if there is one.
    ///
    /// Returns the index it occupied. Only one entry is removed per call; with
    /// several placeholders (a caller bug) the most recent goes first.
    pub fn remove_pending(&self) -> Option<usize> {
        let (index, observers) = {
            let mut inner = self.write();
            let index = inner.messages.iter().rposition(Message::is_pending)?;
            inner.messages.remove(index);
            (index, inner.observers.clone())
        };
        tracing::trace!(index, "pending placeholder removed");
        notify(&observers, ConversationEvent::PendingRemoved { index });
        Some(index)
    }

    /// Ordered copy of the log for rendering
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().messages.clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.read().messages.last().cloned()
    }

    pub fn has_pending(&self) -> bool {
        self.read().messages.iter().any(Message::is_pending)
    }

    pub fn len(&self) -> usize {
        self.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().messages.is_empty()
    }

    /// Chat history rebuilt from the text messages currently in the log.
    pub fn history(&self) -> Vec<ChatTurn> {
        build_history(&self.read().messages)
    }

    // A panicking observer runs outside the lock, so poisoning can only come
    // from a panic inside the store itself; the data is still usable then.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("ConversationStore")
            .field("messages", &inner.messages)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

fn notify(observers: &[Observer], event: ConversationEvent) {
    for observer in observers {
        observer(event);
    }
}

/// Pair up consecutive user/assistant text messages.
///
/// Images and the pending placeholder are skipped. An assistant reply with no
/// open user turn (an analysis report, say) becomes a turn with an empty user
/// side; a user message that never got a reply keeps an empty bot side.
pub fn build_history(messages: &[Message]) -> Vec<ChatTurn> {
    let mut turns = Vec::new();
    let mut open: Option<String> = None;

    for message in messages {
        let MessageBody::Text(content) = &message.body else {
            continue;
        };

        match message.sender {
            Sender::User => {
                if let Some(user) = open.take() {
                    turns.push(ChatTurn { user, bot: String::new() });
                }
                open = Some(content.clone());
            }
            Sender::Assistant => {
                let user = open.take().unwrap_or_default();
                turns.push(ChatTurn {
                    user,
                    bot: content.clone(),
                });
            }
        }
    }

    if let Some(user) = open {
        turns.push(ChatTurn { user, bot: String::new() });
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::state::{ImageRef, MessageKind};

    fn image() -> ImageRef {
        // Deserializing skips the filesystem check done by ImageRef::open
        serde_json::from_value(serde_json::json!({ "path": "/tmp/painting.jpg", "size": 10 }))
            .unwrap()
    }

    fn turn(user: &str, bot: &str) -> ChatTurn {
        ChatTurn {
            user: user.to_string(),
            bot: bot.to_string(),
        }
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let store = ConversationStore::new();
        let messages = vec![
            Message::user_text("one"),
            Message::assistant_text("two"),
            Message::user_image(image()),
            Message::user_text("three"),
        ];
        for message in &messages {
            store.append(message.clone());
        }

        assert_eq!(store.snapshot(), messages);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_remove_pending_only_touches_pending() {
        let store = ConversationStore::new();
        store.append(Message::user_text("hello"));
        store.append(Message::pending());
        store.append(Message::assistant_text("late"));
        assert!(store.has_pending());

        assert_eq!(store.remove_pending(), Some(1));
        assert!(!store.has_pending());

        let kinds: Vec<MessageKind> = store.snapshot().iter().map(Message::kind).collect();
        assert_eq!(kinds, vec![MessageKind::Text, MessageKind::Text]);
    }

    #[test]
    fn test_remove_pending_is_idempotent() {
        let store = ConversationStore::new();
        store.append(Message::user_text("hello"));
        store.append(Message::pending());

        store.remove_pending();
        let once = store.snapshot();
        assert_eq!(store.remove_pending(), None);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_remove_pending_on_empty_log_is_noop() {
        let store = ConversationStore::new();
        assert_eq!(store.remove_pending(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_pending_removes_one_at_a_time() {
        let store = ConversationStore::new();
        store.append(Message::pending());
        store.append(Message::user_text("between"));
        store.append(Message::pending());

        assert_eq!(store.remove_pending(), Some(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.remove_pending(), Some(0));
        assert_eq!(store.snapshot(), vec![Message::user_text("between")]);
    }

    #[test]
    fn test_observers_see_every_mutation() {
        let store = ConversationStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |event| sink.lock().unwrap().push(event));

        store.append(Message::user_text("hi"));
        store.append(Message::pending());
        store.remove_pending();
        store.remove_pending();
        store.append(Message::assistant_text("hello"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ConversationEvent::Appended { index: 0 },
                ConversationEvent::Appended { index: 1 },
                ConversationEvent::PendingRemoved { index: 1 },
                ConversationEvent::Appended { index: 1 },
            ]
        );
    }

    #[test]
    fn test_observer_can_read_store() {
        let store = ConversationStore::new();
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let (reader, sink) = (store.clone(), lengths.clone());
        store.subscribe(move |_| sink.lock().unwrap().push(reader.len()));

        store.append(Message::user_text("a"));
        store.append(Message::user_text("b"));

        assert_eq!(*lengths.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_clones_share_the_log() {
        let store = ConversationStore::new();
        let other = store.clone();
        other.append(Message::user_text("shared"));
        assert_eq!(store.last(), Some(Message::user_text("shared")));
    }

    #[test]
    fn test_history_pairs_text_and_skips_images_and_pending() {
        let messages = vec![
            Message::user_text("hi"),
            Message::assistant_text("hello"),
            Message::user_image(image()),
            Message::pending(),
            Message::user_text("what is this?"),
            Message::assistant_text("a water lily"),
        ];

        assert_eq!(
            build_history(&messages),
            vec![turn("hi", "hello"), turn("what is this?", "a water lily")]
        );
    }

    #[test]
    fn test_history_keeps_report_after_image() {
        let messages = vec![
            Message::user_image(image()),
            Message::assistant_text("## Report\nImpressionist"),
            Message::user_text("who painted it?"),
        ];

        assert_eq!(
            build_history(&messages),
            vec![
                turn("", "## Report\nImpressionist"),
                turn("who painted it?", ""),
            ]
        );
    }

    #[test]
    fn test_history_flushes_unanswered_user_turns_in_order() {
        let messages = vec![
            Message::user_text("first"),
            Message::user_text("second"),
            Message::assistant_text("answer"),
        ];

        assert_eq!(
            build_history(&messages),
            vec![turn("first", ""), turn("second", "answer")]
        );
    }

    #[test]
    fn test_history_of_empty_log_is_empty() {
        assert!(ConversationStore::new().history().is_empty());
    }
}
