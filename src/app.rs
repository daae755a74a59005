use artvision_core::{ImageRef, Message, Session};
use ratatui::layout::Rect;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// What the input bar is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    Message,
    ImagePath,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub input_target: InputTarget,

    // Input bar
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_lines: u16,  // wrapped line count of the log, set during render
    pub follow_tail: bool, // keep the newest line in view on the next render
    pub chat_area: Option<Rect>,

    // Request in flight; the session itself records the outcome
    pub request_task: Option<JoinHandle<()>>,

    // One-line notice shown over the footer until the next key press
    pub alert: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub endpoint: String,
    pub session: Session,
}

impl App {
    pub fn new(session: Session, endpoint: String) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Welcome,
            input_mode: InputMode::Normal,
            input_target: InputTarget::Message,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_lines: 0,
            follow_tail: true,
            chat_area: None,

            request_task: None,
            alert: None,
            animation_frame: 0,

            endpoint,
            session,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.store().snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.request_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Drop the handle of a finished request, logging a task that panicked
    pub fn reap_request_task(&mut self) {
        if self.request_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.request_task.take() {
                // A finished task resolves immediately
                if let Some(Err(e)) = futures_util::FutureExt::now_or_never(task) {
                    tracing::error!(error = %e, "request task failed");
                }
            }
        }
    }

    pub fn start_editing(&mut self, target: InputTarget) {
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        self.input_target = target;
        self.input.clear();
        self.input_cursor = 0;
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Submit the input bar as either a chat message or an image path
    pub fn submit_input(&mut self) {
        if self.is_busy() {
            self.alert = Some("Wait for the current reply before sending again".to_string());
            return;
        }

        let input = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.input_mode = InputMode::Normal;

        match self.input_target {
            InputTarget::Message => self.send_message(input),
            InputTarget::ImagePath => self.send_image(input.trim()),
        }
    }

    fn send_message(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }

        let session = self.session.clone();
        self.request_task = Some(tokio::spawn(async move {
            session.submit_text(&text).await;
        }));
    }

    fn send_image(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }

        // Unavailable images are reported here, before anything is logged or sent
        let image = match ImageRef::open(expand_home(path)) {
            Ok(image) => image,
            Err(e) => {
                tracing::info!(error = %e, "image rejected");
                self.alert = Some(e.to_string());
                return;
            }
        };

        let session = self.session.clone();
        self.request_task = Some(tokio::spawn(async move {
            session.submit_image(image).await;
        }));
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.store().has_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input bar editing; the cursor counts chars, the buffer is UTF-8

    fn cursor_byte(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.input_cursor)
            .map_or(self.input.len(), |(byte, _)| byte)
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.cursor_byte();
        self.input.insert(at, c);
        self.input_cursor += 1;
    }

    /// Backspace
    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        let at = self.cursor_byte();
        self.input.remove(at);
    }

    /// Delete
    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input_chars() {
            let at = self.cursor_byte();
            self.input.remove(at);
        }
    }

    pub fn move_cursor(&mut self, offset: isize) {
        let target = self.input_cursor.saturating_add_signed(offset);
        self.input_cursor = target.min(self.input_chars());
    }

    pub fn cursor_to_start(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_to_end(&mut self) {
        self.input_cursor = self.input_chars();
    }

    /// Switch between a message and an image path, keeping what was typed
    pub fn toggle_input_target(&mut self) {
        self.input_target = match self.input_target {
            InputTarget::Message => InputTarget::ImagePath,
            InputTarget::ImagePath => InputTarget::Message,
        };
    }

    // Chat scrolling

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_tail = self.chat_scroll == self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down(self.visible_height() / 2);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up(self.visible_height() / 2);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    /// Scroll so the newest line is visible, now and after the next render
    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }

    /// Record the wrapped size of the log measured by the renderer
    pub fn set_chat_lines(&mut self, lines: usize) {
        self.chat_lines = u16::try_from(lines).unwrap_or(u16::MAX);
        if self.follow_tail {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.visible_height())
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> std::path::PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => std::path::PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use artvision_core::{ArtService, ChatTurn, ServiceError};

    struct Unreachable;

    #[async_trait::async_trait]
    impl ArtService for Unreachable {
        async fn analyze(&self, _image: &ImageRef) -> Result<String, ServiceError> {
            Err(ServiceError::MalformedBody("offline".to_string()))
        }

        async fn chat(&self, _message: &str, _history: &[ChatTurn]) -> Result<String, ServiceError> {
            Err(ServiceError::MalformedBody("offline".to_string()))
        }
    }

    fn app() -> App {
        App::new(Session::new(Arc::new(Unreachable)), "http://test".to_string())
    }

    #[tokio::test]
    async fn test_missing_image_raises_alert_without_touching_log() {
        let mut app = app();
        let dir = tempfile::tempdir().unwrap();
        app.start_editing(InputTarget::ImagePath);
        app.input = dir.path().join("missing.jpg").display().to_string();

        app.submit_input();

        assert!(app.alert.is_some());
        assert!(app.request_task.is_none());
        assert!(app.session.store().is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_blank_message_spawns_nothing() {
        let mut app = app();
        app.start_editing(InputTarget::Message);
        app.input = "   ".to_string();

        app.submit_input();

        assert!(app.request_task.is_none());
        assert!(app.session.store().is_empty());
    }

    #[tokio::test]
    async fn test_message_is_sent_in_background() {
        let mut app = app();
        app.start_editing(InputTarget::Message);
        app.input = "hello".to_string();

        app.submit_input();
        let task = app.request_task.take().unwrap();
        task.await.unwrap();

        let log = app.messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], Message::user_text("hello"));
        assert_eq!(log[1].content(), Some(artvision_core::CONNECTION_ERROR_MESSAGE));
    }

    #[test]
    fn test_scroll_is_clamped_to_measured_lines() {
        let mut app = app();
        app.chat_height = 4;
        app.set_chat_lines(15);
        assert_eq!(app.chat_scroll, 11);

        app.scroll_up(3);
        assert!(!app.follow_tail);
        app.scroll_down(10);
        assert_eq!(app.chat_scroll, 11);
        assert!(app.follow_tail);

        app.scroll_to_top();
        // A longer log keeps the reader where they were
        app.set_chat_lines(30);
        assert_eq!(app.chat_scroll, 0);

        app.scroll_chat_to_bottom();
        app.set_chat_lines(40);
        assert_eq!(app.chat_scroll, 36);
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = app();
        for c in "café☕".chars() {
            app.insert_char(c);
        }
        app.move_cursor(-2);
        app.insert_char('!');
        assert_eq!(app.input, "caf!é☕");

        app.delete_at_cursor();
        assert_eq!(app.input, "caf!☕");
        app.delete_before_cursor();
        assert_eq!(app.input, "caf☕");
        assert_eq!(app.input_cursor, 3);

        app.move_cursor(10);
        assert_eq!(app.input_cursor, 4);
        app.cursor_to_start();
        app.delete_before_cursor();
        assert_eq!(app.input, "caf☕");
        app.move_cursor(-1);
        assert_eq!(app.input_cursor, 0);
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/art/mona.jpg"), home.join("art/mona.jpg"));
        }
        assert_eq!(expand_home("/tmp/a.jpg"), std::path::PathBuf::from("/tmp/a.jpg"));
    }
}
