use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use artvision_core::{MessageBody, Sender};
use crate::app::{App, InputMode, InputTarget, Screen};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Render a block of markdown: headings, bullet items and inline bold
fn render_markdown(text: &str) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();

            let heading_level = trimmed.chars().take_while(|c| *c == '#').count();
            if (1..=6).contains(&heading_level) && trimmed[heading_level..].starts_with(' ') {
                let title = trimmed[heading_level..].trim().to_string();
                return Line::from(Span::styled(
                    title,
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                ));
            }

            if let Some(item) = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
            {
                let indent = " ".repeat(line.len() - trimmed.len());
                let mut spans = vec![Span::raw(format!("{indent}• "))];
                spans.extend(parse_markdown_line(item).spans);
                return Line::from(spans);
            }

            parse_markdown_line(line)
        })
        .collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Welcome => render_welcome_screen(frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if let Some(alert) = &app.alert {
        render_alert(alert, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ArtVision ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.endpoint.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Welcome, _) => " HOME ",
        (Screen::Chat, InputMode::Normal) => " CHAT ",
        (Screen::Chat, InputMode::Editing) => match app.input_target {
            InputTarget::Message => " MESSAGE ",
            InputTarget::ImagePath => " IMAGE ",
        },
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (Screen::Welcome, _) => &[(" Enter ", " start "), (" o ", " image "), (" q ", " quit ")],
        (Screen::Chat, InputMode::Normal) => &[
            (" i ", " message "),
            (" o ", " image "),
            (" j/k ", " scroll "),
            (" G ", " latest "),
            (" Esc ", " home "),
            (" q ", " quit "),
        ],
        (Screen::Chat, InputMode::Editing) => &[
            (" Enter ", " send "),
            (" Tab ", " message/image "),
            (" Esc ", " stop typing "),
        ],
    };

    let hints = keys.iter().flat_map(|(key, label)| {
        [Span::styled(*key, key_style), Span::styled(*label, label_style)]
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_welcome_screen(frame: &mut Frame, area: Rect) {
    let [_, content_area, _] = Layout::vertical([
        Constraint::Percentage(35),
        Constraint::Length(7),
        Constraint::Min(0),
    ])
    .areas(area);

    let text = Text::from(vec![
        Line::from(Span::styled(
            "🎨 ArtVision",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Welcome! Analyze works of art using AI."),
        Line::from(Span::styled(
            "Send a photo of an artwork or ask a question about one.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Yellow).bold()),
            Span::raw(" to start analyzing"),
        ]),
    ]);

    let welcome = Paragraph::new(text).alignment(Alignment::Center);
    frame.render_widget(welcome, content_area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store area for mouse hit-testing and inner height for scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    let inner_width = chat_area.width.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let messages = app.messages();
    let chat_text = if messages.is_empty() {
        Text::from(Span::styled(
            "Send an image (o) or a message (i) to begin...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let user_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let bot_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let mut lines: Vec<Line> = Vec::new();

        for msg in &messages {
            match msg.sender {
                Sender::User => lines.push(Line::from(Span::styled("You:", user_style))),
                Sender::Assistant => lines.push(Line::from(Span::styled("ArtVision:", bot_style))),
            }

            match &msg.body {
                MessageBody::Text(content) => match msg.sender {
                    Sender::User => lines.extend(content.lines().map(|l| Line::from(l.to_string()))),
                    Sender::Assistant => lines.extend(render_markdown(content)),
                },
                MessageBody::Image(image) => {
                    lines.push(Line::from(Span::styled(
                        format!("🖼  {image}"),
                        Style::default().fg(Color::Green),
                    )));
                }
                MessageBody::Pending => {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("ArtVision is analyzing{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    // Measure with the same wrapping that draws it, before the border is added
    let chat = Paragraph::new(chat_text).wrap(Wrap { trim: false });
    app.set_chat_lines(chat.line_count(inner_width));

    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = match (editing, app.input_target) {
        (false, _) => " Message (i) · Image path (o) ",
        (true, InputTarget::Message) => " Message ",
        (true, InputTarget::ImagePath) => " Image path ",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_alert(message: &str, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let popup_height = 6.min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Notice ");

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Press any key to dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let popup = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
