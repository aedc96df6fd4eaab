use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use studychat_core::api::{GenerationStatus, ProcessingStatus, QuestionType};
use studychat_core::{Composer, ConversationId, Role};

use crate::app::{App, FocusPane, InputMode, QuizTab, Screen, UploadField};

/// Ensure the selected item in a list is visible by adjusting the ListState offset.
fn ensure_selected_visible(state: &mut ListState, visible_height: usize) {
    let visible_height = visible_height.max(1);

    if let Some(selected) = state.selected() {
        // Offset range where selected is on screen: selected at the bottom
        // up to selected at the top.
        let min_offset = selected.saturating_sub(visible_height - 1);
        let max_offset = selected;

        let new_offset = state.offset().clamp(min_offset, max_offset);
        if new_offset != state.offset() {
            *state.offset_mut() = new_offset;
        }
    }
}

/// Wrap text to `width` columns at word boundaries. Words longer than a
/// full line are hard-broken so every returned line fits, which keeps the
/// scroll offset arithmetic exact.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(width) {
            let piece_len = piece.len();
            if current_len > 0 && current_len + 1 + piece_len <= width {
                current_line.push(' ');
                current_len += 1;
            } else if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            current_line.extend(piece);
            current_len += piece_len;
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// `**bold**` spans; everything else is literal.
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

fn ellipsis(frame: u8) -> String {
    ".".repeat(frame as usize + 1)
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
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Quiz => render_quiz_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let tab = |label: &'static str, active: bool| {
        if active {
            Span::styled(label, Style::default().fg(Color::Black).bg(Color::Cyan).bold())
        } else {
            Span::styled(label, Style::default().fg(Color::Gray))
        }
    };

    let title = Line::from(vec![
        Span::styled(" studychat ", Style::default().fg(Color::Cyan).bold()),
        tab(" 1 Chat ", app.screen == Screen::Chat),
        Span::raw(" "),
        tab(" 2 Quiz ", app.screen == Screen::Quiz),
        Span::raw("  "),
        Span::styled(format!("model: {}", app.model), Style::default().fg(Color::White)),
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
    if let Some(conversation) = app.confirm_delete {
        let prompt = Line::from(Span::styled(
            format!(" Delete conversation #{conversation}? (y/N) "),
            Style::default().bg(Color::Red).fg(Color::White).bold(),
        ));
        frame.render_widget(Paragraph::new(prompt), area);
        return;
    }

    let error = app.session.last_error().or_else(|| app.quiz.last_error());
    if let Some(error) = error {
        let line = Line::from(vec![
            Span::styled(" ERROR ", Style::default().bg(Color::Red).fg(Color::White).bold()),
            Span::styled(format!(" {error} "), Style::default().fg(Color::Red)),
            Span::styled("(Esc to dismiss)", Style::default().fg(Color::Gray)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => " CHAT ",
        (Screen::Chat, InputMode::Editing) => " TYPING ",
        (Screen::Quiz, InputMode::Normal) => " QUIZ ",
        (Screen::Quiz, InputMode::Editing) => " UPLOAD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::White);

    let hints: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Editing) => &[("Enter", "send"), ("Esc", "leave input"), ("Tab", "next pane")],
        (Screen::Chat, InputMode::Normal) => match app.focus {
            FocusPane::Sidebar => &[
                ("j/k", "move"),
                ("Enter", "open"),
                ("n", "new"),
                ("d", "delete"),
                ("r", "retry"),
                ("Tab", "next pane"),
                ("q", "quit"),
            ],
            FocusPane::Messages => &[
                ("j/k", "scroll"),
                ("G", "bottom"),
                ("r", "reload"),
                ("i", "write"),
                ("Tab", "next pane"),
                ("q", "quit"),
            ],
            FocusPane::Input => &[("Tab", "next pane"), ("q", "quit")],
        },
        (Screen::Quiz, InputMode::Editing) => &[("Tab", "switch field"), ("Enter", "upload"), ("Esc", "cancel")],
        (Screen::Quiz, InputMode::Normal) => match app.quiz_tab {
            QuizTab::Upload => &[("Enter", "fill form"), ("Tab", "next tab"), ("q", "quit")],
            QuizTab::Pdfs => &[
                ("Enter", "generate"),
                ("d", "difficulty"),
                ("+/-", "questions"),
                ("m/t/s", "types"),
                ("r", "refresh"),
            ],
            QuizTab::Quizzes => &[("Enter", "open"), ("r", "refresh"), ("Tab", "next tab")],
            QuizTab::Take => &[
                ("j/k", "answer"),
                ("Enter", "choose"),
                ("h/l", "question"),
                ("s", "submit"),
                ("x", "reset"),
            ],
        },
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {key} "), key_style));
        spans.push(Span::styled(format!(" {label} "), label_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(32),
        Constraint::Min(0),
    ])
    .areas(area);

    let [messages_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(main_area);

    // Store areas for mouse hit-testing
    app.sidebar_area = Some(sidebar_area);
    app.messages_area = Some(messages_area);

    render_sidebar(app, frame, sidebar_area);
    render_messages(app, frame, messages_area);
    render_message_input(app, frame, input_area);
}

fn border_color(focused: bool) -> Color {
    if focused { Color::Cyan } else { Color::DarkGray }
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let registry = app.session.registry();
    let error = registry.error().map(str::to_string);

    let [list_area, error_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(if error.is_some() { 4 } else { 0 }),
    ])
    .areas(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::Sidebar)))
        .title(format!(" Conversations ({}) ", registry.total()));

    if registry.conversations().is_empty() {
        let text = if registry.is_loading() {
            "Loading conversations..."
        } else {
            "No conversations yet. Press n to start one."
        };
        let placeholder = Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, list_area);
    } else {
        let items: Vec<ListItem> = registry
            .conversations()
            .iter()
            .map(|summary| {
                let mut style = Style::default();
                if registry.is_current(summary.id) {
                    style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
                }
                let mut spans = vec![
                    Span::styled(summary.label(), style),
                    Span::styled(format!(" ({})", summary.message_count), Style::default().fg(Color::DarkGray)),
                ];
                if app.session.is_busy(summary.id) {
                    spans.push(Span::styled(" ...", Style::default().fg(Color::Yellow)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");

        ensure_selected_visible(&mut app.sidebar_state, list_area.height.saturating_sub(2) as usize);
        frame.render_stateful_widget(list, list_area, &mut app.sidebar_state);
    }

    if let Some(error) = error {
        let text = Text::from(vec![
            Line::from(Span::styled(error, Style::default().fg(Color::Red))),
            Line::from(Span::styled("r to retry", Style::default().fg(Color::Gray))),
        ]);
        let panel = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Red)))
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, error_area);
    }
}

/// Pre-wrapped message lines so the scroll offset can be resolved exactly.
fn message_lines(app: &App, conversation: ConversationId, width: usize) -> Vec<Line<'static>> {
    let session = &app.session;
    let state = session.loading_state(conversation);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for message in session.messages(conversation) {
        let (label, color) = match message.role {
            Role::User => ("You:", Color::Cyan),
            Role::Assistant => ("AI:", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));

        let text = session.visible_text(conversation, &message);
        let start = lines.len();
        for raw in text.lines() {
            for wrapped in wrap_text_to_width(raw, width) {
                lines.push(match message.role {
                    Role::Assistant => parse_markdown_line(&wrapped),
                    Role::User => Line::from(wrapped),
                });
            }
        }
        if lines.len() == start {
            lines.push(Line::default());
        }

        if state.typing_message_id.as_ref() == Some(&message.id) {
            if let Some(last) = lines.last_mut() {
                last.spans.push(Span::styled("▌", Style::default().fg(Color::Yellow)));
            }
        }
        lines.push(Line::default());
    }

    if state.is_loading {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let current = app.session.current();
    let title = current
        .and_then(|c| app.session.registry().get(c))
        .map(|summary| format!(" {} ", summary.label()))
        .unwrap_or_else(|| " Messages ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::Messages)))
        .title(title);

    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2) as usize;
    app.messages_height = inner_height;

    let Some(conversation) = current else {
        let hint = Paragraph::new(Span::styled(
            "Select a conversation, or press n in the sidebar to start one.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let mut lines = message_lines(app, conversation, inner_width);
    if lines.is_empty() {
        let placeholder = match app.session.history(conversation) {
            Some(history) if history.is_loading => "Loading messages...".to_string(),
            Some(history) if history.error.is_some() => format!(
                "Could not load messages: {} (r to retry)",
                history.error.as_deref().unwrap_or_default()
            ),
            _ => "Say hello to get started.".to_string(),
        };
        lines.push(Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray))));
    }

    let content_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let offset = app.session.scroll_mut().resolve(content_lines, inner_height);

    let messages = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((offset, 0));
    frame.render_widget(messages, area);
}

fn render_message_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let busy = app
        .session
        .current()
        .is_some_and(|c| app.session.is_busy(c));
    let editing = app.screen == Screen::Chat && app.input_mode == InputMode::Editing;
    let title = if busy {
        " Waiting for reply... "
    } else {
        " Message (Enter to send) "
    };
    let color = if editing { Color::Yellow } else { border_color(app.focus == FocusPane::Input) };

    render_text_input(frame, area, app.session.composer(), title, color, editing);
}

/// Single-line input with horizontal scrolling to keep the cursor visible.
fn render_text_input(frame: &mut Frame, area: Rect, input: &Composer, title: &str, color: Color, show_cursor: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title.to_string());

    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = input
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Quiz
// ─────────────────────────────────────────────────────────────────────────────

fn render_quiz_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [tabs_area, body_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let selected = QuizTab::ALL
        .iter()
        .position(|tab| *tab == app.quiz_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(QuizTab::ALL.iter().map(|tab| tab.title()))
        .block(Block::default().borders(Borders::ALL).title(" Documents & quizzes "))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, tabs_area);

    match app.quiz_tab {
        QuizTab::Upload => render_upload(app, frame, body_area),
        QuizTab::Pdfs => render_pdfs(app, frame, body_area),
        QuizTab::Quizzes => render_quizzes(app, frame, body_area),
        QuizTab::Take => render_attempt(app, frame, body_area),
    }
}

fn render_upload(app: &mut App, frame: &mut Frame, area: Rect) {
    let [path_area, title_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    let field_color = |field: UploadField| {
        if editing && app.upload_field == field { Color::Yellow } else { Color::DarkGray }
    };

    render_text_input(
        frame,
        path_area,
        &app.upload_path,
        " PDF path ",
        field_color(UploadField::Path),
        editing && app.upload_field == UploadField::Path,
    );
    render_text_input(
        frame,
        title_area,
        &app.upload_title,
        " Title (defaults to file name) ",
        field_color(UploadField::Title),
        editing && app.upload_field == UploadField::Title,
    );

    let status = if app.quiz.is_uploading() {
        Line::from(Span::styled(
            format!("Uploading{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from(Span::styled(
            "Press Enter to fill in the form, then Enter again to upload.",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(status).wrap(Wrap { trim: true }), status_area);
}

fn processing_label(status: ProcessingStatus) -> (&'static str, Color) {
    match status {
        ProcessingStatus::Pending => ("pending", Color::Gray),
        ProcessingStatus::Processing => ("processing", Color::Yellow),
        ProcessingStatus::Completed => ("ready", Color::Green),
        ProcessingStatus::Failed => ("failed", Color::Red),
    }
}

fn generation_label(status: GenerationStatus) -> (&'static str, Color) {
    match status {
        GenerationStatus::Pending => ("pending", Color::Gray),
        GenerationStatus::Generating => ("generating", Color::Yellow),
        GenerationStatus::Completed => ("ready", Color::Green),
        GenerationStatus::Failed => ("failed", Color::Red),
    }
}

fn question_type_label(kind: QuestionType) -> &'static str {
    match kind {
        QuestionType::MultipleChoice => "multiple choice",
        QuestionType::TrueFalse => "true/false",
        QuestionType::ShortAnswer => "short answer",
    }
}

fn listing_title<T>(name: &str, listing: &studychat_core::quiz::Listing<T>) -> String {
    if listing.is_loading {
        format!(" {name} (loading) ")
    } else if listing.error.is_some() {
        format!(" {name} (failed, r to retry) ")
    } else {
        format!(" {name} ({}) ", listing.items.len())
    }
}

fn render_pdfs(app: &mut App, frame: &mut Frame, area: Rect) {
    let [list_area, settings_area] = Layout::horizontal([
        Constraint::Percentage(60),
        Constraint::Percentage(40),
    ])
    .areas(area);

    let pdfs = app.quiz.pdfs();
    let items: Vec<ListItem> = pdfs
        .items
        .iter()
        .map(|pdf| {
            let (status, color) = processing_label(pdf.processing_status);
            ListItem::new(Line::from(vec![
                Span::raw(pdf.title.clone()),
                Span::styled(format!("  {}p ", pdf.page_count), Style::default().fg(Color::DarkGray)),
                Span::styled(status, Style::default().fg(color)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(listing_title("PDFs", pdfs)))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");
    ensure_selected_visible(&mut app.pdf_state, list_area.height.saturating_sub(2) as usize);
    frame.render_stateful_widget(list, list_area, &mut app.pdf_state);

    let settings = app.quiz.settings();
    let types = settings
        .question_types
        .iter()
        .map(|t| question_type_label(*t))
        .collect::<Vec<_>>()
        .join(", ");
    let mut lines = vec![
        Line::from(vec![Span::raw("Difficulty: "), Span::styled(settings.difficulty.as_str(), Style::default().bold())]),
        Line::from(vec![
            Span::raw("Questions:  "),
            Span::styled(settings.num_questions().to_string(), Style::default().bold()),
        ]),
        Line::from(vec![Span::raw("Types:      "), Span::raw(types)]),
        Line::default(),
    ];
    if app.quiz.is_generating() {
        lines.push(Line::from(Span::styled(
            format!("Generating quiz{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::Yellow),
        )));
    }
    let panel = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" Generation "))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, settings_area);
}

fn render_quizzes(app: &mut App, frame: &mut Frame, area: Rect) {
    let quizzes = app.quiz.quizzes();
    let items: Vec<ListItem> = quizzes
        .items
        .iter()
        .map(|quiz| {
            let (status, color) = generation_label(quiz.generation_status);
            ListItem::new(Line::from(vec![
                Span::raw(quiz.title.clone()),
                Span::styled(
                    format!("  {} · {} questions ", quiz.difficulty_level.as_str(), quiz.num_questions),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(status, Style::default().fg(color)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(listing_title("Quizzes", quizzes)))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");
    ensure_selected_visible(&mut app.quizzes_state, area.height.saturating_sub(2) as usize);
    frame.render_stateful_widget(list, area, &mut app.quizzes_state);
}

fn render_attempt(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(attempt) = app.quiz.attempt() else {
        let hint = Paragraph::new(Span::styled(
            "Open a quiz from the Quizzes tab, or generate one from a PDF.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(Block::default().borders(Borders::ALL).title(" Take quiz "));
        frame.render_widget(hint, area);
        return;
    };

    let quiz = attempt.quiz();
    let total = quiz.questions.len();
    let Some(question) = quiz.questions.get(app.question_idx) else {
        let empty = Paragraph::new("This quiz has no questions.")
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", quiz.title)));
        frame.render_widget(empty, area);
        return;
    };

    let [question_area, answers_area] = Layout::vertical([
        Constraint::Length(5),
        Constraint::Min(0),
    ])
    .areas(area);

    let progress = if attempt.is_submitted() {
        let (correct, total) = attempt.score();
        format!(" Score: {correct}/{total} ")
    } else {
        format!(" {}/{} answered ", attempt.answered(), total)
    };
    let question_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} · Question {}/{} ", quiz.title, app.question_idx + 1, total))
        .title_bottom(progress);
    let question_text = Paragraph::new(question.question_text.clone())
        .block(question_block)
        .wrap(Wrap { trim: true });
    frame.render_widget(question_text, question_area);

    let chosen = attempt.selected(question.id);
    let submitted = attempt.is_submitted();
    let items: Vec<ListItem> = question
        .answers
        .iter()
        .map(|answer| {
            let picked = chosen == Some(answer.id);
            let marker = if picked { "(•) " } else { "( ) " };
            let style = match (submitted, answer.is_correct, picked) {
                (true, true, _) => Style::default().fg(Color::Green),
                (true, false, true) => Style::default().fg(Color::Red),
                (false, _, true) => Style::default().fg(Color::Cyan).bold(),
                _ => Style::default(),
            };
            ListItem::new(Span::styled(format!("{marker}{}", answer.answer_text), style))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Answers "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, answers_area, &mut app.answer_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{loaded, test_app};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let lines = wrap_text_to_width("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
    }

    #[test]
    fn test_wrap_text_breaks_long_words() {
        let lines = wrap_text_to_width("see https://example.com/a/very/long/path", 12);
        assert_eq!(lines[0], "see");
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(lines.concat(), "seehttps://example.com/a/very/long/path");
    }

    #[test]
    fn test_wrap_text_empty_line() {
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let open = parse_markdown_line("a **b");
        assert_eq!(open.spans.len(), 1);
        assert_eq!(open.spans[0].content, "a **b");
    }

    #[tokio::test]
    async fn test_renders_sidebar_and_thinking_indicator() {
        let mut app = test_app();
        loaded(&mut app, &[3]);
        for c in "hello".chars() {
            app.session.composer_mut().insert(c);
        }
        app.session.submit();

        let text = screen_text(&mut app);
        assert!(text.contains("Conversations (1)"));
        assert!(text.contains("Conversation #3"));
        assert!(text.contains("hello"));
        assert!(text.contains("Thinking"));
    }

    #[tokio::test]
    async fn test_renders_quiz_tabs() {
        let mut app = test_app();
        app.screen = Screen::Quiz;
        let text = screen_text(&mut app);
        assert!(text.contains("Upload"));
        assert!(text.contains("Take quiz"));
        assert!(text.contains("PDF path"));
    }
}
