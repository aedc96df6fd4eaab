use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use studychat_core::api::QuestionType;
use studychat_core::Composer;

use crate::app::{list_down, list_up, App, FocusPane, InputMode, QuizTab, Screen, UploadField};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if let Some(conversation) = app.confirm_delete.take() {
        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            app.session.delete_conversation(conversation);
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('1') => {
            app.show_chat();
            return;
        }
        KeyCode::Char('2') => {
            app.screen = Screen::Quiz;
            return;
        }
        KeyCode::Esc => {
            app.dismiss_errors();
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Chat => handle_chat_normal(app, key),
        Screen::Quiz => handle_quiz_normal(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Tab {
        app.cycle_focus();
        return;
    }

    match app.focus {
        FocusPane::Sidebar => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
            KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.open_highlighted(),
            KeyCode::Char('n') => app.session.create_conversation(None),
            KeyCode::Char('d') => app.confirm_delete = app.highlighted_conversation(),
            KeyCode::Char('r') => app.session.retry_conversations(),
            _ => {}
        },
        FocusPane::Messages => match key.code {
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.scroll_half_page_down();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.scroll_half_page_up();
            }
            KeyCode::Char('j') | KeyCode::Down => app.session.scroll_mut().scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => app.session.scroll_mut().scroll_up(1),
            KeyCode::Char('g') => app.session.scroll_mut().scroll_up(u16::MAX),
            KeyCode::Char('G') => app.session.scroll_mut().request_bottom(),
            KeyCode::Char('r') => {
                if let Some(conversation) = app.session.current() {
                    app.session.refresh_history(conversation);
                }
            }
            KeyCode::Char('i') | KeyCode::Enter => app.set_focus(FocusPane::Input),
            KeyCode::Char('h') | KeyCode::Left => app.set_focus(FocusPane::Sidebar),
            _ => {}
        },
        // Input without an open conversation stays in normal mode.
        FocusPane::Input => {}
    }
}

fn handle_quiz_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab => {
            app.quiz_tab = app.quiz_tab.next();
            return;
        }
        KeyCode::BackTab => {
            app.quiz_tab = app.quiz_tab.prev();
            return;
        }
        _ => {}
    }

    match app.quiz_tab {
        QuizTab::Upload => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char('i')) {
                app.input_mode = InputMode::Editing;
            }
        }
        QuizTab::Pdfs => match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                let len = app.quiz.pdfs().items.len();
                list_down(&mut app.pdf_state, len);
            }
            KeyCode::Char('k') | KeyCode::Up => list_up(&mut app.pdf_state),
            KeyCode::Enter | KeyCode::Char('g') => app.generate_for_highlighted(),
            KeyCode::Char('d') => {
                let settings = app.quiz.settings_mut();
                settings.difficulty = settings.difficulty.next();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_question_count(1),
            KeyCode::Char('-') => app.adjust_question_count(-1),
            KeyCode::Char('m') => app.toggle_question_type(QuestionType::MultipleChoice),
            KeyCode::Char('t') => app.toggle_question_type(QuestionType::TrueFalse),
            KeyCode::Char('s') => app.toggle_question_type(QuestionType::ShortAnswer),
            KeyCode::Char('r') => app.quiz.refresh_pdfs(),
            _ => {}
        },
        QuizTab::Quizzes => match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                let len = app.quiz.quizzes().items.len();
                list_down(&mut app.quizzes_state, len);
            }
            KeyCode::Char('k') | KeyCode::Up => list_up(&mut app.quizzes_state),
            KeyCode::Enter => app.open_highlighted_quiz(),
            KeyCode::Char('r') => app.quiz.refresh_quizzes(),
            _ => {}
        },
        QuizTab::Take => match key.code {
            KeyCode::Char('h') | KeyCode::Left => app.prev_question(),
            KeyCode::Char('l') | KeyCode::Right => app.next_question(),
            KeyCode::Char('j') | KeyCode::Down => app.answer_down(),
            KeyCode::Char('k') | KeyCode::Up => app.answer_up(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                app.choose_highlighted_answer();
                app.next_question();
            }
            KeyCode::Char('s') => {
                if let Some(attempt) = app.quiz.attempt_mut() {
                    attempt.submit();
                }
            }
            KeyCode::Char('x') => {
                if let Some(attempt) = app.quiz.attempt_mut() {
                    attempt.reset();
                }
                app.question_idx = 0;
                app.answer_state.select(Some(0));
            }
            KeyCode::Char('c') => app.quiz.close_attempt(),
            _ => {}
        },
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.screen {
        Screen::Chat => handle_chat_editing(app, key),
        Screen::Quiz => handle_upload_editing(app, key),
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.set_focus(FocusPane::Messages),
        KeyCode::Tab => app.cycle_focus(),
        KeyCode::Enter => {
            // Rejected sends (blank, busy) leave the text in place.
            app.session.submit();
        }
        KeyCode::Up => app.session.scroll_mut().scroll_up(1),
        KeyCode::Down => app.session.scroll_mut().scroll_down(1),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::PageDown => app.scroll_half_page_down(),
        _ => edit_text(app.session.composer_mut(), key),
    }
}

fn handle_upload_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Tab | KeyCode::BackTab => {
            app.upload_field = match app.upload_field {
                UploadField::Path => UploadField::Title,
                UploadField::Title => UploadField::Path,
            };
        }
        KeyCode::Enter => {
            app.submit_upload();
            app.upload_field = UploadField::Path;
            app.input_mode = InputMode::Normal;
        }
        _ => edit_text(app.upload_input_mut(), key),
    }
}

/// Line-editing keys shared by every text box.
fn edit_text(input: &mut Composer, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => input.clear(),
        KeyCode::Char(c) => input.insert(c),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling
    let in_sidebar = app.sidebar_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_messages = app.messages_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_messages {
                app.session.scroll_mut().scroll_down(3);
            } else if in_sidebar {
                app.sidebar_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_messages {
                app.session.scroll_mut().scroll_up(3);
            } else if in_sidebar {
                app.sidebar_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{loaded, test_app};
    use studychat_core::ConversationId;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_typing_q_in_the_input_does_not_quit() {
        let mut app = test_app();
        loaded(&mut app, &[1]);
        assert_eq!(app.input_mode, InputMode::Editing);

        type_text(&mut app, "quiz 1 please");
        assert!(!app.should_quit);
        assert_eq!(app.session.composer().text(), "quiz 1 please");
        assert_eq!(app.screen, Screen::Chat);
    }

    #[tokio::test]
    async fn test_enter_sends_and_marks_conversation_busy() {
        let mut app = test_app();
        loaded(&mut app, &[1]);

        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter);
        assert!(app.session.is_busy(ConversationId(1)));
        assert_eq!(app.session.composer().text(), "");
        assert_eq!(app.session.local_messages(ConversationId(1)).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let mut app = test_app();
        loaded(&mut app, &[1, 2]);
        app.set_focus(FocusPane::Sidebar);

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.confirm_delete, Some(ConversationId(1)));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.confirm_delete, None);
    }

    #[tokio::test]
    async fn test_quiz_settings_keys() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.quiz_tab, QuizTab::Pdfs);

        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('s'));
        let settings = app.quiz.settings();
        assert_eq!(settings.num_questions(), 6);
        assert_eq!(settings.difficulty, studychat_core::api::Difficulty::Hard);
        assert!(settings.question_types.contains(&QuestionType::ShortAnswer));
    }

    #[tokio::test]
    async fn test_upload_form_rejects_non_pdf_and_keeps_path() {
        let mut app = test_app();
        app.screen = Screen::Quiz;
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::Editing);

        type_text(&mut app, "notes.txt");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.upload_path.text(), "notes.txt");
        assert!(app.quiz.last_error().is_some());
        assert!(!app.quiz.is_uploading());
    }
}
