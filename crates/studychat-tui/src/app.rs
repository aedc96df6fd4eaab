use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use studychat_core::api::QuestionType;
use studychat_core::{
    ApiClient, ChatSession, Composer, ConversationId, QuizEvent, QuizWorkspace, SessionEvent,
};

pub type Session = ChatSession<ApiClient>;
pub type Workspace = QuizWorkspace<ApiClient>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Quiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Messages,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizTab {
    Upload,
    Pdfs,
    Quizzes,
    Take,
}

impl QuizTab {
    pub const ALL: [QuizTab; 4] = [QuizTab::Upload, QuizTab::Pdfs, QuizTab::Quizzes, QuizTab::Take];

    pub fn title(self) -> &'static str {
        match self {
            QuizTab::Upload => "Upload",
            QuizTab::Pdfs => "PDFs",
            QuizTab::Quizzes => "Quizzes",
            QuizTab::Take => "Take quiz",
        }
    }

    pub fn next(self) -> Self {
        match self {
            QuizTab::Upload => QuizTab::Pdfs,
            QuizTab::Pdfs => QuizTab::Quizzes,
            QuizTab::Quizzes => QuizTab::Take,
            QuizTab::Take => QuizTab::Upload,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            QuizTab::Upload => QuizTab::Take,
            QuizTab::Pdfs => QuizTab::Upload,
            QuizTab::Quizzes => QuizTab::Pdfs,
            QuizTab::Take => QuizTab::Quizzes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Path,
    Title,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    pub session: Session,
    pub quiz: Workspace,
    pub model: String,

    // Sidebar
    pub sidebar_state: ListState,
    pub confirm_delete: Option<ConversationId>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Message pane height, for half-page scrolling
    pub messages_height: u16,

    // Quiz screen
    pub quiz_tab: QuizTab,
    pub upload_field: UploadField,
    pub upload_path: Composer,
    pub upload_title: Composer,
    pub pdf_state: ListState,
    pub quizzes_state: ListState,
    pub question_idx: usize,
    pub answer_state: ListState,

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub messages_area: Option<Rect>,
}

impl App {
    pub fn new(mut session: Session, quiz: Workspace) -> Self {
        let model = session.settings().model.clone();
        // Nothing to type into until a conversation is open.
        session.composer_mut().blur();

        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,
            focus: FocusPane::Sidebar,

            session,
            quiz,
            model,

            sidebar_state: ListState::default(),
            confirm_delete: None,

            animation_frame: 0,
            messages_height: 0,

            quiz_tab: QuizTab::Upload,
            upload_field: UploadField::Path,
            upload_path: Composer::new(),
            upload_title: Composer::new(),
            pdf_state: ListState::default(),
            quizzes_state: ListState::default(),
            question_idx: 0,
            answer_state: ListState::default(),

            sidebar_area: None,
            messages_area: None,
        }
    }

    /// Kick off the initial fetches.
    pub fn start(&mut self) {
        self.session.load_conversations();
        self.quiz.refresh_pdfs();
        self.quiz.refresh_quizzes();
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        let list_update = matches!(
            event,
            SessionEvent::ConversationsLoaded(_)
                | SessionEvent::ConversationCreated(_)
                | SessionEvent::ConversationDeleted { .. }
        );
        self.session.handle_event(event);

        if list_update {
            self.sync_sidebar();
        }
        // The session refocuses the composer when a reveal completes.
        if self.screen == Screen::Chat && self.session.composer().is_focused() && self.focus != FocusPane::Input {
            self.set_focus(FocusPane::Input);
        }
    }

    pub fn show_chat(&mut self) {
        self.screen = Screen::Chat;
        if self.session.composer().is_focused() {
            self.set_focus(FocusPane::Input);
        }
    }

    pub fn on_quiz_event(&mut self, event: QuizEvent) {
        let opened = matches!(
            event,
            QuizEvent::QuizGenerated(Ok(_)) | QuizEvent::QuizLoaded { result: Ok(_), .. }
        );
        self.quiz.handle_event(event);
        clamp_selection(&mut self.pdf_state, self.quiz.pdfs().items.len());
        clamp_selection(&mut self.quizzes_state, self.quiz.quizzes().items.len());
        if opened {
            self.question_idx = 0;
            self.answer_state.select(Some(0));
            self.quiz_tab = QuizTab::Take;
        }
    }

    // Focus

    pub fn set_focus(&mut self, pane: FocusPane) {
        self.focus = pane;
        if pane == FocusPane::Input && self.session.current().is_some() {
            self.session.composer_mut().focus();
            self.input_mode = InputMode::Editing;
        } else {
            if pane == FocusPane::Input {
                self.focus = FocusPane::Sidebar;
            }
            self.session.composer_mut().blur();
            self.input_mode = InputMode::Normal;
        }
    }

    pub fn cycle_focus(&mut self) {
        let next = match self.focus {
            FocusPane::Sidebar => FocusPane::Messages,
            FocusPane::Messages => FocusPane::Input,
            FocusPane::Input => FocusPane::Sidebar,
        };
        self.set_focus(next);
    }

    // Sidebar

    pub fn sidebar_down(&mut self) {
        let len = self.session.registry().conversations().len();
        list_down(&mut self.sidebar_state, len);
    }

    pub fn sidebar_up(&mut self) {
        list_up(&mut self.sidebar_state);
    }

    pub fn highlighted_conversation(&self) -> Option<ConversationId> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.session.registry().conversations().get(i))
            .map(|c| c.id)
    }

    pub fn open_highlighted(&mut self) {
        if let Some(conversation) = self.highlighted_conversation() {
            self.session.select_conversation(conversation);
            self.set_focus(FocusPane::Input);
        }
    }

    /// Keep the highlight on the current conversation, opening the first one
    /// when nothing is selected yet.
    fn sync_sidebar(&mut self) {
        let registry = self.session.registry();
        let len = registry.conversations().len();
        if len == 0 {
            self.sidebar_state.select(None);
            return;
        }

        match registry.current() {
            Some(current) => {
                if let Some(pos) = registry.position(current) {
                    self.sidebar_state.select(Some(pos));
                }
            }
            None => {
                let first = registry.conversations()[0].id;
                self.sidebar_state.select(Some(0));
                self.session.select_conversation(first);
            }
        }
        clamp_selection(&mut self.sidebar_state, len);
    }

    // Messages

    pub fn scroll_half_page_down(&mut self) {
        let half = (self.messages_height / 2).max(1);
        self.session.scroll_mut().scroll_down(half);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half = (self.messages_height / 2).max(1);
        self.session.scroll_mut().scroll_up(half);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        let busy = self
            .session
            .current()
            .is_some_and(|c| self.session.is_busy(c));
        if busy || self.quiz.is_generating() || self.quiz.is_uploading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Quiz screen

    pub fn upload_input_mut(&mut self) -> &mut Composer {
        match self.upload_field {
            UploadField::Path => &mut self.upload_path,
            UploadField::Title => &mut self.upload_title,
        }
    }

    pub fn submit_upload(&mut self) {
        let Some(path) = self.upload_path.take() else {
            return;
        };
        let title = self.upload_title.take();
        if self.quiz.upload(&path, title).is_err() {
            // Keep the path so it can be corrected.
            self.upload_path.set_text(path);
        }
    }

    pub fn generate_for_highlighted(&mut self) {
        let pdf = self
            .pdf_state
            .selected()
            .and_then(|i| self.quiz.pdfs().items.get(i))
            .map(|p| p.id);
        if let Some(id) = pdf {
            self.quiz.generate_for_pdf(id);
        }
    }

    pub fn open_highlighted_quiz(&mut self) {
        let quiz = self
            .quizzes_state
            .selected()
            .and_then(|i| self.quiz.quizzes().items.get(i))
            .map(|q| q.id);
        if let Some(id) = quiz {
            self.quiz.open_quiz(id);
        }
    }

    pub fn toggle_question_type(&mut self, kind: QuestionType) {
        self.quiz.settings_mut().toggle_type(kind);
    }

    pub fn adjust_question_count(&mut self, delta: i32) {
        let settings = self.quiz.settings_mut();
        let n = settings.num_questions().saturating_add_signed(delta);
        settings.set_num_questions(n);
    }

    pub fn question_count(&self) -> usize {
        self.quiz
            .attempt()
            .map(|a| a.quiz().questions.len())
            .unwrap_or(0)
    }

    pub fn next_question(&mut self) {
        let count = self.question_count();
        if count > 0 {
            self.question_idx = (self.question_idx + 1).min(count - 1);
            self.answer_state.select(Some(0));
        }
    }

    pub fn prev_question(&mut self) {
        self.question_idx = self.question_idx.saturating_sub(1);
        self.answer_state.select(Some(0));
    }

    pub fn answer_down(&mut self) {
        let len = self.current_answer_count();
        list_down(&mut self.answer_state, len);
    }

    pub fn answer_up(&mut self) {
        list_up(&mut self.answer_state);
    }

    pub fn choose_highlighted_answer(&mut self) {
        let question_idx = self.question_idx;
        let answer_idx = self.answer_state.selected().unwrap_or(0);
        if let Some(attempt) = self.quiz.attempt_mut() {
            let ids = attempt
                .quiz()
                .questions
                .get(question_idx)
                .and_then(|q| q.answers.get(answer_idx).map(|a| (q.id, a.id)));
            if let Some((question, answer)) = ids {
                attempt.select(question, answer);
            }
        }
    }

    fn current_answer_count(&self) -> usize {
        self.quiz
            .attempt()
            .and_then(|a| a.quiz().questions.get(self.question_idx))
            .map(|q| q.answers.len())
            .unwrap_or(0)
    }

    pub fn dismiss_errors(&mut self) {
        self.session.dismiss_error();
        self.quiz.dismiss_error();
    }
}

pub fn list_down(state: &mut ListState, len: usize) {
    if len > 0 {
        let i = state.selected().unwrap_or(0);
        state.select(Some((i + 1).min(len - 1)));
    }
}

pub fn list_up(state: &mut ListState) {
    let i = state.selected().unwrap_or(0);
    state.select(Some(i.saturating_sub(1)));
}

fn clamp_selection(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
    } else {
        let i = state.selected().unwrap_or(0);
        state.select(Some(i.min(len - 1)));
    }
}
