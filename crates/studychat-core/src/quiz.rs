//! PDF upload, quiz generation and quiz taking.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{
    Difficulty, PdfSummary, QuestionType, Quiz, QuizBackend, QuizGenerationRequest, QuizSummary,
};
use crate::error::{ApiError, ApiResult};
use crate::event::{QuizEvent, QuizEventSender};
use crate::retry::RetryPolicy;

pub const MIN_QUESTIONS: u32 = 1;
pub const MAX_QUESTIONS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub difficulty: Difficulty,
    num_questions: u32,
    pub question_types: Vec<QuestionType>,
}

impl GenerationSettings {
    pub fn num_questions(&self) -> u32 {
        self.num_questions
    }

    pub fn set_num_questions(&mut self, n: u32) {
        self.num_questions = n.clamp(MIN_QUESTIONS, MAX_QUESTIONS);
    }

    /// Add the type if absent, remove it otherwise. The last remaining type
    /// cannot be removed.
    pub fn toggle_type(&mut self, kind: QuestionType) {
        if let Some(pos) = self.question_types.iter().position(|t| *t == kind) {
            if self.question_types.len() > 1 {
                self.question_types.remove(pos);
            }
        } else {
            self.question_types.push(kind);
        }
    }

    fn request_for_pdf(&self, pdf: &PdfSummary) -> QuizGenerationRequest {
        QuizGenerationRequest {
            pdf_document_id: Some(pdf.id),
            source_text: None,
            title: format!("Quiz: {}", pdf.title),
            difficulty_level: self.difficulty,
            num_questions: self.num_questions,
            question_types: self.question_types.clone(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            num_questions: 5,
            question_types: vec![QuestionType::MultipleChoice, QuestionType::TrueFalse],
        }
    }
}

/// One pass through a quiz.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    quiz: Quiz,
    // question id -> answer id
    selected: HashMap<i64, i64>,
    submitted: bool,
}

impl QuizAttempt {
    pub fn new(mut quiz: Quiz) -> Self {
        quiz.questions.sort_by_key(|q| q.order);
        for question in &mut quiz.questions {
            question.answers.sort_by_key(|a| a.order);
        }
        Self {
            quiz,
            selected: HashMap::new(),
            submitted: false,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn selected(&self, question_id: i64) -> Option<i64> {
        self.selected.get(&question_id).copied()
    }

    pub fn answered(&self) -> usize {
        self.selected.len()
    }

    /// Choose `answer_id` for `question_id`. Ignored once submitted or when
    /// the answer does not belong to the question.
    pub fn select(&mut self, question_id: i64, answer_id: i64) -> bool {
        if self.submitted {
            return false;
        }
        let valid = self
            .quiz
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .is_some_and(|q| q.answers.iter().any(|a| a.id == answer_id));
        if valid {
            self.selected.insert(question_id, answer_id);
        }
        valid
    }

    pub fn submit(&mut self) {
        self.submitted = true;
    }

    /// `(correct, total)`; unanswered questions count as wrong.
    pub fn score(&self) -> (usize, usize) {
        let correct = self
            .quiz
            .questions
            .iter()
            .filter(|q| {
                self.selected(q.id)
                    .and_then(|answer| q.answers.iter().find(|a| a.id == answer))
                    .is_some_and(|a| a.is_correct)
            })
            .count();
        (correct, self.quiz.questions.len())
    }

    pub fn reset(&mut self) {
        self.selected.clear();
        self.submitted = false;
    }
}

/// Listing state for a backend collection.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            error: None,
        }
    }
}

impl<T> Listing<T> {
    fn apply(&mut self, what: &str, result: ApiResult<Vec<T>>) {
        self.is_loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch {what}");
                self.error = Some(err.to_string());
            }
        }
    }
}

pub struct QuizWorkspace<B: QuizBackend> {
    backend: Arc<B>,
    events: QuizEventSender,
    retry: RetryPolicy,
    pdfs: Listing<PdfSummary>,
    quizzes: Listing<QuizSummary>,
    settings: GenerationSettings,
    attempt: Option<QuizAttempt>,
    uploading: bool,
    generating: bool,
    last_error: Option<String>,
}

impl<B: QuizBackend> QuizWorkspace<B> {
    pub fn new(backend: Arc<B>, retry: RetryPolicy, events: QuizEventSender) -> Self {
        Self {
            backend,
            events,
            retry,
            pdfs: Listing::default(),
            quizzes: Listing::default(),
            settings: GenerationSettings::default(),
            attempt: None,
            uploading: false,
            generating: false,
            last_error: None,
        }
    }

    pub fn pdfs(&self) -> &Listing<PdfSummary> {
        &self.pdfs
    }

    pub fn quizzes(&self) -> &Listing<QuizSummary> {
        &self.quizzes
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut GenerationSettings {
        &mut self.settings
    }

    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    pub fn attempt_mut(&mut self) -> Option<&mut QuizAttempt> {
        self.attempt.as_mut()
    }

    pub fn close_attempt(&mut self) {
        self.attempt = None;
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn refresh_pdfs(&mut self) {
        self.pdfs.is_loading = true;
        let backend = Arc::clone(&self.backend);
        let retry = self.retry;
        self.spawn(async move {
            let backend = &backend;
            QuizEvent::PdfsLoaded(retry.run("pdfs", move || backend.list_pdfs()).await)
        });
    }

    pub fn refresh_quizzes(&mut self) {
        self.quizzes.is_loading = true;
        let backend = Arc::clone(&self.backend);
        let retry = self.retry;
        self.spawn(async move {
            let backend = &backend;
            QuizEvent::QuizzesLoaded(retry.run("quizzes", move || backend.list_quizzes()).await)
        });
    }

    /// Upload a PDF. Paths without a `.pdf` extension are rejected without
    /// touching the backend. A blank title falls back to the file stem.
    pub fn upload(&mut self, path: impl AsRef<Path>, title: Option<String>) -> ApiResult<()> {
        let path = path.as_ref();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            let err = ApiError::InvalidUpload(format!("{} is not a PDF", path.display()));
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| default_title(path));
        self.uploading = true;
        tracing::info!(path = %path.display(), "uploading pdf");

        let path: PathBuf = path.to_path_buf();
        let backend = Arc::clone(&self.backend);
        self.spawn(async move { QuizEvent::PdfUploaded(backend.upload_pdf(&path, title).await) });
        Ok(())
    }

    /// Generate a quiz from an uploaded PDF with the current settings.
    pub fn generate_for_pdf(&mut self, pdf_id: i64) -> bool {
        if self.generating {
            return false;
        }
        let Some(pdf) = self.pdfs.items.iter().find(|p| p.id == pdf_id) else {
            return false;
        };
        let request = self.settings.request_for_pdf(pdf);
        self.generating = true;
        tracing::info!(pdf = pdf_id, questions = request.num_questions, "generating quiz");

        let backend = Arc::clone(&self.backend);
        self.spawn(async move { QuizEvent::QuizGenerated(backend.generate_quiz(&request).await) });
        true
    }

    pub fn open_quiz(&mut self, quiz_id: i64) {
        let backend = Arc::clone(&self.backend);
        let retry = self.retry;
        self.spawn(async move {
            let backend = &backend;
            let result = retry.run("quiz", move || backend.fetch_quiz(quiz_id)).await;
            QuizEvent::QuizLoaded { quiz_id, result }
        });
    }

    pub fn handle_event(&mut self, event: QuizEvent) {
        match event {
            QuizEvent::PdfsLoaded(result) => self.pdfs.apply("pdfs", result),
            QuizEvent::QuizzesLoaded(result) => self.quizzes.apply("quizzes", result),
            QuizEvent::PdfUploaded(result) => {
                self.uploading = false;
                match result {
                    Ok(pdf) => {
                        tracing::info!(pdf = pdf.id, title = %pdf.title, "pdf uploaded");
                        self.last_error = None;
                        self.refresh_pdfs();
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "pdf upload failed");
                        self.last_error = Some(err.to_string());
                    }
                }
            }
            QuizEvent::QuizGenerated(result) => {
                self.generating = false;
                match result {
                    Ok(quiz) => {
                        tracing::info!(quiz = quiz.id, "quiz generated");
                        self.last_error = None;
                        self.attempt = Some(QuizAttempt::new(quiz));
                        self.refresh_quizzes();
                        self.refresh_pdfs();
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "quiz generation failed");
                        self.last_error = Some(err.to_string());
                    }
                }
            }
            QuizEvent::QuizLoaded { quiz_id, result } => match result {
                Ok(quiz) => self.attempt = Some(QuizAttempt::new(quiz)),
                Err(err) => {
                    tracing::warn!(quiz = quiz_id, error = %err, "failed to load quiz");
                    self.last_error = Some(err.to_string());
                }
            },
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = QuizEvent> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(task.await);
        });
    }
}

fn default_title(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
