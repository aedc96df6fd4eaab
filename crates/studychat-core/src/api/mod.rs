//! Backend access.
//!
//! The session core only talks to the backend through [`ChatBackend`] and
//! [`QuizBackend`]; [`ApiClient`] is the HTTP implementation.

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::path::Path;

use crate::error::ApiResult;
use crate::state::{ConversationId, Message};

pub use client::{ApiClient, DEFAULT_BACKEND_URL};
pub use types::*;

#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn list_conversations(&self) -> ApiResult<ConversationList>;

    /// Ordered, authoritative history of one conversation.
    async fn fetch_history(&self, conversation: ConversationId) -> ApiResult<Vec<Message>>;

    async fn create_conversation(&self, title: Option<String>) -> ApiResult<CreatedConversation>;

    async fn delete_conversation(&self, conversation: ConversationId) -> ApiResult<()>;

    /// Post a user message and wait for the assistant's full reply.
    async fn post_message(&self, request: &ChatRequest) -> ApiResult<ChatReply>;
}

#[async_trait]
pub trait QuizBackend: Send + Sync + 'static {
    async fn list_pdfs(&self) -> ApiResult<Vec<PdfSummary>>;

    async fn upload_pdf(&self, path: &Path, title: Option<String>) -> ApiResult<PdfDocument>;

    async fn list_quizzes(&self) -> ApiResult<Vec<QuizSummary>>;

    async fn generate_quiz(&self, request: &QuizGenerationRequest) -> ApiResult<Quiz>;

    async fn fetch_quiz(&self, quiz_id: i64) -> ApiResult<Quiz>;
}
