//! Request and response bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::state::{ConversationId, Message, MessageId, Role};

// =============================================================================
// Conversations and chat
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub role: Role,
    pub timestamp: String,
}

/// One row of the conversation sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_username: String,
    pub created_at: String,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
}

impl ConversationSummary {
    /// Label for the sidebar: the title when there is one, otherwise the id.
    pub fn label(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title.to_string(),
            _ => format!("Conversation #{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HistoryMessage {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl From<HistoryMessage> for Message {
    fn from(msg: HistoryMessage) -> Self {
        Message {
            id: MessageId::from(msg.id),
            content: msg.content,
            role: msg.role,
            timestamp: msg.timestamp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryConversation {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryResponse {
    pub conversation: HistoryConversation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct CreateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedConversation {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    pub stream: bool,
    pub conversation_id: ConversationId,
}

/// Body of a successful chat call. Only `response` is guaranteed; the ids
/// let the client recognise its optimistic messages in a later refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub user_message_id: Option<i64>,
    #[serde(default)]
    pub assistant_message_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

// =============================================================================
// PDFs and quizzes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub page_count: u32,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub quiz_count: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfDocument {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub page_count: u32,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGenerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    pub title: String,
    pub difficulty_level: Difficulty,
    pub num_questions: u32,
    pub question_types: Vec<QuestionType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub id: i64,
    pub answer_text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub question_type: QuestionType,
    pub question_text: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub pdf_title: Option<String>,
    pub difficulty_level: Difficulty,
    #[serde(default)]
    pub num_questions: u32,
    pub generation_status: GenerationStatus,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub pdf_title: Option<String>,
    pub difficulty_level: Difficulty,
    #[serde(default)]
    pub num_questions: u32,
    pub generation_status: GenerationStatus,
    #[serde(default)]
    pub created_at: String,
}
