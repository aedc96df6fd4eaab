//! Completions reported back to the UI loop by spawned tasks.
//!
//! Every network call and timer runs in its own task and reports its outcome
//! as one of these events; the owner of the session applies them on the UI
//! loop, so state is never mutated from two places at once.

use tokio::sync::mpsc;

use crate::api::{
    ChatReply, ConversationList, CreatedConversation, PdfDocument, PdfSummary, Quiz, QuizSummary,
};
use crate::error::ApiResult;
use crate::state::{ConversationId, Message, MessageId};

#[derive(Debug)]
pub enum SessionEvent {
    ConversationsLoaded(ApiResult<ConversationList>),
    HistoryLoaded {
        conversation: ConversationId,
        /// Per-conversation request number; a result older than the one
        /// already applied is stale.
        request: u64,
        result: ApiResult<Vec<Message>>,
        /// Set for the refetch that follows a reply: local messages with a
        /// sequence number up to this one are superseded by the result.
        supersedes_up_to: Option<u64>,
    },
    ReplyReceived {
        conversation: ConversationId,
        user_message: MessageId,
        result: ApiResult<ChatReply>,
    },
    ConversationCreated(ApiResult<CreatedConversation>),
    ConversationDeleted {
        conversation: ConversationId,
        result: ApiResult<()>,
    },
    RevealTick {
        generation: u64,
    },
}

#[derive(Debug)]
pub enum QuizEvent {
    PdfsLoaded(ApiResult<Vec<PdfSummary>>),
    PdfUploaded(ApiResult<PdfDocument>),
    QuizzesLoaded(ApiResult<Vec<QuizSummary>>),
    QuizGenerated(ApiResult<Quiz>),
    QuizLoaded {
        quiz_id: i64,
        result: ApiResult<Quiz>,
    },
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type QuizEventSender = mpsc::UnboundedSender<QuizEvent>;
