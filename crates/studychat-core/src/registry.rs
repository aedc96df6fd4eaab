//! Conversation list and selection.

use crate::api::{ConversationList, ConversationSummary};
use crate::error::ApiResult;
use crate::state::ConversationId;

#[derive(Debug, Clone, Default)]
pub struct ConversationRegistry {
    conversations: Vec<ConversationSummary>,
    total: u64,
    current: Option<ConversationId>,
    is_loading: bool,
    error: Option<String>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> Option<ConversationId> {
        self.current
    }

    /// The "still active" guard for in-flight work.
    pub fn is_current(&self, conversation: ConversationId) -> bool {
        self.current == Some(conversation)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn position(&self, conversation: ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == conversation)
    }

    pub fn get(&self, conversation: ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == conversation)
    }

    pub fn begin_fetch(&mut self) {
        self.is_loading = true;
    }

    /// Apply a list fetch. A failure keeps the previous list on screen and
    /// records the error for the retry prompt.
    pub fn apply_fetch(&mut self, result: ApiResult<ConversationList>) {
        self.is_loading = false;
        match result {
            Ok(list) => {
                self.total = list.total.max(list.conversations.len() as u64);
                self.conversations = list.conversations;
                self.error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch conversations");
                self.error = Some(err.to_string());
            }
        }
    }

    pub fn select(&mut self, conversation: ConversationId) {
        self.current = Some(conversation);
    }

    pub fn deselect(&mut self) {
        self.current = None;
    }

    /// Drop a deleted conversation from the list, deselecting it if needed.
    pub fn remove(&mut self, conversation: ConversationId) {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != conversation);
        if self.conversations.len() < before {
            self.total = self.total.saturating_sub(1);
        }
        if self.current == Some(conversation) {
            self.current = None;
        }
    }
}
