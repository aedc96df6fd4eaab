//! Per-conversation loading state.
//!
//! The single source of truth for whether a conversation is busy (request in
//! flight, reply being revealed), independent of which conversation is on
//! screen. Switching away from a conversation with a reply in flight leaves
//! its entry untouched until the reply lands.

use std::collections::HashMap;

use crate::state::{ConversationId, MessageId};

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub is_loading: bool,
    pub typing_message_id: Option<MessageId>,
    pub typing_text: String,
}

impl LoadingState {
    /// Idle entries carry no information beyond the default.
    pub fn is_idle(&self) -> bool {
        !self.is_loading && self.typing_message_id.is_none()
    }
}

/// Partial update merged into a conversation's entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingPatch {
    pub is_loading: Option<bool>,
    pub typing_message_id: Option<Option<MessageId>>,
    pub typing_text: Option<String>,
}

impl LoadingPatch {
    pub fn loading(mut self, is_loading: bool) -> Self {
        self.is_loading = Some(is_loading);
        self
    }

    pub fn typing(mut self, message_id: Option<MessageId>) -> Self {
        self.typing_message_id = Some(message_id);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.typing_text = Some(text.into());
        self
    }

    /// Back to Idle for the reveal engine.
    pub fn typing_done() -> Self {
        Self::default().typing(None).text("")
    }
}

#[derive(Debug)]
struct Entry {
    state: LoadingState,
    touched: u64,
}

/// Map from conversation to [`LoadingState`], capped with least-recently
/// written eviction of idle entries.
#[derive(Debug)]
pub struct LoadingStateStore {
    entries: HashMap<ConversationId, Entry>,
    capacity: usize,
    clock: u64,
}

impl LoadingStateStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Current entry, or the default when none exists.
    pub fn get(&self, conversation: ConversationId) -> LoadingState {
        self.entries
            .get(&conversation)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Borrowing variant of [`Self::get`]; `None` means default.
    pub fn peek(&self, conversation: ConversationId) -> Option<&LoadingState> {
        self.entries.get(&conversation).map(|entry| &entry.state)
    }

    pub fn is_busy(&self, conversation: ConversationId) -> bool {
        self.entries
            .get(&conversation)
            .is_some_and(|entry| entry.state.is_loading)
    }

    /// Merge `patch` into the entry, creating it with defaults if absent.
    pub fn set(&mut self, conversation: ConversationId, patch: LoadingPatch) {
        self.clock += 1;
        let touched = self.clock;
        let inserted = !self.entries.contains_key(&conversation);

        let entry = self.entries.entry(conversation).or_insert_with(|| Entry {
            state: LoadingState::default(),
            touched,
        });
        entry.touched = touched;
        if let Some(is_loading) = patch.is_loading {
            entry.state.is_loading = is_loading;
        }
        if let Some(typing) = patch.typing_message_id {
            entry.state.typing_message_id = typing;
        }
        if let Some(text) = patch.typing_text {
            entry.state.typing_text = text;
        }

        if inserted && self.entries.len() > self.capacity {
            self.evict_idle(conversation);
        }
    }

    pub fn clear(&mut self, conversation: ConversationId) {
        self.entries.remove(&conversation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Busy entries are never evicted; the store may sit over capacity until
    // some of them go idle.
    fn evict_idle(&mut self, keep: ConversationId) {
        let victim = self
            .entries
            .iter()
            .filter(|(id, entry)| **id != keep && entry.state.is_idle())
            .min_by_key(|(_, entry)| entry.touched)
            .map(|(id, _)| *id);

        if let Some(id) = victim {
            tracing::trace!(conversation = %id, "evicting idle loading state");
            self.entries.remove(&id);
        }
    }
}

impl Default for LoadingStateStore {
    fn default() -> Self {
        Self::new()
    }
}
