//! The chat session core.
//!
//! Owns the conversation registry, the per-conversation loading states, the
//! optimistic message buffers, cached backend histories, the typewriter and
//! the composer. Network calls run as spawned tasks; their outcomes come back
//! as [`SessionEvent`]s which the owner feeds to [`ChatSession::handle_event`]
//! on the UI loop.
//!
//! Sending a message:
//! 1. `submit` validates, appends the optimistic user message, marks the
//!    conversation loading and spawns the chat request.
//! 2. The reply lands in the conversation that issued the request, even if
//!    the user has moved on; only a still-current conversation gets the
//!    typewriter reveal.
//! 3. A delayed refetch brings in the persisted copies and supersedes the
//!    local buffer.
//! 4. A failed request rolls the user message back and clears the flag.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ChatBackend, ChatReply, ChatRequest};
use crate::composer::Composer;
use crate::error::ApiResult;
use crate::event::{SessionEvent, SessionEventSender};
use crate::loading::{LoadingPatch, LoadingState, LoadingStateStore};
use crate::merge::merge;
use crate::registry::ConversationRegistry;
use crate::retry::RetryPolicy;
use crate::scroll::ScrollFollow;
use crate::state::{ConversationId, LocalMessage, Message, MessageId, Role};
use crate::typewriter::{RevealStep, Typewriter};

pub const DEFAULT_MODEL: &str = "gemma2:2b";
pub const DEFAULT_REFETCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Model selector sent with every chat request.
    pub model: String,
    pub typing_interval: Duration,
    pub refetch_delay: Duration,
    pub loading_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            typing_interval: crate::typewriter::DEFAULT_TYPING_INTERVAL,
            refetch_delay: DEFAULT_REFETCH_DELAY,
            loading_capacity: crate::loading::DEFAULT_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cached backend history for one conversation.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub loaded: bool,
    pub error: Option<String>,
    // Last fetch issued and newest fetch applied.
    latest_request: u64,
    applied_request: u64,
}

pub struct ChatSession<B: ChatBackend> {
    backend: Arc<B>,
    events: SessionEventSender,
    settings: SessionSettings,
    registry: ConversationRegistry,
    loading: LoadingStateStore,
    buffers: HashMap<ConversationId, Vec<LocalMessage>>,
    histories: HashMap<ConversationId, History>,
    // Cutoffs from refetches that failed, applied by the next good fetch.
    unapplied_cutoffs: HashMap<ConversationId, u64>,
    typewriter: Typewriter,
    composer: Composer,
    scroll: ScrollFollow,
    last_error: Option<String>,
    next_seq: u64,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: Arc<B>, settings: SessionSettings, events: SessionEventSender) -> Self {
        Self {
            typewriter: Typewriter::new(settings.typing_interval, events.clone()),
            loading: LoadingStateStore::with_capacity(settings.loading_capacity),
            backend,
            events,
            settings,
            registry: ConversationRegistry::new(),
            buffers: HashMap::new(),
            histories: HashMap::new(),
            unapplied_cutoffs: HashMap::new(),
            composer: Composer::new(),
            scroll: ScrollFollow::new(),
            last_error: None,
            next_seq: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<ConversationId> {
        self.registry.current()
    }

    pub fn loading_state(&self, conversation: ConversationId) -> LoadingState {
        self.loading.get(conversation)
    }

    pub fn is_busy(&self, conversation: ConversationId) -> bool {
        self.loading.is_busy(conversation)
    }

    pub fn history(&self, conversation: ConversationId) -> Option<&History> {
        self.histories.get(&conversation)
    }

    pub fn local_messages(&self, conversation: ConversationId) -> &[LocalMessage] {
        self.buffers
            .get(&conversation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Everything to display for `conversation`, in order.
    pub fn messages(&self, conversation: ConversationId) -> Vec<Message> {
        let backend = self
            .histories
            .get(&conversation)
            .map(|h| h.messages.as_slice())
            .unwrap_or(&[]);
        merge(backend, self.local_messages(conversation))
    }

    pub fn current_messages(&self) -> Vec<Message> {
        self.current()
            .map(|conversation| self.messages(conversation))
            .unwrap_or_default()
    }

    /// Text to draw for `message`: the partial reveal while it is the
    /// conversation's typing target, otherwise its full content.
    pub fn visible_text<'a>(&'a self, conversation: ConversationId, message: &'a Message) -> &'a str {
        match self.loading.peek(conversation) {
            Some(state) if state.typing_message_id.as_ref() == Some(&message.id) => &state.typing_text,
            _ => &message.content,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn scroll(&self) -> &ScrollFollow {
        &self.scroll
    }

    pub fn scroll_mut(&mut self) -> &mut ScrollFollow {
        &mut self.scroll
    }

    /// Failure of the last create/delete, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversations
    // ─────────────────────────────────────────────────────────────────────

    pub fn load_conversations(&mut self) {
        self.registry.begin_fetch();
        let backend = Arc::clone(&self.backend);
        let retry = self.settings.retry;
        self.spawn(async move {
            let backend = &backend;
            let result = retry
                .run("conversations", move || backend.list_conversations())
                .await;
            SessionEvent::ConversationsLoaded(result)
        });
    }

    /// Manual retry after a failed list fetch.
    pub fn retry_conversations(&mut self) {
        self.load_conversations();
    }

    pub fn select_conversation(&mut self, conversation: ConversationId) {
        if self.registry.is_current(conversation) {
            return;
        }
        // A reveal never outlives its view.
        self.typewriter.cancel(&mut self.loading);
        self.registry.select(conversation);
        self.scroll.reset();
        self.composer.focus();
        self.refresh_history(conversation);
        tracing::debug!(conversation = %conversation, "conversation selected");
    }

    pub fn refresh_history(&mut self, conversation: ConversationId) {
        self.histories.entry(conversation).or_default().is_loading = true;
        self.spawn_history_fetch(conversation, None, Duration::ZERO);
    }

    pub fn create_conversation(&mut self, title: Option<String>) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            SessionEvent::ConversationCreated(backend.create_conversation(title).await)
        });
    }

    pub fn delete_conversation(&mut self, conversation: ConversationId) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            let result = backend.delete_conversation(conversation).await;
            SessionEvent::ConversationDeleted { conversation, result }
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Send pipeline
    // ─────────────────────────────────────────────────────────────────────

    /// Send the composer's text to the current conversation.
    pub fn submit(&mut self) -> bool {
        match self.registry.current() {
            Some(conversation) => self.submit_to(conversation),
            None => false,
        }
    }

    /// Send the composer's text to `conversation`. Returns `false`, leaving
    /// all state untouched, when the text is blank, the conversation already
    /// has a request in flight, or it is not the current conversation.
    pub fn submit_to(&mut self, conversation: ConversationId) -> bool {
        if !self.registry.is_current(conversation) || self.loading.is_busy(conversation) {
            return false;
        }
        let Some(text) = self.composer.take() else {
            return false;
        };

        let message = Message::new_local(Role::User, text.clone());
        let user_message = message.id.clone();
        self.push_local(conversation, message, None);
        self.loading.set(conversation, LoadingPatch::default().loading(true));
        self.scroll.request_bottom();
        tracing::info!(conversation = %conversation, message_id = %user_message, "sending message");

        let request = ChatRequest {
            message: text,
            model: self.settings.model.clone(),
            stream: false,
            conversation_id: conversation,
        };
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            let result = backend.post_message(&request).await;
            SessionEvent::ReplyReceived {
                conversation,
                user_message,
                result,
            }
        });
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event application
    // ─────────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ConversationsLoaded(result) => self.registry.apply_fetch(result),
            SessionEvent::HistoryLoaded {
                conversation,
                request,
                result,
                supersedes_up_to,
            } => self.apply_history(conversation, request, result, supersedes_up_to),
            SessionEvent::ReplyReceived {
                conversation,
                user_message,
                result,
            } => self.apply_reply(conversation, user_message, result),
            SessionEvent::ConversationCreated(result) => match result {
                Ok(created) => {
                    tracing::info!(conversation = %created.id, "conversation created");
                    self.last_error = None;
                    self.load_conversations();
                    self.select_conversation(created.id);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to create conversation");
                    self.last_error = Some(err.to_string());
                }
            },
            SessionEvent::ConversationDeleted {
                conversation,
                result,
            } => match result {
                Ok(()) => {
                    tracing::info!(conversation = %conversation, "conversation deleted");
                    self.forget(conversation);
                    self.last_error = None;
                    self.load_conversations();
                }
                Err(err) => {
                    tracing::warn!(conversation = %conversation, error = %err, "failed to delete conversation");
                    self.last_error = Some(err.to_string());
                }
            },
            SessionEvent::RevealTick { generation } => {
                match self.typewriter.tick(generation, &mut self.loading) {
                    RevealStep::Finished { .. } => self.composer.focus(),
                    RevealStep::Revealed { .. } | RevealStep::Ignored => {}
                }
            }
        }
    }

    fn apply_reply(&mut self, conversation: ConversationId, user_message: MessageId, result: ApiResult<ChatReply>) {
        let Some(buffer) = self.buffers.get_mut(&conversation) else {
            // Conversation was deleted while the request was in flight.
            tracing::debug!(conversation = %conversation, "dropping reply for discarded conversation");
            self.loading.clear(conversation);
            return;
        };

        match result {
            Ok(reply) => {
                if let Some(id) = reply.user_message_id {
                    if let Some(local) = buffer.iter_mut().find(|l| l.message.id == user_message) {
                        local.confirmed_as = Some(MessageId::from(id));
                    }
                }

                let assistant = Message::new_local(Role::Assistant, reply.response);
                let seq = self.push_local(
                    conversation,
                    assistant.clone(),
                    reply.assistant_message_id.map(MessageId::from),
                );
                self.loading.set(conversation, LoadingPatch::default().loading(false));
                tracing::info!(conversation = %conversation, message_id = %assistant.id, "reply received");

                if self.registry.is_current(conversation) {
                    self.typewriter.start(conversation, &assistant, &mut self.loading);
                    self.scroll.request_bottom();
                }
                self.spawn_history_fetch(conversation, Some(seq), self.settings.refetch_delay);
            }
            Err(err) => {
                tracing::warn!(conversation = %conversation, error = %err, "failed to send message");
                buffer.retain(|l| l.message.id != user_message);
                if buffer.is_empty() {
                    self.buffers.remove(&conversation);
                }
                self.loading.set(conversation, LoadingPatch::default().loading(false));
            }
        }
    }

    fn apply_history(
        &mut self,
        conversation: ConversationId,
        request: u64,
        result: ApiResult<Vec<Message>>,
        supersedes_up_to: Option<u64>,
    ) {
        let Some(history) = self.histories.get(&conversation) else {
            tracing::debug!(conversation = %conversation, "dropping history for discarded conversation");
            return;
        };
        if request < history.applied_request {
            // A newer snapshot is already on screen. Any refetch cutoff still
            // holds: the newer fetch was issued after that reply landed.
            tracing::debug!(conversation = %conversation, request, "ignoring stale history");
            if let Some(cutoff) = supersedes_up_to {
                self.retire_local(conversation, cutoff);
            }
            return;
        }

        let messages = match result {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(conversation = %conversation, error = %err, "failed to fetch history");
                match supersedes_up_to {
                    // Background refetch: keep showing what we have.
                    Some(cutoff) => {
                        let saved = self.unapplied_cutoffs.entry(conversation).or_insert(cutoff);
                        *saved = (*saved).max(cutoff);
                    }
                    None => {
                        let history = self.histories.entry(conversation).or_default();
                        history.is_loading = false;
                        history.error = Some(err.to_string());
                    }
                }
                return;
            }
        };

        let cutoff = match (supersedes_up_to, self.unapplied_cutoffs.remove(&conversation)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        // Follow the revealing message onto its backend id before the local
        // copy goes away.
        if let Some((target_conversation, target_id)) = self.typewriter.target() {
            if target_conversation == conversation {
                let target_id = target_id.clone();
                let confirmed = self
                    .local_messages(conversation)
                    .iter()
                    .find(|l| l.message.id == target_id)
                    .and_then(|l| l.confirmed_as.clone())
                    .filter(|id| messages.iter().any(|m| &m.id == id));
                if let Some(backend_id) = confirmed {
                    self.typewriter.rekey(&target_id, &backend_id, &mut self.loading);
                }
            }
        }

        if let Some(buffer) = self.buffers.get_mut(&conversation) {
            buffer.retain(|l| {
                let superseded = cutoff.is_some_and(|c| l.seq <= c);
                let confirmed = l
                    .confirmed_as
                    .as_ref()
                    .is_some_and(|id| messages.iter().any(|m| &m.id == id));
                !superseded && !confirmed
            });
            if buffer.is_empty() {
                self.buffers.remove(&conversation);
            }
        }

        let history = self.histories.entry(conversation).or_default();
        history.messages = messages;
        history.is_loading = false;
        history.loaded = true;
        history.error = None;
        history.applied_request = request;

        self.finish_vanished_reveal(conversation);
    }

    /// Drop local messages up to `cutoff` without touching the cached history.
    fn retire_local(&mut self, conversation: ConversationId, cutoff: u64) {
        if let Some(buffer) = self.buffers.get_mut(&conversation) {
            buffer.retain(|l| l.seq > cutoff);
            if buffer.is_empty() {
                self.buffers.remove(&conversation);
            }
        }
        self.finish_vanished_reveal(conversation);
    }

    /// Target vanished without a backend id to follow: show it whole.
    fn finish_vanished_reveal(&mut self, conversation: ConversationId) {
        if let Some((target_conversation, target_id)) = self.typewriter.target() {
            if target_conversation == conversation
                && !self.messages(conversation).iter().any(|m| &m.id == target_id)
            {
                self.typewriter.finish(&mut self.loading);
                self.composer.focus();
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn push_local(&mut self, conversation: ConversationId, message: Message, confirmed_as: Option<MessageId>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.buffers.entry(conversation).or_default().push(LocalMessage {
            message,
            seq,
            confirmed_as,
        });
        seq
    }

    fn forget(&mut self, conversation: ConversationId) {
        if self
            .typewriter
            .target()
            .is_some_and(|(target, _)| target == conversation)
        {
            self.typewriter.cancel(&mut self.loading);
        }
        self.registry.remove(conversation);
        self.buffers.remove(&conversation);
        self.histories.remove(&conversation);
        self.unapplied_cutoffs.remove(&conversation);
        self.loading.clear(conversation);
    }

    fn spawn_history_fetch(&mut self, conversation: ConversationId, supersedes_up_to: Option<u64>, delay: Duration) {
        let history = self.histories.entry(conversation).or_default();
        history.latest_request += 1;
        let request = history.latest_request;

        let backend = Arc::clone(&self.backend);
        let retry = self.settings.retry;
        self.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let backend = &backend;
            let result = retry
                .run("history", move || backend.fetch_history(conversation))
                .await;
            SessionEvent::HistoryLoaded {
                conversation,
                request,
                result,
                supersedes_up_to,
            }
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            // Receiver gone means the UI is shutting down.
            let _ = events.send(task.await);
        });
    }
}
