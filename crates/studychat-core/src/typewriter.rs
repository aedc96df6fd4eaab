//! Typewriter reveal of assistant replies.
//!
//! A reveal is Idle (no target, no ticker) or Revealing (a ticker task sends
//! `RevealTick` events; each one appends a character of the target's content
//! to the conversation's `typing_text`). Every ticker carries a generation
//! number and ticks from an older generation are dropped, so a cancelled
//! reveal can never write into any conversation's state.

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::event::{SessionEvent, SessionEventSender};
use crate::loading::{LoadingPatch, LoadingStateStore};
use crate::state::{ConversationId, Message, MessageId};

pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest tick period; a tokio interval cannot have a zero period.
pub const MIN_TYPING_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    /// Tick did not belong to the active reveal.
    Ignored,
    Revealed { conversation: ConversationId },
    Finished { conversation: ConversationId },
}

#[derive(Debug)]
struct ActiveReveal {
    conversation: ConversationId,
    message_id: MessageId,
    chars: Vec<char>,
    shown: usize,
}

#[derive(Debug)]
pub struct Typewriter {
    interval: Duration,
    events: SessionEventSender,
    generation: u64,
    active: Option<ActiveReveal>,
    ticker: Option<JoinHandle<()>>,
}

impl Typewriter {
    pub fn new(interval: Duration, events: SessionEventSender) -> Self {
        Self {
            interval: interval.max(MIN_TYPING_INTERVAL),
            events,
            generation: 0,
            active: None,
            ticker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_revealing(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<(ConversationId, &MessageId)> {
        self.active
            .as_ref()
            .map(|reveal| (reveal.conversation, &reveal.message_id))
    }

    /// Begin revealing `message` in `conversation`, replacing any reveal in
    /// progress.
    pub fn start(&mut self, conversation: ConversationId, message: &Message, store: &mut LoadingStateStore) {
        self.cancel(store);

        store.set(
            conversation,
            LoadingPatch::default()
                .typing(Some(message.id.clone()))
                .text(""),
        );
        self.active = Some(ActiveReveal {
            conversation,
            message_id: message.id.clone(),
            chars: message.content.chars().collect(),
            shown: 0,
        });
        self.spawn_ticker();
        tracing::debug!(conversation = %conversation, message_id = %message.id, "reveal started");
    }

    pub fn tick(&mut self, generation: u64, store: &mut LoadingStateStore) -> RevealStep {
        if generation != self.generation {
            return RevealStep::Ignored;
        }
        let Some(reveal) = self.active.as_mut() else {
            return RevealStep::Ignored;
        };

        if reveal.shown < reveal.chars.len() {
            reveal.shown += 1;
            let text: String = reveal.chars[..reveal.shown].iter().collect();
            let conversation = reveal.conversation;
            store.set(conversation, LoadingPatch::default().text(text));
            RevealStep::Revealed { conversation }
        } else {
            match self.finish(store) {
                Some(conversation) => RevealStep::Finished { conversation },
                None => RevealStep::Ignored,
            }
        }
    }

    /// Complete the active reveal now. Returns the conversation it belonged to.
    pub fn finish(&mut self, store: &mut LoadingStateStore) -> Option<ConversationId> {
        self.stop_ticker();
        let reveal = self.active.take()?;
        store.set(reveal.conversation, LoadingPatch::typing_done());
        tracing::debug!(conversation = %reveal.conversation, "reveal finished");
        Some(reveal.conversation)
    }

    /// Stop the active reveal, returning its conversation to Idle.
    pub fn cancel(&mut self, store: &mut LoadingStateStore) {
        if let Some(conversation) = self.finish(store) {
            tracing::debug!(conversation = %conversation, "reveal cancelled");
        }
    }

    /// Follow the target message when it is re-identified (local id replaced
    /// by the backend id after a refetch).
    pub fn rekey(&mut self, from: &MessageId, to: &MessageId, store: &mut LoadingStateStore) {
        if let Some(reveal) = self.active.as_mut() {
            if &reveal.message_id == from {
                reveal.message_id = to.clone();
                store.set(reveal.conversation, LoadingPatch::default().typing(Some(to.clone())));
            }
        }
    }

    fn spawn_ticker(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let interval = self.interval;
        let events = self.events.clone();

        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            // First tick of a tokio interval completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if events.send(SessionEvent::RevealTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.generation += 1;
    }
}

impl Drop for Typewriter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
