use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use studychat_core::api::{ChatReply, ChatRequest, ConversationList, ConversationSummary, CreatedConversation};
use studychat_core::{
    ApiError, ApiResult, ChatBackend, ChatSession, ConversationId, Message, MessageId, RetryPolicy, Role,
    SessionEvent, SessionSettings,
};

const SEVEN: ConversationId = ConversationId(7);
const NINE: ConversationId = ConversationId(9);

/// In-memory backend that persists posted messages like the real one.
struct FakeBackend {
    conversations: Mutex<Vec<ConversationSummary>>,
    histories: Mutex<HashMap<ConversationId, Vec<Message>>>,
    next_id: AtomicI64,
    reply_text: Mutex<String>,
    reply_delay: Mutex<Duration>,
    // Per-call delays for `fetch_history`, consumed in order.
    history_delays: Mutex<VecDeque<Duration>>,
    fail_posts: AtomicBool,
    fail_lists: AtomicBool,
    fail_history: AtomicBool,
    omit_ids: AtomicBool,
    list_calls: AtomicU32,
    post_calls: AtomicU32,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            conversations: Mutex::new(vec![summary(7), summary(9)]),
            histories: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(100),
            reply_text: Mutex::new("hi there".to_string()),
            reply_delay: Mutex::new(Duration::ZERO),
            history_delays: Mutex::new(VecDeque::new()),
            fail_posts: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            omit_ids: AtomicBool::new(false),
            list_calls: AtomicU32::new(0),
            post_calls: AtomicU32::new(0),
        }
    }

    fn persist(&self, conversation: ConversationId, role: Role, content: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().entry(conversation).or_default().push(Message {
            id: MessageId::from(id),
            content: content.to_string(),
            role,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        });
        id
    }
}

fn summary(id: i64) -> ConversationSummary {
    ConversationSummary {
        id: ConversationId(id),
        title: Some(format!("Thread {id}")),
        user_username: "student".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        message_count: 0,
        last_message: None,
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: "Internal Server Error".to_string(),
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn list_conversations(&self) -> ApiResult<ConversationList> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let conversations = self.conversations.lock().unwrap().clone();
        Ok(ConversationList {
            total: conversations.len() as u64,
            conversations,
        })
    }

    async fn fetch_history(&self, conversation: ConversationId) -> ApiResult<Vec<Message>> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        // The response reflects the backend at request time, however late it arrives.
        let snapshot = self
            .histories
            .lock()
            .unwrap()
            .get(&conversation)
            .cloned()
            .unwrap_or_default();
        let delay = self.history_delays.lock().unwrap().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok(snapshot)
    }

    async fn create_conversation(&self, title: Option<String>) -> ApiResult<CreatedConversation> {
        let id = ConversationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut created = summary(id.0);
        created.title = title.clone();
        self.conversations.lock().unwrap().insert(0, created);
        Ok(CreatedConversation {
            id,
            title,
            created_at: "2024-01-02T00:00:00Z".to_string(),
        })
    }

    async fn delete_conversation(&self, conversation: ConversationId) -> ApiResult<()> {
        self.conversations.lock().unwrap().retain(|c| c.id != conversation);
        self.histories.lock().unwrap().remove(&conversation);
        Ok(())
    }

    async fn post_message(&self, request: &ChatRequest) -> ApiResult<ChatReply> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.reply_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }

        let response = self.reply_text.lock().unwrap().clone();
        let user_id = self.persist(request.conversation_id, Role::User, &request.message);
        let assistant_id = self.persist(request.conversation_id, Role::Assistant, &response);
        let omit = self.omit_ids.load(Ordering::SeqCst);
        Ok(ChatReply {
            response,
            model_used: Some(request.model.clone()),
            user_message_id: (!omit).then_some(user_id),
            assistant_message_id: (!omit).then_some(assistant_id),
        })
    }
}

type Session = ChatSession<FakeBackend>;

fn settings() -> SessionSettings {
    SessionSettings {
        retry: RetryPolicy::none(),
        ..SessionSettings::default()
    }
}

fn setup_with(backend: FakeBackend, settings: SessionSettings) -> (Arc<FakeBackend>, Session, UnboundedReceiver<SessionEvent>) {
    let backend = Arc::new(backend);
    let (tx, rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::clone(&backend), settings, tx);
    (backend, session, rx)
}

fn setup() -> (Arc<FakeBackend>, Session, UnboundedReceiver<SessionEvent>) {
    setup_with(FakeBackend::new(), settings())
}

/// Apply events until `done` holds. Panics if the condition is never reached.
async fn pump_until(session: &mut Session, rx: &mut UnboundedReceiver<SessionEvent>, mut done: impl FnMut(&Session) -> bool) {
    tokio::time::timeout(Duration::from_secs(300), async {
        while !done(session) {
            let event = rx.recv().await.expect("event channel closed");
            session.handle_event(event);
        }
    })
    .await
    .expect("condition never reached");
}

/// Let every pending timer up to `duration` fire, then apply what arrived.
async fn settle(session: &mut Session, rx: &mut UnboundedReceiver<SessionEvent>, duration: Duration) {
    tokio::time::sleep(duration).await;
    while let Ok(event) = rx.try_recv() {
        session.handle_event(event);
    }
}

async fn open(session: &mut Session, rx: &mut UnboundedReceiver<SessionEvent>, conversation: ConversationId) {
    session.select_conversation(conversation);
    pump_until(session, rx, |s| s.history(conversation).is_some_and(|h| !h.is_loading)).await;
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_send_reveals_reply_then_focuses_input() {
    let (_backend, mut session, mut rx) = setup();
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    assert!(session.submit());

    let local = session.local_messages(SEVEN);
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].message.role, Role::User);
    assert_eq!(local[0].message.content, "hello");
    assert!(session.is_busy(SEVEN));
    assert_eq!(session.composer().text(), "");

    pump_until(&mut session, &mut rx, |s| !s.is_busy(SEVEN)).await;

    let local = session.local_messages(SEVEN);
    assert_eq!(local.len(), 2);
    let assistant = local[1].message.clone();
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.content, "hi there");
    let state = session.loading_state(SEVEN);
    assert!(!state.is_loading);
    assert_eq!(state.typing_message_id, Some(assistant.id.clone()));

    session.composer_mut().blur();
    let mut revealed = Vec::new();
    pump_until(&mut session, &mut rx, |s| {
        let state = s.loading_state(SEVEN);
        if state.typing_message_id.is_some() {
            revealed.push(state.typing_text);
        }
        state.typing_message_id.is_none()
    })
    .await;

    assert_eq!(revealed.last().map(String::as_str), Some("hi there"));
    assert!(revealed.windows(2).all(|w| w[1].starts_with(w[0].as_str())));
    assert_eq!(session.loading_state(SEVEN).typing_text, "");
    assert!(session.composer().is_focused());
}

#[tokio::test(start_paused = true)]
async fn test_reply_lands_in_the_conversation_that_sent_it() {
    let backend = FakeBackend::new();
    *backend.reply_delay.lock().unwrap() = Duration::from_secs(2);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    assert!(session.submit());
    session.select_conversation(NINE);
    let nine_before = session.loading_state(NINE);

    pump_until(&mut session, &mut rx, |s| {
        assert_eq!(s.loading_state(NINE), nine_before);
        assert!(s.local_messages(NINE).is_empty());
        !s.is_busy(SEVEN)
    })
    .await;

    let local = session.local_messages(SEVEN);
    assert_eq!(local.len(), 2);
    assert_eq!(local[1].message.content, "hi there");
    assert!(session.local_messages(NINE).is_empty());
    assert_eq!(session.loading_state(NINE), nine_before);
    // Not on screen, so nothing is revealed.
    assert_eq!(session.loading_state(SEVEN).typing_message_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_rolls_back_user_message() {
    let backend = FakeBackend::new();
    backend.fail_posts.store(true, Ordering::SeqCst);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    assert!(session.submit());
    assert_eq!(session.local_messages(SEVEN).len(), 1);

    pump_until(&mut session, &mut rx, |s| !s.is_busy(SEVEN)).await;

    assert!(session.local_messages(SEVEN).is_empty());
    assert!(session.current_messages().is_empty());
    assert_eq!(session.loading_state(SEVEN).typing_message_id, None);
    assert_eq!(session.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_list_failure_exposes_error_and_retry_refetches() {
    let backend = FakeBackend::new();
    backend.fail_lists.store(true, Ordering::SeqCst);
    let (backend, mut session, mut rx) = setup_with(backend, settings());

    session.load_conversations();
    pump_until(&mut session, &mut rx, |s| !s.registry().is_loading()).await;
    assert!(session.registry().error().is_some());
    assert!(session.registry().conversations().is_empty());
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);

    backend.fail_lists.store(false, Ordering::SeqCst);
    session.retry_conversations();
    assert!(session.registry().is_loading());
    pump_until(&mut session, &mut rx, |s| !s.registry().is_loading()).await;

    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.registry().error(), None);
    assert_eq!(session.registry().conversations().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_list_fetch_retries_transient_errors() {
    let backend = FakeBackend::new();
    backend.fail_lists.store(true, Ordering::SeqCst);
    let settings = SessionSettings {
        retry: RetryPolicy::new(2),
        ..SessionSettings::default()
    };
    let (backend, mut session, mut rx) = setup_with(backend, settings);

    session.load_conversations();
    pump_until(&mut session, &mut rx, |s| !s.registry().is_loading()).await;
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 3);
    assert!(session.registry().error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_whitespace_send_is_a_no_op() {
    let (backend, mut session, mut rx) = setup();
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("   \n\t");
    assert!(!session.submit());
    settle(&mut session, &mut rx, Duration::from_secs(1)).await;

    assert!(session.local_messages(SEVEN).is_empty());
    assert!(!session.is_busy(SEVEN));
    assert_eq!(backend.post_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_selection_and_idle_conversation() {
    let backend = FakeBackend::new();
    *backend.reply_delay.lock().unwrap() = Duration::from_secs(1);
    let (backend, mut session, mut rx) = setup_with(backend, settings());

    session.composer_mut().set_text("nobody home");
    assert!(!session.submit());

    open(&mut session, &mut rx, SEVEN).await;
    assert!(!session.submit_to(NINE));

    assert!(session.submit());
    session.composer_mut().set_text("again");
    assert!(!session.submit());
    assert_eq!(session.composer().text(), "again");
    assert_eq!(session.local_messages(SEVEN).len(), 1);

    pump_until(&mut session, &mut rx, |s| !s.is_busy(SEVEN)).await;
    assert_eq!(backend.post_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_messages_render_once_after_refetch() {
    let (_backend, mut session, mut rx) = setup();
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    session.submit();
    pump_until(&mut session, &mut rx, |s| !s.is_busy(SEVEN)).await;
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);

    pump_until(&mut session, &mut rx, |s| s.local_messages(SEVEN).is_empty()).await;

    let messages = session.messages(SEVEN);
    assert_eq!(contents(&messages), ["hello", "hi there"]);
    assert!(messages.iter().all(|m| !m.id.as_str().starts_with("local-")));
}

#[tokio::test(start_paused = true)]
async fn test_refetch_supersedes_local_messages_without_ids() {
    let backend = FakeBackend::new();
    backend.omit_ids.store(true, Ordering::SeqCst);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    session.submit();
    pump_until(&mut session, &mut rx, |s| s.local_messages(SEVEN).len() == 2).await;
    assert!(session.local_messages(SEVEN).iter().all(|l| l.confirmed_as.is_none()));

    pump_until(&mut session, &mut rx, |s| s.local_messages(SEVEN).is_empty()).await;
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refetch_keeps_local_messages_until_next_fetch() {
    let backend = FakeBackend::new();
    backend.omit_ids.store(true, Ordering::SeqCst);
    let (backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    backend.fail_history.store(true, Ordering::SeqCst);
    session.composer_mut().set_text("hello");
    session.submit();
    settle(&mut session, &mut rx, Duration::from_secs(2)).await;

    assert_eq!(session.local_messages(SEVEN).len(), 2);
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
    assert_eq!(session.history(SEVEN).and_then(|h| h.error.as_deref()), None);

    backend.fail_history.store(false, Ordering::SeqCst);
    session.refresh_history(SEVEN);
    pump_until(&mut session, &mut rx, |s| s.history(SEVEN).is_some_and(|h| !h.is_loading)).await;

    assert!(session.local_messages(SEVEN).is_empty());
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
}

#[tokio::test(start_paused = true)]
async fn test_history_failure_sets_error() {
    let backend = FakeBackend::new();
    backend.fail_history.store(true, Ordering::SeqCst);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());

    open(&mut session, &mut rx, SEVEN).await;
    let history = session.history(SEVEN).expect("history entry");
    assert!(history.error.is_some());
    assert!(!history.loaded);
}

#[tokio::test(start_paused = true)]
async fn test_reveal_follows_message_onto_backend_id() {
    let backend = FakeBackend::new();
    *backend.reply_text.lock().unwrap() = "x".repeat(200);
    let settings = SessionSettings {
        refetch_delay: Duration::from_millis(50),
        ..settings()
    };
    let (_backend, mut session, mut rx) = setup_with(backend, settings);
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("long one please");
    session.submit();
    pump_until(&mut session, &mut rx, |s| s.local_messages(SEVEN).is_empty()).await;

    let state = session.loading_state(SEVEN);
    let typing = state.typing_message_id.expect("still revealing");
    assert!(!typing.as_str().starts_with("local-"));
    assert!(state.typing_text.len() < 200);

    let messages = session.messages(SEVEN);
    let target = messages.iter().find(|m| m.id == typing).expect("target rendered");
    assert_eq!(session.visible_text(SEVEN, target), state.typing_text);

    pump_until(&mut session, &mut rx, |s| s.loading_state(SEVEN).typing_message_id.is_none()).await;
    assert_eq!(session.messages(SEVEN).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_switching_away_finishes_the_reveal() {
    let backend = FakeBackend::new();
    *backend.reply_text.lock().unwrap() = "y".repeat(100);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    session.submit();
    pump_until(&mut session, &mut rx, |s| s.loading_state(SEVEN).typing_message_id.is_some()).await;

    session.select_conversation(NINE);
    assert_eq!(session.loading_state(SEVEN).typing_message_id, None);
    assert_eq!(session.loading_state(SEVEN).typing_text, "");

    settle(&mut session, &mut rx, Duration::from_secs(2)).await;
    assert_eq!(session.loading_state(SEVEN).typing_message_id, None);
    assert_eq!(session.loading_state(NINE).typing_message_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_reply_for_deleted_conversation_is_dropped() {
    let backend = FakeBackend::new();
    *backend.reply_delay.lock().unwrap() = Duration::from_secs(3);
    let (_backend, mut session, mut rx) = setup_with(backend, settings());
    session.load_conversations();
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    session.submit();
    session.delete_conversation(SEVEN);
    pump_until(&mut session, &mut rx, |s| s.current().is_none()).await;
    assert!(session.local_messages(SEVEN).is_empty());

    settle(&mut session, &mut rx, Duration::from_secs(5)).await;
    assert!(session.local_messages(SEVEN).is_empty());
    assert!(!session.is_busy(SEVEN));
    assert!(session.history(SEVEN).is_none());
    assert!(session.registry().get(SEVEN).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_create_selects_new_conversation() {
    let (_backend, mut session, mut rx) = setup();
    session.create_conversation(Some("Biology".to_string()));

    pump_until(&mut session, &mut rx, |s| s.current().is_some()).await;
    let created = session.current().expect("selected");
    pump_until(&mut session, &mut rx, |s| s.registry().get(created).is_some()).await;

    let summary = session.registry().get(created).expect("listed");
    assert_eq!(summary.label(), "Biology");
    assert_eq!(session.registry().conversations().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_history_fetch_does_not_overwrite_newer_one() {
    let backend = FakeBackend::new();
    backend.history_delays.lock().unwrap().push_back(Duration::from_secs(5));
    let (_backend, mut session, mut rx) = setup_with(backend, settings());

    // The fetch started by selecting is still in flight when the user sends.
    session.select_conversation(SEVEN);
    session.composer_mut().set_text("hello");
    assert!(session.submit());

    settle(&mut session, &mut rx, Duration::from_secs(2)).await;
    assert!(session.local_messages(SEVEN).is_empty());
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);

    settle(&mut session, &mut rx, Duration::from_secs(10)).await;
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
    let history = session.history(SEVEN).expect("history entry");
    assert!(!history.is_loading);
    assert_eq!(history.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_refetch_still_retires_its_local_messages() {
    let backend = FakeBackend::new();
    backend.omit_ids.store(true, Ordering::SeqCst);
    let (backend, mut session, mut rx) = setup_with(backend, settings());
    open(&mut session, &mut rx, SEVEN).await;

    // The refetch after the reply is slow; a manual refresh overtakes it.
    backend.history_delays.lock().unwrap().push_back(Duration::from_secs(5));
    session.composer_mut().set_text("hello");
    session.submit();
    pump_until(&mut session, &mut rx, |s| s.local_messages(SEVEN).len() == 2).await;
    settle(&mut session, &mut rx, Duration::from_secs(1)).await;

    session.refresh_history(SEVEN);
    pump_until(&mut session, &mut rx, |s| s.history(SEVEN).is_some_and(|h| !h.is_loading)).await;
    // Without ids nothing confirms the locals yet, so both copies show.
    assert_eq!(session.local_messages(SEVEN).len(), 2);

    settle(&mut session, &mut rx, Duration::from_secs(10)).await;
    assert!(session.local_messages(SEVEN).is_empty());
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
    assert_eq!(session.loading_state(SEVEN).typing_message_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_zero_typing_interval_still_completes_reveal() {
    let settings = SessionSettings {
        typing_interval: Duration::ZERO,
        ..settings()
    };
    let (_backend, mut session, mut rx) = setup_with(FakeBackend::new(), settings);
    open(&mut session, &mut rx, SEVEN).await;

    session.composer_mut().set_text("hello");
    session.submit();
    pump_until(&mut session, &mut rx, |s| s.loading_state(SEVEN).typing_message_id.is_some()).await;
    pump_until(&mut session, &mut rx, |s| s.loading_state(SEVEN).typing_message_id.is_none()).await;

    assert_eq!(session.loading_state(SEVEN).typing_text, "");
    assert_eq!(contents(&session.messages(SEVEN)), ["hello", "hi there"]);
}
