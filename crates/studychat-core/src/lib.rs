pub mod api;
pub mod composer;
pub mod config;
pub mod error;
pub mod event;
pub mod loading;
pub mod merge;
pub mod quiz;
pub mod registry;
pub mod retry;
pub mod scroll;
pub mod session;
pub mod state;
pub mod typewriter;

// Re-export main types for convenience
pub use api::{ApiClient, ChatBackend, QuizBackend};
pub use composer::Composer;
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use event::{QuizEvent, SessionEvent};
pub use loading::{LoadingPatch, LoadingState, LoadingStateStore};
pub use quiz::{GenerationSettings, QuizAttempt, QuizWorkspace};
pub use registry::ConversationRegistry;
pub use retry::RetryPolicy;
pub use scroll::ScrollFollow;
pub use session::{ChatSession, SessionSettings};
pub use state::{ConversationId, LocalMessage, Message, MessageId, Role};
pub use typewriter::Typewriter;
