//! Shared types for the chatgate session bridge
//!
//! The chat-completion request and response schemas exposed over HTTP, the
//! session entities owned by the session store, the envelope workers publish
//! on a session's update topic, and the task handed to the work queue.

pub mod bus;
pub mod chat;
pub mod session;
pub mod task;

pub use bus::{BusEnvelope, EnvelopeKind, WorkerTaskResponse};
pub use chat::{
    CHUNK_OBJECT, COMPLETION_OBJECT, ChatCompletion, ChatCompletionChunk, ChatRequest,
    ChunkChoice, CompletionChoice, Delta, FINISH_REASON_STOP, MessageContent, RequestMessage,
    ResponseMessage,
};
pub use session::{
    CreatorType, FunctionCall, Interaction, InteractionState, Session, TOOL_ID_METADATA_KEY,
    ToolCall, Usage,
};
pub use task::{SessionMode, Task};
