//! Client side of the chat service protocol.
//!
//! Provides the server-sent-event frame decoder, the request/response wire
//! types, the reqwest-backed `ApiClient`, and the `ChatTransport` seam the
//! session controller streams through.

pub mod api;
pub mod error;
pub mod sse;
pub mod transport;
pub mod types;

pub use api::ApiClient;
pub use error::ClientError;
pub use sse::{decode_stream, SseDecoder, StreamEvent};
pub use transport::{ByteStream, ChatTransport, ScriptStep, ScriptedTransport};
pub use types::{
    ChatRequest, ChatResponse, DocumentStats, DocumentUploadResponse, HealthResponse,
    HistoryMessage, UploadProgress,
};
