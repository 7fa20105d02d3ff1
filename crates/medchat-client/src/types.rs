//! Request and response bodies of the chat service.

use serde::{Deserialize, Serialize};

use medchat_core::types::{Role, Turn};

/// One prior message sent as conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for HistoryMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<HistoryMessage>,
    pub use_rag: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, history: &[Turn], use_rag: bool) -> Self {
        Self {
            message: message.into(),
            conversation_history: history.iter().map(HistoryMessage::from).collect(),
            use_rag,
        }
    }
}

/// Reply of the non-streaming `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Reply of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub ollama_connected: bool,
    #[serde(default)]
    pub chroma_initialized: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthResponse {
    /// Healthy means the server says so and its model backend is reachable.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.ollama_connected
    }
}

/// Reply of `POST /documents/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUploadResponse {
    pub filename: String,
    pub chunks_created: u64,
    pub status: String,
    pub message: String,
}

/// Reply of `GET /documents/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_documents: u64,
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(default)]
    pub collection_name: String,
}

/// Bytes of an upload body handed to the transport so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Whole percent complete, rounded to nearest.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.sent.min(self.total) * 100 + self.total / 2) / self.total;
        pct as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_wire_shape() {
        let history = vec![Turn::user("Xin chào"), Turn::assistant("Chào bạn!")];
        let request = ChatRequest::new("Tôi bị sốt", &history, true);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["message"], "Tôi bị sốt");
        assert_eq!(value["use_rag"], true);
        let entries = value["conversation_history"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["role"], "user");
        assert_eq!(entries[0]["content"], "Xin chào");
        assert_eq!(entries[1]["role"], "assistant");
        // Timestamps are not part of the request history.
        assert!(entries[0].get("timestamp").is_none());
    }

    #[test]
    fn test_chat_request_empty_history() {
        let request = ChatRequest::new("hi", &[], false);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"message":"hi","conversation_history":[],"use_rag":false}"#
        );
    }

    #[test]
    fn test_chat_response_defaults() {
        let response: ChatResponse = serde_json::from_str(r#"{"response":"ok"}"#).unwrap();
        assert_eq!(response.response, "ok");
        assert!(response.sources.is_empty());
        assert!(response.timestamp.is_none());
    }

    #[test]
    fn test_health_is_healthy() {
        let health: HealthResponse = serde_json::from_str(
            r#"{"status":"healthy","ollama_connected":true,"chroma_initialized":true,"timestamp":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert!(health.is_healthy());

        let degraded = HealthResponse {
            status: "degraded".to_string(),
            ollama_connected: true,
            chroma_initialized: false,
            timestamp: None,
        };
        assert!(!degraded.is_healthy());

        let no_model = HealthResponse {
            status: "healthy".to_string(),
            ollama_connected: false,
            chroma_initialized: true,
            timestamp: None,
        };
        assert!(!no_model.is_healthy());
    }

    #[test]
    fn test_document_stats_tolerates_missing_fields() {
        let stats: DocumentStats = serde_json::from_str(r#"{"total_documents":3}"#).unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_chunks, 0);
    }

    #[test]
    fn test_upload_progress_percent() {
        assert_eq!(UploadProgress { sent: 0, total: 200 }.percent(), 0);
        assert_eq!(UploadProgress { sent: 1, total: 3 }.percent(), 33);
        assert_eq!(UploadProgress { sent: 2, total: 3 }.percent(), 67);
        assert_eq!(UploadProgress { sent: 200, total: 200 }.percent(), 100);
        assert_eq!(UploadProgress { sent: 0, total: 0 }.percent(), 100);
    }
}
