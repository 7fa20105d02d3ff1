//! Error types for the chat session.

use medchat_client::ClientError;

use crate::state::SessionState;

/// Errors from the session controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("session is busy ({0})")]
    Busy(SessionState),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("no complete reply within {0}s")]
    Timeout(u64),
}

impl From<ClientError> for ChatError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Decode(msg) => ChatError::Protocol(msg),
            other => ChatError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::Busy(SessionState::Streaming);
        assert_eq!(err.to_string(), "session is busy (Streaming)");

        let err = ChatError::InvalidTransition {
            from: SessionState::Idle,
            to: SessionState::Finalizing,
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition: Idle -> Finalizing"
        );

        let err = ChatError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "transport error: connection reset");

        let err = ChatError::Protocol("model unavailable".to_string());
        assert_eq!(err.to_string(), "protocol error: model unavailable");

        let err = ChatError::Timeout(300);
        assert_eq!(err.to_string(), "no complete reply within 300s");
    }

    #[test]
    fn test_chat_error_from_client_error() {
        let err: ChatError = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        match err {
            ChatError::Transport(msg) => assert!(msg.contains("502")),
            other => panic!("Expected Transport variant, got {other}"),
        }

        let err: ChatError = ClientError::Stream("eof".to_string()).into();
        assert!(matches!(err, ChatError::Transport(_)));

        let err: ChatError = ClientError::Decode("expected value".to_string()).into();
        match err {
            ChatError::Protocol(msg) => assert_eq!(msg, "expected value"),
            other => panic!("Expected Protocol variant, got {other}"),
        }
    }
}
