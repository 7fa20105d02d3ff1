//! Streaming chat session controller.
//!
//! Coordinates one session: validates and commits the user turn, streams the
//! reply through the transport, accumulates chunks in the partial buffer and
//! commits exactly one assistant turn per sent message (the reply, or the
//! configured apology when the reply fails). Cancelled turns commit nothing.
//!
//! All session state sits behind one mutex. Every mutation, the matching
//! store write and the subscriber notification happen under that lock, so
//! observers see events in mutation order. The lock is never held across an
//! await point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use medchat_client::{decode_stream, ChatRequest, ChatTransport, StreamEvent};
use medchat_core::config::ChatConfig;
use medchat_core::types::{Transcript, Turn};
use medchat_storage::TranscriptStore;

use crate::error::ChatError;
use crate::events::{SessionEvent, TurnOutcome};
use crate::state::SessionState;

struct Session {
    state: SessionState,
    transcript: Transcript,
    partial: String,
    /// Generation of the current turn. Bumped on send and on cancel so a
    /// superseded stream task can tell its results are stale.
    turn_id: u64,
    cancel: Option<CancellationToken>,
}

struct Inner {
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn TranscriptStore>,
    config: ChatConfig,
    session: Mutex<Session>,
    subscribers: Mutex<Vec<UnboundedSender<SessionEvent>>>,
}

/// Controller for a single chat session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

/// Completion handle for a sent turn.
#[derive(Debug)]
pub struct TurnHandle {
    task: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    /// Wait for the turn to finish.
    pub async fn wait(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Turn task did not complete");
                TurnOutcome::Cancelled
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session();
        f.debug_struct("SessionController")
            .field("state", &session.state)
            .field("turns", &session.transcript.len())
            .finish()
    }
}

impl SessionController {
    /// Create a controller, restoring the transcript from `store`.
    ///
    /// A store that cannot be read starts the session empty.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn TranscriptStore>,
        config: ChatConfig,
    ) -> Self {
        let transcript = match store.load() {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(error = %e, "Failed to load transcript, starting empty");
                Transcript::new()
            }
        };
        info!(turns = transcript.len(), "Chat session ready");

        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                config,
                session: Mutex::new(Session {
                    state: SessionState::Idle,
                    transcript,
                    partial: String::new(),
                    turn_id: 0,
                    cancel: None,
                }),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Send a user message and start streaming the reply.
    ///
    /// Returns as soon as the user turn is committed; the reply is driven by
    /// a task on the current Tokio runtime. Rejected with `Busy` while
    /// another turn is in flight, leaving the transcript untouched.
    pub fn send_turn(&self, text: &str) -> Result<TurnHandle, ChatError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let inner = &self.inner;
        let mut session = inner.session();
        if session.state.is_busy() {
            debug!(state = %session.state, "Rejecting turn while busy");
            return Err(ChatError::Busy(session.state));
        }

        let request = ChatRequest::new(message, &session.transcript, inner.config.use_rag);
        inner.transition(&mut session, SessionState::AwaitingFirstByte)?;

        let turn = Turn::user(message);
        session.transcript.push(turn.clone());
        inner.persist(&session);
        inner.emit(SessionEvent::TurnCommitted(turn));

        session.turn_id += 1;
        session.partial.clear();
        let token = CancellationToken::new();
        session.cancel = Some(token.clone());
        let turn_id = session.turn_id;
        drop(session);

        let task = tokio::spawn(Arc::clone(inner).run_turn(turn_id, request, token));
        Ok(TurnHandle { task })
    }

    /// Abandon the in-flight turn.
    ///
    /// The partial reply is discarded and nothing is appended to the
    /// transcript. Returns false when no turn is in flight.
    pub fn cancel(&self) -> bool {
        let inner = &self.inner;
        let mut session = inner.session();
        if !session.state.is_busy() {
            return false;
        }

        if let Some(token) = session.cancel.take() {
            token.cancel();
        }
        session.turn_id += 1;
        session.partial.clear();
        inner.force_idle(&mut session);
        info!("Turn cancelled");
        true
    }

    /// Empty the transcript and the store. Rejected with `Busy` while a
    /// turn is in flight.
    pub fn clear_history(&self) -> Result<(), ChatError> {
        let inner = &self.inner;
        let mut session = inner.session();
        if session.state.is_busy() {
            return Err(ChatError::Busy(session.state));
        }

        session.transcript.clear();
        session.partial.clear();
        if let Err(e) = inner.store.clear() {
            warn!(error = %e, "Failed to clear persisted transcript");
        }
        inner.emit(SessionEvent::HistoryCleared);
        info!("Chat history cleared");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.inner.session().state
    }

    /// Snapshot of the committed turns.
    pub fn transcript(&self) -> Transcript {
        self.inner.session().transcript.clone()
    }

    /// The reply accumulated so far for the in-flight turn.
    pub fn partial(&self) -> String {
        self.inner.session().partial.clone()
    }

    /// Register an observer. It receives every event produced from now on,
    /// in order. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn transition(&self, session: &mut Session, to: SessionState) -> Result<(), ChatError> {
        let from = session.state;
        if !from.can_transition_to(&to) {
            return Err(ChatError::InvalidTransition { from, to });
        }
        debug!("Session state: {} -> {}", from, to);
        session.state = to;
        self.emit(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    /// Return to Idle from any state, for cancel and error recovery.
    fn force_idle(&self, session: &mut Session) {
        session.cancel = None;
        let from = session.state;
        if from == SessionState::Idle {
            return;
        }
        session.state = SessionState::Idle;
        debug!("Session state: {} -> Idle", from);
        self.emit(SessionEvent::StateChanged {
            from,
            to: SessionState::Idle,
        });
    }

    /// Runs under the session lock, before the matching event is emitted.
    /// One small upsert on a WAL database with `synchronous = NORMAL`.
    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(&session.transcript) {
            warn!(error = %e, "Failed to persist transcript");
        }
    }

    async fn run_turn(
        self: Arc<Self>,
        turn_id: u64,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let limit = self.config.stream_timeout();
        let result = tokio::select! {
            _ = cancel.cancelled() => return TurnOutcome::Cancelled,
            result = tokio::time::timeout(limit, self.stream_reply(turn_id, &request)) => {
                result.unwrap_or(Err(ChatError::Timeout(limit.as_secs())))
            }
        };

        let finished = match result {
            Ok(()) => self.complete(turn_id),
            Err(e) => self.fail(turn_id, e),
        };
        finished.unwrap_or_else(|e| {
            error!(error = %e, "Turn ended in an inconsistent state, resetting");
            let mut session = self.session();
            if session.turn_id == turn_id {
                session.partial.clear();
                self.force_idle(&mut session);
            }
            TurnOutcome::Cancelled
        })
    }

    async fn stream_reply(&self, turn_id: u64, request: &ChatRequest) -> Result<(), ChatError> {
        let body = self.transport.open_stream(request).await?;
        let events = decode_stream(body);
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Chunk(text) => {
                    if !self.append_chunk(turn_id, &text)? {
                        return Ok(());
                    }
                }
                StreamEvent::ErrorSignal(reason) => return Err(ChatError::Protocol(reason)),
            }
        }
        Ok(())
    }

    /// Append a chunk to the buffer. Returns false if the turn is stale.
    fn append_chunk(&self, turn_id: u64, text: &str) -> Result<bool, ChatError> {
        let mut session = self.session();
        if session.turn_id != turn_id {
            return Ok(false);
        }
        if session.state == SessionState::AwaitingFirstByte {
            self.transition(&mut session, SessionState::Streaming)?;
        }
        session.partial.push_str(text);
        self.emit(SessionEvent::PartialUpdated {
            buffer: session.partial.clone(),
        });
        Ok(true)
    }

    fn complete(&self, turn_id: u64) -> Result<TurnOutcome, ChatError> {
        let mut session = self.session();
        if session.turn_id != turn_id {
            return Ok(TurnOutcome::Cancelled);
        }

        self.transition(&mut session, SessionState::Finalizing)?;
        let content = std::mem::take(&mut session.partial);
        if content.is_empty() {
            debug!("Stream ended without chunks, committing empty reply");
        }
        let turn = Turn::assistant(content);
        session.transcript.push(turn.clone());
        self.persist(&session);
        self.emit(SessionEvent::TurnCommitted(turn.clone()));
        session.cancel = None;
        self.transition(&mut session, SessionState::Idle)?;

        info!(chars = turn.content.chars().count(), "Reply committed");
        Ok(TurnOutcome::Completed(turn))
    }

    fn fail(&self, turn_id: u64, err: ChatError) -> Result<TurnOutcome, ChatError> {
        let mut session = self.session();
        if session.turn_id != turn_id {
            return Ok(TurnOutcome::Cancelled);
        }

        warn!(error = %err, discarded = session.partial.len(), "Turn failed");
        session.partial.clear();
        let turn = Turn::assistant(self.config.error_message.clone());
        session.transcript.push(turn.clone());
        self.persist(&session);
        self.emit(SessionEvent::TurnFailed {
            reason: err.to_string(),
        });
        self.emit(SessionEvent::TurnCommitted(turn.clone()));
        session.cancel = None;
        self.transition(&mut session, SessionState::Idle)?;
        Ok(TurnOutcome::Failed(turn))
    }
}

// =============================================================================
// Tests
// =============================================================================
