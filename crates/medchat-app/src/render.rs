//! Incremental terminal rendering of session events.
//!
//! Prints only the part of the buffer not shown yet, so a streamed reply
//! appears as it arrives. A committed reply that differs from what was shown
//! (the apology after a failure, or an empty reply) is printed whole.

use std::io::{self, Write};

use medchat_chat::{SessionEvent, SessionState};

pub struct Renderer<W: Write> {
    out: W,
    shown: usize,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, shown: 0 }
    }

    pub fn handle(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::PartialUpdated { buffer } => {
                if let Some(delta) = buffer.get(self.shown..) {
                    self.out.write_all(delta.as_bytes())?;
                    self.out.flush()?;
                }
                self.shown = buffer.len();
            }
            SessionEvent::TurnCommitted(turn) if !turn.is_user() => {
                if self.shown == 0 {
                    self.out.write_all(turn.content.as_bytes())?;
                }
                self.end_line()?;
            }
            SessionEvent::TurnFailed { .. } => {
                if self.shown > 0 {
                    self.end_line()?;
                }
            }
            SessionEvent::StateChanged {
                to: SessionState::Idle,
                ..
            } if self.shown > 0 => {
                writeln!(self.out, " [cancelled]")?;
                self.shown = 0;
            }
            _ => {}
        }
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()?;
        self.shown = 0;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchat_core::types::Turn;

    fn render(events: &[SessionEvent]) -> String {
        let mut renderer = Renderer::new(Vec::new());
        for event in events {
            renderer.handle(event).unwrap();
        }
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn partial(buffer: &str) -> SessionEvent {
        SessionEvent::PartialUpdated {
            buffer: buffer.to_string(),
        }
    }

    #[test]
    fn test_streamed_reply_printed_once() {
        let out = render(&[
            SessionEvent::TurnCommitted(Turn::user("hỏi")),
            partial("Sốt, "),
            partial("Sốt, ho."),
            SessionEvent::TurnCommitted(Turn::assistant("Sốt, ho.")),
        ]);
        assert_eq!(out, "Sốt, ho.\n");
    }

    #[test]
    fn test_failure_after_partial_prints_apology_on_new_line() {
        let out = render(&[
            partial("Đau "),
            SessionEvent::TurnFailed {
                reason: "reset".to_string(),
            },
            SessionEvent::TurnCommitted(Turn::assistant("Xin lỗi")),
            SessionEvent::StateChanged {
                from: SessionState::Streaming,
                to: SessionState::Idle,
            },
        ]);
        assert_eq!(out, "Đau \nXin lỗi\n");
    }

    #[test]
    fn test_cancel_marks_partial_reply() {
        let out = render(&[
            partial("Nghỉ "),
            SessionEvent::StateChanged {
                from: SessionState::Streaming,
                to: SessionState::Idle,
            },
        ]);
        assert_eq!(out, "Nghỉ  [cancelled]\n");
    }

    #[test]
    fn test_empty_reply_ends_line() {
        let out = render(&[SessionEvent::TurnCommitted(Turn::assistant(""))]);
        assert_eq!(out, "\n");
    }
}
