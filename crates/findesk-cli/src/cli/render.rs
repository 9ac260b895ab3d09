//! Incremental transcript rendering from store snapshots.

use std::future::Future;
use std::io::{self, Write};

use findesk_core::session::SessionState;
use tokio::sync::watch;

/// Prints assistant output as it grows.
///
/// Tracks which message is being streamed and how many bytes of it are on
/// screen, so each render only writes the new tail. User messages are never
/// echoed; the user just typed them.
pub struct TranscriptRenderer<W> {
    out: W,
    cursor: usize,
    printed: usize,
}

impl<W: Write> TranscriptRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cursor: 0,
            printed: 0,
        }
    }

    pub fn render(&mut self, state: &SessionState) -> io::Result<()> {
        let visible = state.visible_messages();
        let in_flight = state.turn_status().is_in_flight();

        while let Some(message) = visible.get(self.cursor) {
            if message.is_assistant() {
                let content = message.content();
                let tail = content.get(self.printed..).unwrap_or(content);
                write!(self.out, "{tail}")?;

                let streaming = in_flight && self.cursor + 1 == visible.len();
                if streaming {
                    self.printed = content.len();
                    break;
                }
                writeln!(self.out)?;
                writeln!(self.out)?;
            }
            self.cursor += 1;
            self.printed = 0;
        }

        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Awaits `turn` while re-rendering on every store change, then renders the
/// final state once more.
pub async fn follow<F, W>(
    turn: F,
    rx: &mut watch::Receiver<SessionState>,
    renderer: &mut TranscriptRenderer<W>,
) -> io::Result<F::Output>
where
    F: Future,
    W: Write,
{
    tokio::pin!(turn);
    let output = loop {
        tokio::select! {
            output = &mut turn => break output,
            changed = rx.changed() => {
                if changed.is_err() {
                    break (&mut turn).await;
                }
                let state = rx.borrow_and_update().clone();
                renderer.render(&state)?;
            }
        }
    };

    let state = rx.borrow_and_update().clone();
    renderer.render(&state)?;
    Ok(output)
}
