use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::process::AgentProcess;
use crate::types::{Message, QueryOptions};
use crate::Result;

// ─── QueryStream ──────────────────────────────────────────────────────────

/// An async stream of [`Message`]s from an agent subprocess.
///
/// A background task owns the [`AgentProcess`] and forwards messages over an
/// mpsc channel until the first `result` message or process exit. Dropping
/// the stream closes the receiver; the task notices on its next send and
/// kills the child.
pub struct QueryStream {
    rx: mpsc::Receiver<Result<Message>>,
}

impl QueryStream {
    pub(crate) fn new(prompt: String, opts: QueryOptions) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let process = match AgentProcess::spawn(&prompt, &opts).await {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            forward(process, tx).await;
        });

        QueryStream { rx }
    }

    /// Wrap a channel a test feeds directly.
    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<Result<Message>>) -> Self {
        Self { rx }
    }
}

impl Stream for QueryStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Pump messages from `process` into `tx`, stopping after the result.
async fn forward(mut process: AgentProcess, tx: mpsc::Sender<Result<Message>>) {
    let mut got_result = false;
    loop {
        match process.next_message().await {
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
            Ok(None) => break,
            Ok(Some(msg)) => {
                let terminal = msg.is_result();
                got_result |= terminal;
                if tx.send(Ok(msg)).await.is_err() {
                    break;
                }
                if terminal {
                    break;
                }
            }
        }
    }

    // A process that dies before its result usually explains itself on stderr.
    if !got_result {
        if let Some(exit_err) = process.wait_exit_error().await {
            let _ = tx.send(Err(exit_err)).await;
        }
    }

    process.kill().await;
}

// ─── Tests ────────────────────────────────────────────────────────────────
