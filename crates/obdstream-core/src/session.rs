// ── Streaming session ──
//
// The set of commands actually being polled, and the task that pumps
// the transport's batch stream into the store. At most one session runs
// at a time; `stop()` returns only after the old stream has been
// dropped, so two request loops never overlap on the transport.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use obdstream_api::BatchStream;

use crate::model::Command;
use crate::store::DataStore;

/// Filter demand down to what the vehicle can answer.
///
/// Only gauges are checked against the supported set; status bundles,
/// trouble-code requests and vendor commands always pass through.
pub(crate) fn effective_commands(
    interest: &HashSet<Command>,
    supported: &HashSet<Command>,
) -> HashSet<Command> {
    interest
        .iter()
        .filter(|cmd| !cmd.is_gauge() || supported.contains(cmd))
        .copied()
        .collect()
}

/// The controller's record of the running poll loop.
#[derive(Default)]
pub(crate) struct StreamingSession {
    active: HashSet<Command>,
    running: Option<RunningSession>,
}

struct RunningSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StreamingSession {
    /// Commands currently being polled. Empty when idle.
    pub(crate) fn active(&self) -> &HashSet<Command> {
        &self.active
    }

    /// Cancel the running session and wait for its task to finish.
    /// No batch is ingested after this returns.
    pub(crate) async fn stop(&mut self) {
        self.active.clear();
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            if e.is_panic() {
                warn!(error = %e, "session task panicked");
            }
        }
        trace!("session stopped");
    }

    /// Spawn the pump for `stream`. The caller must have stopped any
    /// previous session first.
    ///
    /// `on_error` runs at most once, from inside the session task, when
    /// the stream yields an error before being cancelled.
    pub(crate) fn start<F>(
        &mut self,
        commands: HashSet<Command>,
        stream: BatchStream,
        store: Arc<DataStore>,
        parent: &CancellationToken,
        on_error: F,
    ) where
        F: FnOnce(obdstream_api::Error) + Send + 'static,
    {
        debug_assert!(self.running.is_none(), "session started twice");
        let cancel = parent.child_token();
        let handle = tokio::spawn(session_task(
            stream,
            commands.clone(),
            store,
            cancel.clone(),
            on_error,
        ));
        self.active = commands;
        self.running = Some(RunningSession { cancel, handle });
    }
}

/// Pump batches into the store until cancelled or the stream ends.
async fn session_task<F>(
    mut stream: BatchStream,
    requested: HashSet<Command>,
    store: Arc<DataStore>,
    cancel: CancellationToken,
    on_error: F,
) where
    F: FnOnce(obdstream_api::Error) + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = stream.next() => match item {
                Some(Ok(batch)) => {
                    trace!(results = batch.len(), "batch received");
                    store.ingest(&requested, batch);
                }
                Some(Err(e)) => {
                    if !cancel.is_cancelled() {
                        on_error(e);
                    }
                    break;
                }
                None => {
                    debug!("batch stream ended");
                    break;
                }
            }
        }
    }
}
