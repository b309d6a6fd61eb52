//! Per-connection session state.

use tokio::sync::mpsc;

use fleet_state::WorkerId;

use crate::message::WorkerCommand;

/// One open worker channel.
///
/// The transport owns the session, feeds inbound frames to
/// [`crate::Coordinator::handle_text`], and forwards whatever
/// [`next_command`](Self::next_command) yields to the worker.
#[derive(Debug)]
pub struct WorkerSession {
    id: u64,
    source: Option<String>,
    worker_id: Option<WorkerId>,
    commands: Option<mpsc::Receiver<WorkerCommand>>,
}

impl WorkerSession {
    pub(crate) fn new(id: u64, source: Option<String>) -> Self {
        Self {
            id,
            source,
            worker_id: None,
            commands: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address of the channel, if the transport knows it.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.worker_id.is_some()
    }

    /// Wait for the next command addressed to this worker.
    ///
    /// Never resolves before registration. Returns `None` once the command
    /// channel is gone: a newer session registered the same worker, or the
    /// worker was removed.
    pub async fn next_command(&mut self) -> Option<WorkerCommand> {
        match self.commands.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) fn attach(&mut self, worker_id: WorkerId, commands: mpsc::Receiver<WorkerCommand>) {
        self.worker_id = Some(worker_id);
        self.commands = Some(commands);
    }

    pub(crate) fn detach(&mut self) {
        self.worker_id = None;
        self.commands = None;
    }
}
