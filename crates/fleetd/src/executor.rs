//! Local process executor.
//!
//! Runs the configured command against the active upstream and forwards
//! every stdout/stderr line to the coordinator, which scrapes it for
//! failure patterns. A restart kills the running child before spawning the
//! replacement. Crash supervision is out of scope: a child that exits on
//! its own stays down until the next rotation.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use fleet_core::LocalProcessConfig;
use fleet_state::UpstreamEndpoint;

const UPSTREAM_PLACEHOLDER: &str = "{upstream}";
const CREDENTIAL_PLACEHOLDER: &str = "{credential}";

pub struct ProcessExecutor {
    config: LocalProcessConfig,
    child: Mutex<Option<Child>>,
    lines: mpsc::Sender<String>,
}

impl ProcessExecutor {
    pub fn new(config: LocalProcessConfig, lines: mpsc::Sender<String>) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            lines,
        }
    }

    /// Arguments with the placeholders filled in for `upstream`.
    pub fn render_args(&self, upstream: &UpstreamEndpoint) -> Vec<String> {
        let credential = upstream.credential_ref.as_deref().unwrap_or_default();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace(UPSTREAM_PLACEHOLDER, &upstream.address)
                    .replace(CREDENTIAL_PLACEHOLDER, credential)
            })
            .collect()
    }

    /// Stop any running child, then spawn one pointed at `upstream`.
    pub async fn start(&self, upstream: &UpstreamEndpoint) -> anyhow::Result<()> {
        let mut slot = self.child.lock().await;
        if let Some(old) = slot.take() {
            stop_child(old).await;
        }

        let args = self.render_args(upstream);
        let mut child = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", self.config.command))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, self.lines.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, self.lines.clone()));
        }

        info!(
            command = %self.config.command,
            upstream = %upstream.id,
            pid = ?child.id(),
            "local process started"
        );
        *slot = Some(child);
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(child) = self.child.lock().await.take() {
            stop_child(child).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        let mut slot = self.child.lock().await;
        match slot.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

async fn stop_child(mut child: Child) {
    let pid = child.id();
    if let Err(e) = child.kill().await {
        warn!(?pid, error = %e, "failed to kill local process");
    } else {
        debug!(?pid, "local process stopped");
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, lines: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader).lines();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                if lines.send(line).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "local process output closed");
                return;
            }
        }
    }
}
