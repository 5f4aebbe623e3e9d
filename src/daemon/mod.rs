//! Rotation daemon: process launch, IPC bootstrap, applet-side bridge

pub mod bridge;
pub mod ipc;

pub use bridge::{RemoteCall, RemoteCallError, RemoteControlBridge};
pub use ipc::{BootstrapMessage, CommandEnvelope, DaemonCommand, DaemonEvent, DaemonSnapshot};

use anyhow::{Context, Result};
use ipc_channel::ipc::IpcOneShotServer;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use tracing::{debug, error, info};

use crate::constants::daemon;

/// A launched daemon whose IPC handshake has not completed yet.
///
/// The one-shot accept blocks, so it runs on a helper thread; the applet
/// polls `try_complete` from its loop until the bootstrap arrives.
pub struct PendingAttach {
    bootstrap_rx: mpsc::Receiver<BootstrapMessage>,
    child: Child,
}

impl PendingAttach {
    /// Attach `bridge` if the daemon has connected. Returns `true` once the
    /// handshake is done; the applet stops polling after that.
    pub fn try_complete(&mut self, bridge: &RemoteControlBridge) -> bool {
        let Ok((command_tx, event_rx, snapshot)) = self.bootstrap_rx.try_recv() else {
            return false;
        };
        debug!("Received IPC channels from daemon");

        // Bridge the ipc receiver to the applet thread over std mpsc
        let (event_fwd_tx, event_fwd_rx) = mpsc::channel();
        std::thread::spawn(move || {
            while let Ok(event) = event_rx.recv() {
                if event_fwd_tx.send(event).is_err() {
                    break; // applet dropped
                }
            }
        });

        bridge.attach(command_tx, event_fwd_rx, snapshot);
        true
    }

    /// Kill the daemon process and reap it.
    pub fn shutdown(&mut self) {
        info!(pid = self.child.id(), "Stopping daemon process");
        if let Err(e) = self.child.kill() {
            error!(pid = self.child.id(), error = %e, "Failed to kill daemon");
        }
        match self.child.wait() {
            Ok(status) => info!(pid = self.child.id(), status = ?status, "Daemon exited"),
            Err(e) => error!(pid = self.child.id(), error = %e, "Failed to wait for daemon exit"),
        }
    }

    /// Check whether the daemon process exited on its own.
    pub fn exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

/// Launch the rotation daemon and begin waiting for its IPC handshake.
pub fn launch() -> Result<PendingAttach> {
    let (server, server_name) =
        IpcOneShotServer::<BootstrapMessage>::new().context("Failed to create IPC server")?;

    let child = Command::new(daemon::BINARY)
        .arg(daemon::IPC_SERVER_FLAG)
        .arg(&server_name)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to spawn {}", daemon::BINARY))?;
    debug!(pid = child.id(), server_name = %server_name, "Started daemon process");

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        debug!("Waiting for daemon IPC connection...");
        match server.accept() {
            Ok((_, bootstrap)) => {
                info!("Daemon connected via IPC");
                let _ = tx.send(bootstrap);
            }
            Err(e) => {
                error!(error = %e, "Failed to accept IPC connection");
            }
        }
    });

    Ok(PendingAttach {
        bootstrap_rx: rx,
        child,
    })
}
