//! Applet-side bridge to the rotation daemon
//!
//! Commands go out asynchronously and return a `RemoteCall` handle the
//! caller polls from the applet loop; events pushed by the daemon are
//! drained by `pump` and fanned out to subscribers. State updates from an
//! event are applied before fanout, so a subscriber that reads the cached
//! snapshot during its callback sees the post-event state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Callback, OwnerId, SubscriptionId, SubscriptionRegistry};
use crate::daemon::ipc::{CommandEnvelope, DaemonCommand, DaemonEvent, DaemonSnapshot};
use ipc_channel::ipc::IpcSender;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteCallError {
    /// The daemon processed the command and reported failure
    #[error("daemon error: {0}")]
    Daemon(String),

    /// The connection went away before the command completed
    #[error("daemon connection lost")]
    Detached,
}

type CallSlot = Rc<RefCell<Option<Result<(), RemoteCallError>>>>;

/// Handle for one in-flight daemon command. Poll it from the applet loop;
/// the result arrives after a later `pump` processes the daemon's reply.
pub struct RemoteCall {
    slot: CallSlot,
}

impl RemoteCall {
    fn pending() -> (Self, CallSlot) {
        let slot: CallSlot = Rc::new(RefCell::new(None));
        (Self { slot: Rc::clone(&slot) }, slot)
    }

    fn resolved(result: Result<(), RemoteCallError>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(result))),
        }
    }

    /// Take the result if the command has completed. Returns `None` while
    /// still in flight; after returning `Some` the handle is spent.
    pub fn poll(&self) -> Option<Result<(), RemoteCallError>> {
        self.slot.borrow_mut().take()
    }
}

struct BridgeInner {
    state: DaemonSnapshot,
    attached: bool,
    command_tx: Option<IpcSender<CommandEnvelope>>,
    event_rx: Option<mpsc::Receiver<DaemonEvent>>,
    pending: HashMap<u64, (CallSlot, DaemonCommand)>,
    next_seq: u64,
    registry: SubscriptionRegistry<(), DaemonEvent>,
}

/// Shared handle to the daemon connection.
#[derive(Clone)]
pub struct RemoteControlBridge {
    inner: Rc<RefCell<BridgeInner>>,
}

impl RemoteControlBridge {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BridgeInner {
                state: DaemonSnapshot::default(),
                attached: false,
                command_tx: None,
                event_rx: None,
                pending: HashMap::new(),
                next_seq: 1,
                registry: SubscriptionRegistry::new(),
            })),
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Wire up a live connection: the command channel into the daemon, a
    /// thread-bridged event receiver, and the snapshot taken at accept
    /// time. Fans out a synthetic `Toggled` so surfaces mounted before the
    /// connection render the true running state.
    pub fn attach(
        &self,
        command_tx: IpcSender<CommandEnvelope>,
        event_rx: mpsc::Receiver<DaemonEvent>,
        snapshot: DaemonSnapshot,
    ) {
        let running = snapshot.running;
        {
            let mut inner = self.inner.borrow_mut();
            inner.state = snapshot;
            inner.attached = true;
            inner.command_tx = Some(command_tx);
            inner.event_rx = Some(event_rx);
        }
        info!(running, "Daemon connection attached");
        self.fan_out(DaemonEvent::Toggled(running));
    }

    /// Tear down the connection. Every in-flight command resolves as
    /// `Detached`; cached state keeps its last values. Idempotent.
    pub fn detach(&self) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            if !inner.attached {
                return;
            }
            inner.attached = false;
            inner.command_tx = None;
            inner.event_rx = None;
            std::mem::take(&mut inner.pending)
        };
        info!(aborted = pending.len(), "Daemon connection detached");
        for (_, (slot, _)) in pending {
            *slot.borrow_mut() = Some(Err(RemoteCallError::Detached));
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> DaemonSnapshot {
        self.inner.borrow().state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().state.running
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn start(&self) -> RemoteCall {
        self.send(DaemonCommand::Start)
    }

    pub fn stop(&self) -> RemoteCall {
        self.send(DaemonCommand::Stop)
    }

    pub fn next(&self) -> RemoteCall {
        self.send(DaemonCommand::Next)
    }

    pub fn prev(&self) -> RemoteCall {
        self.send(DaemonCommand::Prev)
    }

    /// Start or stop based on the cached running state.
    pub fn toggle(&self) -> RemoteCall {
        if self.is_running() {
            self.stop()
        } else {
            self.start()
        }
    }

    fn send(&self, command: DaemonCommand) -> RemoteCall {
        let mut inner = self.inner.borrow_mut();
        if !inner.attached {
            debug!(command = ?command, "Command while detached");
            return RemoteCall::resolved(Err(RemoteCallError::Detached));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let envelope = CommandEnvelope { seq, command };
        let Some(tx) = inner.command_tx.as_ref() else {
            return RemoteCall::resolved(Err(RemoteCallError::Detached));
        };
        if let Err(e) = tx.send(envelope) {
            warn!(command = ?command, error = %e, "Failed to send daemon command");
            drop(inner);
            self.detach();
            return RemoteCall::resolved(Err(RemoteCallError::Detached));
        }

        debug!(seq, command = ?command, "Sent daemon command");
        let (call, slot) = RemoteCall::pending();
        inner.pending.insert(seq, (slot, command));
        call
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to daemon events. Delivery order follows subscription
    /// order, same as configuration notifications.
    pub fn subscribe(&self, owner: OwnerId, callback: Callback<DaemonEvent>) -> SubscriptionId {
        self.inner.borrow_mut().registry.subscribe(owner, (), callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.borrow_mut().registry.unsubscribe(id);
    }

    pub fn dispose_all(&self, owner: OwnerId) {
        self.inner.borrow_mut().registry.dispose_all(owner);
    }

    /// Drain queued daemon events: update cached state, resolve replies,
    /// fan out push events. Call once per applet loop iteration.
    pub fn pump(&self) {
        loop {
            let event = {
                let inner = self.inner.borrow();
                let Some(rx) = inner.event_rx.as_ref() else {
                    return;
                };
                match rx.try_recv() {
                    Ok(event) => Some(event),
                    Err(mpsc::TryRecvError::Empty) => None,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        drop(inner);
                        warn!("Daemon event channel closed");
                        self.detach();
                        return;
                    }
                }
            };
            let Some(event) = event else { return };
            self.process(event);
        }
    }

    fn process(&self, event: DaemonEvent) {
        match event {
            DaemonEvent::Toggled(running) => {
                self.inner.borrow_mut().state.running = running;
                self.fan_out(DaemonEvent::Toggled(running));
            }
            DaemonEvent::Changed(path) => {
                self.inner.borrow_mut().state.current_path = path.clone();
                self.fan_out(DaemonEvent::Changed(path));
            }
            DaemonEvent::Error(message) => {
                self.fan_out(DaemonEvent::Error(message));
            }
            // Replies resolve their pending call and are not fanned out
            DaemonEvent::Reply { seq, result } => {
                let entry = self.inner.borrow_mut().pending.remove(&seq);
                let Some((slot, command)) = entry else {
                    debug!(seq, "Reply for unknown sequence number");
                    return;
                };
                let resolved = match result {
                    Ok(()) => {
                        // A successful start/stop implies the new running
                        // state even if the Toggled push races behind
                        match command {
                            DaemonCommand::Start => self.inner.borrow_mut().state.running = true,
                            DaemonCommand::Stop => self.inner.borrow_mut().state.running = false,
                            _ => {}
                        }
                        Ok(())
                    }
                    Err(message) => Err(RemoteCallError::Daemon(message)),
                };
                *slot.borrow_mut() = Some(resolved);
            }
        }
    }

    fn fan_out(&self, event: DaemonEvent) {
        let callbacks = self.inner.borrow().registry.callbacks_for(());
        for cb in callbacks {
            (&mut *cb.borrow_mut())(&event);
        }
    }
}

impl Default for RemoteControlBridge {
    fn default() -> Self {
        Self::new()
    }
}
