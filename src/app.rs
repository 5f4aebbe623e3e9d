//! Applet assembly and main loop
//!
//! Builds every UI surface, wires the global shortcuts, launches the
//! rotation daemon, and drives the whole thing from a single-threaded
//! loop: pump daemon events, dispatch shortcut presses, tick surfaces,
//! present queued notifications.

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{ConfigKey, ConfigStore, KeybindingAction, OwnerId};
use crate::constants::app;
use crate::daemon::{self, PendingAttach, RemoteControlBridge};
use crate::keybindings::KeybindingManager;
use crate::ui::{
    AppContext, BindingHost, DaemonToggle, Notification, NotificationQueue, ProfileSubMenu,
    RotationControls, RotationSubMenu, SettingsNotifier, Severity, SwitchItem,
};

impl AppContext {
    pub fn new(config_path: PathBuf) -> Result<Self> {
        Ok(Self {
            config: ConfigStore::load(config_path)?,
            daemon: RemoteControlBridge::new(),
        })
    }
}

/// The assembled panel applet.
pub struct Applet {
    host: BindingHost,
    keybindings: KeybindingManager,
    queue: NotificationQueue,

    toggle: Rc<RefCell<DaemonToggle>>,
    controls: Rc<RefCell<RotationControls>>,
    desktop_menu: Rc<RefCell<ProfileSubMenu>>,
    rotation_menu: Rc<RefCell<RotationSubMenu>>,
    switches: Vec<Rc<RefCell<SwitchItem>>>,
    lockscreen_menu: Option<(OwnerId, Rc<RefCell<ProfileSubMenu>>)>,
    lockscreen_dirty: Rc<Cell<bool>>,
    app_owner: OwnerId,

    pending_attach: Option<PendingAttach>,
    auto_start_done: bool,
}

impl Applet {
    pub fn new(ctx: AppContext, mut keybindings: KeybindingManager) -> Self {
        let queue = NotificationQueue::new();
        let mut host = BindingHost::new(ctx.clone());

        host.mount(Rc::new(RefCell::new(SettingsNotifier::new(queue.clone()))));

        let toggle = Rc::new(RefCell::new(DaemonToggle::new(queue.clone())));
        host.mount(Rc::clone(&toggle));

        let controls = Rc::new(RefCell::new(RotationControls::new(queue.clone())));
        host.mount(Rc::clone(&controls));

        let desktop_menu = Rc::new(RefCell::new(ProfileSubMenu::desktop()));
        host.mount(Rc::clone(&desktop_menu));

        let rotation_menu = Rc::new(RefCell::new(RotationSubMenu::new()));
        host.mount(Rc::clone(&rotation_menu));

        let switches: Vec<Rc<RefCell<SwitchItem>>> = [
            ("Random Order", ConfigKey::Random),
            ("Change on Rotation", ConfigKey::AutoRotate),
            ("Update Lockscreen", ConfigKey::UpdateLockscreen),
            ("Notifications", ConfigKey::Notifications),
            ("Remember Profile State", ConfigKey::RememberProfileState),
            ("Icon Preview", ConfigKey::IconPreview),
        ]
        .into_iter()
        .map(|(label, key)| {
            let item = Rc::new(RefCell::new(SwitchItem::new(label, key)));
            host.mount(Rc::clone(&item));
            item
        })
        .collect();

        // The lockscreen submenu exists only while update-lockscreen is on;
        // the subscription marks it dirty and the loop re-syncs the mount
        let lockscreen_dirty = Rc::new(Cell::new(false));
        let dirty = Rc::clone(&lockscreen_dirty);
        let app_owner = host.allocate_owner();
        ctx.config.subscribe(
            app_owner,
            ConfigKey::UpdateLockscreen,
            Rc::new(RefCell::new(move |_: &ConfigKey| dirty.set(true))),
        );

        // Shortcut presses route through the controls surface so their
        // results get polled and failures notified
        for (action, forward) in [
            (KeybindingAction::NextWallpaper, true),
            (KeybindingAction::PrevWallpaper, false),
        ] {
            let sink = controls.borrow().call_sink();
            let bridge = ctx.daemon.clone();
            keybindings.register(
                action,
                Rc::new(move || {
                    let call = if forward { bridge.next() } else { bridge.prev() };
                    sink.borrow_mut().push(call);
                }),
            );
        }

        let mut applet = Self {
            host,
            keybindings,
            queue,
            toggle,
            controls,
            desktop_menu,
            rotation_menu,
            switches,
            lockscreen_menu: None,
            lockscreen_dirty,
            app_owner,
            pending_attach: None,
            auto_start_done: false,
        };
        applet.sync_lockscreen_menu();
        applet
    }

    pub fn context(&self) -> &AppContext {
        self.host.context()
    }

    pub fn toggle_surface(&self) -> &Rc<RefCell<DaemonToggle>> {
        &self.toggle
    }

    pub fn controls_surface(&self) -> &Rc<RefCell<RotationControls>> {
        &self.controls
    }

    pub fn desktop_menu(&self) -> &Rc<RefCell<ProfileSubMenu>> {
        &self.desktop_menu
    }

    pub fn rotation_menu(&self) -> &Rc<RefCell<RotationSubMenu>> {
        &self.rotation_menu
    }

    pub fn switches(&self) -> &[Rc<RefCell<SwitchItem>>] {
        &self.switches
    }

    pub fn lockscreen_menu(&self) -> Option<&Rc<RefCell<ProfileSubMenu>>> {
        self.lockscreen_menu.as_ref().map(|(_, menu)| menu)
    }

    /// Spawn the rotation daemon; attachment completes from the loop.
    pub fn launch_daemon(&mut self) {
        match daemon::launch() {
            Ok(pending) => self.pending_attach = Some(pending),
            Err(e) => {
                error!(error = %e, "Failed to launch rotation daemon");
                self.queue
                    .push(Severity::Error, format!("Failed to launch daemon: {e}"));
            }
        }
    }

    /// Post-handshake work: start rotation if configured to.
    pub fn on_daemon_attached(&mut self) {
        if self.auto_start_done {
            return;
        }
        self.auto_start_done = true;

        let ctx = self.host.context();
        if ctx.config.auto_start() && !ctx.daemon.is_running() {
            info!("Auto-starting wallpaper rotation");
            let call = ctx.daemon.start();
            self.controls.borrow().call_sink().borrow_mut().push(call);
        }
    }

    /// Mount or unmount the lockscreen submenu to match update-lockscreen.
    fn sync_lockscreen_menu(&mut self) {
        let wanted = self.host.context().config.update_lockscreen();
        match (&self.lockscreen_menu, wanted) {
            (None, true) => {
                let menu = Rc::new(RefCell::new(ProfileSubMenu::lockscreen()));
                let owner = self.host.mount(Rc::clone(&menu));
                self.lockscreen_menu = Some((owner, menu));
            }
            (Some((owner, _)), false) => {
                let owner = *owner;
                self.host.unmount(owner);
                self.lockscreen_menu = None;
            }
            _ => {}
        }
    }

    /// One iteration of the applet loop. Returns the notifications that
    /// became due during this step.
    pub fn step(&mut self) -> Vec<Notification> {
        let bridge = self.host.context().daemon.clone();

        let mut attached = false;
        let mut handshake_lost = false;
        if let Some(pending) = self.pending_attach.as_mut()
            && !bridge.is_attached()
        {
            // A daemon death after the handshake surfaces through pump()
            // as a closed event channel instead
            if pending.try_complete(&bridge) {
                attached = true;
            } else if pending.exited() {
                handshake_lost = true;
            }
        }
        if attached {
            self.on_daemon_attached();
        }
        if handshake_lost {
            warn!("Rotation daemon exited before completing the handshake");
            self.queue
                .push(Severity::Error, "Rotation daemon exited unexpectedly");
            self.pending_attach = None;
        }

        bridge.pump();
        self.keybindings.dispatch_pending();
        self.host.tick_all();

        if self.lockscreen_dirty.replace(false) {
            self.sync_lockscreen_menu();
        }

        self.queue.drain()
    }

    /// Run until `shutdown` is raised.
    pub fn run(&mut self, shutdown: &Arc<AtomicBool>) {
        info!("Applet running");
        while !shutdown.load(Ordering::Relaxed) {
            for note in self.step() {
                match note.severity {
                    Severity::Info => info!(notification = %note.message),
                    Severity::Error => error!(notification = %note.message),
                }
            }
            std::thread::sleep(Duration::from_millis(app::TICK_MS));
        }
        info!("Shutdown requested");
    }

    /// Tear everything down: surfaces, shortcut grabs, daemon connection
    /// and process.
    pub fn shutdown(&mut self) {
        if let Some((owner, _)) = self.lockscreen_menu.take() {
            self.host.unmount(owner);
        }
        self.host.unmount_all();
        self.host.context().config.dispose_all(self.app_owner);
        self.keybindings.unregister_all();
        self.host.context().daemon.clone().detach();
        if let Some(mut pending) = self.pending_attach.take() {
            pending.shutdown();
        }
        info!("Applet stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::{CommandEnvelope, DaemonCommand, DaemonSnapshot};
    use crate::keybindings::ShortcutNamespace;
    use crate::keybindings::backend::StubBackend;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn test_applet(dir: &TempDir) -> (Applet, mpsc::Sender<KeybindingAction>) {
        let ctx = AppContext::new(dir.path().join("settings.json")).unwrap();
        let (backend, _grabs) = StubBackend::new();
        let (press_tx, press_rx) = mpsc::channel();
        let keybindings = KeybindingManager::new(
            ctx.config.clone(),
            Box::new(backend),
            Vec::<ShortcutNamespace>::new(),
            press_rx,
        );
        (Applet::new(ctx, keybindings), press_tx)
    }

    fn attach(
        applet: &Applet,
        running: bool,
    ) -> (
        ipc_channel::ipc::IpcReceiver<CommandEnvelope>,
        mpsc::Sender<crate::daemon::DaemonEvent>,
    ) {
        let (command_tx, command_rx) = ipc_channel::ipc::channel().unwrap();
        let (event_tx, event_rx) = mpsc::channel();
        applet.context().daemon.attach(
            command_tx,
            event_rx,
            DaemonSnapshot {
                running,
                ..Default::default()
            },
        );
        (command_rx, event_tx)
    }

    #[test]
    fn test_lockscreen_menu_follows_update_lockscreen() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        assert!(applet.lockscreen_menu().is_some(), "on by default");

        applet.context().config.set_update_lockscreen(false);
        applet.step();
        assert!(applet.lockscreen_menu().is_none());

        applet.context().config.set_update_lockscreen(true);
        applet.step();
        assert!(applet.lockscreen_menu().is_some());
    }

    #[test]
    fn test_shortcut_press_sends_daemon_command() {
        let dir = TempDir::new().unwrap();
        let (mut applet, press_tx) = test_applet(&dir);
        let (command_rx, _event_tx) = attach(&applet, true);

        press_tx.send(KeybindingAction::NextWallpaper).unwrap();
        applet.step();

        assert_eq!(command_rx.recv().unwrap().command, DaemonCommand::Next);
    }

    #[test]
    fn test_auto_start_after_attach() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        applet.context().config.set_auto_start(true);
        let (command_rx, _event_tx) = attach(&applet, false);

        applet.on_daemon_attached();
        applet.on_daemon_attached(); // only once

        assert_eq!(command_rx.recv().unwrap().command, DaemonCommand::Start);
        assert!(command_rx.try_recv().is_err());
    }

    #[test]
    fn test_no_auto_start_when_already_running() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        applet.context().config.set_auto_start(true);
        let (command_rx, _event_tx) = attach(&applet, true);

        applet.on_daemon_attached();
        assert!(command_rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        let (_command_rx, _event_tx) = attach(&applet, false);

        applet.shutdown();
        applet.shutdown(); // idempotent

        assert!(!applet.context().daemon.is_attached());
        // A config write after shutdown reaches no surface
        applet.context().config.set_random(false);
    }

    #[test]
    fn test_toggle_surface_drives_daemon() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        let (command_rx, event_tx) = attach(&applet, false);

        let ctx = applet.context().clone();
        applet.toggle_surface().borrow_mut().toggle(&ctx);
        let envelope = command_rx.recv().unwrap();
        assert_eq!(envelope.command, DaemonCommand::Start);

        event_tx
            .send(crate::daemon::DaemonEvent::Reply {
                seq: envelope.seq,
                result: Ok(()),
            })
            .unwrap();
        applet.step();

        assert_eq!(
            applet.toggle_surface().borrow().state,
            crate::ui::ToggleState::Running
        );
    }

    #[test]
    fn test_failed_command_surfaces_notification() {
        let dir = TempDir::new().unwrap();
        let (mut applet, _press_tx) = test_applet(&dir);
        let (command_rx, event_tx) = attach(&applet, true);

        let ctx = applet.context().clone();
        applet.controls_surface().borrow().next(&ctx);
        let envelope = command_rx.recv().unwrap();
        event_tx
            .send(crate::daemon::DaemonEvent::Reply {
                seq: envelope.seq,
                result: Err("no images in profile".to_string()),
            })
            .unwrap();

        let notes = applet.step();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
        assert!(notes[0].message.contains("no images in profile"));
    }

    #[test]
    fn test_menu_surfaces_render_from_state() {
        let dir = TempDir::new().unwrap();
        let (applet, _press_tx) = test_applet(&dir);

        assert_eq!(
            applet.desktop_menu().borrow().title,
            "Desktop Profile: default"
        );
        assert_eq!(applet.rotation_menu().borrow().items.len(), 3);
    }

    #[test]
    fn test_switch_surfaces_track_defaults() {
        let dir = TempDir::new().unwrap();
        let (applet, _press_tx) = test_applet(&dir);

        let random = applet
            .switches()
            .iter()
            .find(|s| s.borrow().label == "Random Order")
            .unwrap();
        assert!(random.borrow().checked);
    }
}
