//! Reactive bindings between state and UI surfaces
//!
//! A surface declares the configuration keys (and optionally daemon
//! events) it depends on; the host renders it once at mount, then
//! re-renders on every matching notification. Unmounting disposes every
//! subscription the surface created, keyed by its owner identity, so a
//! surface can be mounted and unmounted repeatedly without leaking.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::{ConfigKey, ConfigStore, OwnerId};
use crate::daemon::{DaemonEvent, RemoteControlBridge};

/// Shared state handed to every surface callback.
#[derive(Clone)]
pub struct AppContext {
    pub config: ConfigStore,
    pub daemon: RemoteControlBridge,
}

/// One UI surface driven by state changes.
pub trait ReactiveBinding: 'static {
    /// Configuration keys whose writes should re-render this surface.
    fn watched_keys(&self) -> &[ConfigKey];

    /// Whether daemon events should also reach this surface.
    fn watches_daemon(&self) -> bool {
        false
    }

    /// Recompute the surface from current state.
    fn render(&mut self, ctx: &AppContext);

    fn on_key_changed(&mut self, _key: ConfigKey, ctx: &AppContext) {
        self.render(ctx);
    }

    fn on_daemon_event(&mut self, _event: &DaemonEvent, ctx: &AppContext) {
        self.render(ctx);
    }

    /// Periodic hook for surfaces that poll in-flight work.
    fn tick(&mut self, _ctx: &AppContext) {}
}

/// Owns mounted surfaces and the subscriptions wired for them.
pub struct BindingHost {
    ctx: AppContext,
    next_owner: u64,
    mounted: Vec<(OwnerId, Rc<RefCell<dyn ReactiveBinding>>)>,
}

impl BindingHost {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            next_owner: 1,
            mounted: Vec::new(),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Hand out an owner identity for subscriptions made outside a surface.
    pub fn allocate_owner(&mut self) -> OwnerId {
        let owner = OwnerId::from_raw(self.next_owner);
        self.next_owner += 1;
        owner
    }

    /// Mount a surface: render once, then subscribe it to its watched keys
    /// and, if requested, to daemon events. Callbacks hold the surface
    /// weakly; a surface dropped without unmounting goes quiet instead of
    /// keeping itself alive through its own subscriptions.
    pub fn mount<S: ReactiveBinding>(&mut self, binding: Rc<RefCell<S>>) -> OwnerId {
        let binding: Rc<RefCell<dyn ReactiveBinding>> = binding;
        let owner = self.allocate_owner();

        binding.borrow_mut().render(&self.ctx);

        let keys: Vec<ConfigKey> = binding.borrow().watched_keys().to_vec();
        for key in keys {
            let weak: Weak<RefCell<dyn ReactiveBinding>> = Rc::downgrade(&binding);
            let ctx = self.ctx.clone();
            self.ctx.config.subscribe(
                owner,
                key,
                Rc::new(RefCell::new(move |changed: &ConfigKey| {
                    if let Some(surface) = weak.upgrade() {
                        surface.borrow_mut().on_key_changed(*changed, &ctx);
                    }
                })),
            );
        }

        if binding.borrow().watches_daemon() {
            let weak: Weak<RefCell<dyn ReactiveBinding>> = Rc::downgrade(&binding);
            let ctx = self.ctx.clone();
            self.ctx.daemon.subscribe(
                owner,
                Rc::new(RefCell::new(move |event: &DaemonEvent| {
                    if let Some(surface) = weak.upgrade() {
                        surface.borrow_mut().on_daemon_event(event, &ctx);
                    }
                })),
            );
        }

        self.mounted.push((owner, binding));
        owner
    }

    /// Unmount a surface and release everything it subscribed. Idempotent;
    /// unknown owners are ignored.
    pub fn unmount(&mut self, owner: OwnerId) {
        self.ctx.config.dispose_all(owner);
        self.ctx.daemon.dispose_all(owner);
        self.mounted.retain(|(o, _)| *o != owner);
    }

    /// Unmount every surface, in reverse mount order.
    pub fn unmount_all(&mut self) {
        let owners: Vec<OwnerId> = self.mounted.iter().rev().map(|(o, _)| *o).collect();
        for owner in owners {
            self.unmount(owner);
        }
    }

    /// Run the periodic hook of every mounted surface.
    pub fn tick_all(&mut self) {
        let surfaces: Vec<Rc<RefCell<dyn ReactiveBinding>>> =
            self.mounted.iter().map(|(_, s)| Rc::clone(s)).collect();
        for surface in surfaces {
            surface.borrow_mut().tick(&self.ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn test_ctx(dir: &TempDir) -> AppContext {
        AppContext {
            config: ConfigStore::load(dir.path().join("settings.json")).unwrap(),
            daemon: RemoteControlBridge::new(),
        }
    }

    struct Probe {
        keys: Vec<ConfigKey>,
        daemon: bool,
        renders: Rc<Cell<u32>>,
        ticks: Rc<Cell<u32>>,
    }

    impl Probe {
        fn new(keys: Vec<ConfigKey>, daemon: bool) -> (Rc<RefCell<Self>>, Rc<Cell<u32>>) {
            let renders = Rc::new(Cell::new(0));
            let probe = Rc::new(RefCell::new(Self {
                keys,
                daemon,
                renders: Rc::clone(&renders),
                ticks: Rc::new(Cell::new(0)),
            }));
            (probe, renders)
        }
    }

    impl ReactiveBinding for Probe {
        fn watched_keys(&self) -> &[ConfigKey] {
            &self.keys
        }

        fn watches_daemon(&self) -> bool {
            self.daemon
        }

        fn render(&mut self, _ctx: &AppContext) {
            self.renders.set(self.renders.get() + 1);
        }

        fn tick(&mut self, _ctx: &AppContext) {
            self.ticks.set(self.ticks.get() + 1);
        }
    }

    #[test]
    fn test_mount_renders_once_immediately() {
        let dir = TempDir::new().unwrap();
        let mut host = BindingHost::new(test_ctx(&dir));
        let (probe, renders) = Probe::new(vec![ConfigKey::Random], false);

        host.mount(probe);
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn test_watched_key_write_rerenders() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let mut host = BindingHost::new(ctx.clone());
        let (probe, renders) = Probe::new(vec![ConfigKey::Random], false);
        host.mount(probe);

        ctx.config.set_random(false);
        assert_eq!(renders.get(), 2);

        ctx.config.set_interval(60);
        assert_eq!(renders.get(), 2, "unwatched key does not re-render");
    }

    #[test]
    fn test_unmount_releases_subscriptions() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let mut host = BindingHost::new(ctx.clone());
        let (probe, renders) = Probe::new(vec![ConfigKey::Random, ConfigKey::Interval], false);
        let owner = host.mount(probe);

        assert_eq!(ctx.config.active_subscriptions(owner), 2);
        host.unmount(owner);
        host.unmount(owner); // idempotent

        assert_eq!(ctx.config.active_subscriptions(owner), 0);
        ctx.config.set_random(false);
        assert_eq!(renders.get(), 1, "only the mount render happened");
    }

    #[test]
    fn test_remount_subscribes_afresh() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let mut host = BindingHost::new(ctx.clone());
        let (probe, renders) = Probe::new(vec![ConfigKey::Random], false);

        let owner = host.mount(Rc::clone(&probe));
        host.unmount(owner);
        host.mount(probe);

        ctx.config.set_random(false);
        assert_eq!(renders.get(), 3, "mount, remount, one change");
    }

    #[test]
    fn test_dropped_surface_goes_quiet() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let mut host = BindingHost::new(ctx.clone());
        let (probe, renders) = Probe::new(vec![ConfigKey::Random], false);

        host.mount(Rc::clone(&probe));
        host.mounted.clear();
        drop(probe);

        ctx.config.set_random(false);
        assert_eq!(renders.get(), 1, "weak callback does not fire after drop");
    }

    #[test]
    fn test_daemon_events_reach_watching_surfaces() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir);
        let mut host = BindingHost::new(ctx.clone());
        let (watching, watching_renders) = Probe::new(vec![], true);
        let (ignoring, ignoring_renders) = Probe::new(vec![], false);
        host.mount(watching);
        host.mount(ignoring);

        let (command_tx, _command_rx) = ipc_channel::ipc::channel().unwrap();
        let (_event_tx, event_rx) = std::sync::mpsc::channel();
        ctx.daemon
            .attach(command_tx, event_rx, Default::default());

        assert_eq!(watching_renders.get(), 2, "attach fanout re-rendered");
        assert_eq!(ignoring_renders.get(), 1);
    }

    #[test]
    fn test_tick_all_reaches_every_surface() {
        let dir = TempDir::new().unwrap();
        let mut host = BindingHost::new(test_ctx(&dir));
        let (probe, _renders) = Probe::new(vec![], false);
        let ticks = Rc::clone(&probe.borrow().ticks);
        host.mount(probe);

        host.tick_all();
        host.tick_all();
        assert_eq!(ticks.get(), 2);
    }
}
