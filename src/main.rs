#![deny(unsafe_code)]

mod app;
mod config;
mod constants;
mod daemon;
mod keybindings;
mod ui;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

use crate::app::Applet;
use crate::config::ConfigStore;
use crate::keybindings::backend;
use crate::keybindings::{EvdevBackend, KeybindingManager, ShortcutNamespace};
use crate::ui::AppContext;

#[derive(Parser)]
#[command(name = "wallshift")]
#[command(version)]
#[command(about = "Wallpaper rotation panel applet", long_about = None)]
struct Cli {
    /// Settings file path (defaults to the XDG config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Rebind a shortcut slot and exit, e.g. --bind next-wallpaper '<Control><Alt>n'
    /// (an empty accelerator clears the slot)
    #[arg(long, num_args = 2, value_names = ["ACTION", "ACCELERATOR"])]
    bind: Option<Vec<String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        TraceLevel::DEBUG
    } else {
        TraceLevel::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))?;
    }

    let config_path = cli.config.unwrap_or_else(ConfigStore::default_path);
    let ctx = AppContext::new(config_path)?;

    if let Some(pair) = cli.bind {
        return rebind(&ctx, &pair);
    }

    if !backend::check_permissions() {
        backend::print_permission_error();
    }
    let (evdev, presses) = EvdevBackend::new();
    let keybindings = KeybindingManager::new(
        ctx.config.clone(),
        Box::new(evdev),
        ShortcutNamespace::load_system(),
        presses,
    );

    let mut applet = Applet::new(ctx, keybindings);
    applet.launch_daemon();
    applet.run(&shutdown);
    applet.shutdown();

    Ok(())
}

/// Handle `--bind`: conflict-check the accelerator against the other slot
/// and the system shortcut namespaces, then persist it.
fn rebind(ctx: &AppContext, pair: &[String]) -> Result<()> {
    let action = config::KeybindingAction::from_name(&pair[0])
        .ok_or_else(|| anyhow::anyhow!("Unknown shortcut slot '{}'", pair[0]))?;

    // Detection-only: a stub press channel, no evdev grabs
    let (_press_tx, press_rx) = std::sync::mpsc::channel();
    let mut manager = KeybindingManager::new(
        ctx.config.clone(),
        Box::new(NullBackend),
        ShortcutNamespace::load_system(),
        press_rx,
    );

    manager.set_accelerator(action, &pair[1])?;
    println!("Bound {} to '{}'", action, pair[1]);
    Ok(())
}

/// Backend that grabs nothing, for one-shot configuration commands.
struct NullBackend;

impl crate::keybindings::ShortcutBackend for NullBackend {
    fn grab(
        &mut self,
        _action: config::KeybindingAction,
        _accel: &crate::keybindings::Accelerator,
    ) -> Result<()> {
        Ok(())
    }

    fn release(&mut self, _action: config::KeybindingAction) -> Result<()> {
        Ok(())
    }
}
