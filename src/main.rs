// src/main.rs

use anyhow::{bail, Context, Result};
use fuser::mount2;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use magicfolder::core::Identity;
use magicfolder::{Courier, FolderState, MagicDrive};

fn print_usage(progname: &str) {
    eprintln!("Usage: {} <mountpoint> [--rescan]", progname);
    eprintln!();
    eprintln!("MagicFolder - A self-organizing overlay filesystem");
    eprintln!("Files written to the mount point will 'vanish' from the listing");
    eprintln!("and be queued for automatic classification.");
    eprintln!();
    eprintln!("Backing store: ~/.magicFolder/raw");
    eprintln!("  --rescan    enqueue existing backing-store files at startup");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mut mountpoint: Option<PathBuf> = None;
    let mut rescan = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "--rescan" => rescan = true,
            other if mountpoint.is_none() => mountpoint = Some(PathBuf::from(other)),
            other => {
                print_usage(&args[0]);
                bail!("unexpected argument: {}", other);
            }
        }
    }
    let Some(mountpoint) = mountpoint else {
        print_usage(&args[0]);
        bail!("missing mountpoint");
    };

    let home = env::var("HOME").context("HOME environment variable not set")?;
    let backing_store = PathBuf::from(home).join(".magicFolder").join("raw");
    std::fs::create_dir_all(&backing_store).with_context(|| {
        format!("creating backing store {}", backing_store.display())
    })?;
    tracing::info!(
        "[MagicFolder] Backing store created/verified: {}",
        backing_store.display()
    );

    // A mount point nested with the backing store would let the overlay
    // observe its own writes.
    FolderState::check_no_feedback(&backing_store, &mountpoint)?;

    let identity = Identity::capture();
    let state = FolderState::new(backing_store, identity);
    tracing::info!("[MagicFolder] State initialized");

    if rescan {
        let enqueued = state.rescan_backing_store()?;
        tracing::info!("[MagicFolder] Rescan enqueued {} existing files", enqueued);
    }

    let mut courier = Courier::new(Arc::clone(&state))?;
    courier.start();
    tracing::info!("[MagicFolder] Courier started");

    let drive = MagicDrive::new(Arc::clone(&state));
    tracing::info!(
        "[MagicFolder] Mounting at {} ...",
        mountpoint.display()
    );

    let mount_result = mount2(drive, &mountpoint, &identity.get_mount_options());

    state.begin_shutdown();
    courier.stop();
    tracing::info!("[MagicFolder] Shut down");

    mount_result.context("FUSE mount failed")?;
    Ok(())
}
