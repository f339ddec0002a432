// SPDX-License-Identifier: GPL-3.0-only

//! Mountbar command-line front end
//!
//! Drives the engine for one operation per invocation: refresh the disk
//! state, resolve the requested volume or disk, run the operation and report
//! the outcome. Long-lived observation (menu rendering, OS notifications)
//! belongs to a UI shell, not here.

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use mountbar_engine::{
    CredentialStore, DriveManager, DriveState, EngineConfig, FileStore, MemoryCredentialStore,
    NetworkShareManager, PreferenceStore, RefreshReason,
};
use mountbar_sys::SystemShell;
use mountbar_types::{AlertInteraction, ManagedVolumeInfo, NetworkShare, PhysicalDisk, Volume};

#[derive(Parser)]
#[command(name = "mountbar", version, about = "External disk and SMB share manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List disks and volumes
    List,

    /// Mount a volume by device identifier, UUID or name
    Mount { volume: String },

    /// Unmount a volume by device identifier, UUID or name
    Unmount { volume: String },

    /// Eject a whole disk
    Eject {
        disk: String,
        #[arg(long)]
        force: bool,
    },

    /// Unlock and mount an encrypted APFS volume; the passphrase is read
    /// from stdin
    Unlock { volume: String },

    /// Unmount every unprotected user volume on external disks
    UnmountAll,

    /// Manage the persisted ignored/protected/blocked sets and flags
    Prefs {
        #[command(subcommand)]
        command: PrefCommand,
    },

    /// Manage SMB network shares
    Shares {
        #[command(subcommand)]
        command: ShareCommand,
    },
}

#[derive(Subcommand)]
enum PrefCommand {
    /// Print all persisted sets and flags
    Show,

    /// Exclude a volume from bulk unmount/eject
    Protect { volume: String },
    Unprotect { volume: String },

    /// Hide a volume from the published state
    Ignore { volume: String },
    Unignore { volume: String },

    /// Hide every volume of a disk
    IgnoreDisk { disk: String },

    /// Deny auto-mount for a volume
    Block { volume: String },
    Unblock { volume: String },

    /// Include built-in disks in the published state
    ShowInternal { value: bool },

    /// Block auto-mount for all USB disks
    BlockUsb { value: bool },
}

#[derive(Subcommand)]
enum ShareCommand {
    /// List configured shares and their live mount status
    List,

    /// Add or replace a share configuration
    Add {
        name: String,
        server: String,
        share_path: String,
        username: String,
        /// Session-only; passwords are not persisted by the CLI
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        mount_point: Option<String>,
        /// Do not mount this share automatically at login
        #[arg(long)]
        no_login_mount: bool,
    },

    Remove { id: Uuid },

    Mount {
        id: Uuid,
        #[arg(long)]
        password: Option<String>,
    },

    Unmount { id: Uuid },

    /// Mount every share flagged mount-at-login
    MountLogin,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mountbar=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Mountbar v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let shell = Arc::new(SystemShell::new());
    let prefs = PreferenceStore::load(Box::new(
        FileStore::new(config_dir()?).context("could not open the configuration directory")?,
    ));

    match cli.command {
        Command::Shares { command } => {
            let prefs = Arc::new(RwLock::new(prefs));
            let creds: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
            let shares = NetworkShareManager::new(shell, prefs, creds.clone())?;
            run_share_command(command, &shares, creds.as_ref()).await
        }
        command => {
            let manager = DriveManager::spawn(shell, prefs, EngineConfig::default());
            run_disk_command(command, &manager).await
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config").join("mountbar"))
}

async fn run_disk_command(command: Command, manager: &DriveManager) -> Result<()> {
    let state = load_state(manager).await?;

    match command {
        Command::List => print_disks(&state.disks),
        Command::Mount { volume } => {
            let volume = find_volume(&state, &volume)?;
            manager.mount(&volume).await;
            report_outcome(manager, &format!("Mounted '{}'", volume.name))?;
        }
        Command::Unmount { volume } => {
            let volume = find_volume(&state, &volume)?;
            manager.unmount(&volume).await;
            report_outcome(manager, &format!("Unmounted '{}'", volume.name))?;
        }
        Command::Eject { disk, force } => {
            let disk = find_disk(&state, &disk)?;
            manager.eject(&disk, force).await;
            let name = disk.name.as_deref().unwrap_or(&disk.id);
            report_outcome(manager, &format!("Ejected '{name}'"))?;
        }
        Command::Unlock { volume } => {
            let volume = find_volume(&state, &volume)?;
            let passphrase = read_passphrase()?;
            manager.mount_locked(&volume, &passphrase).await;
            report_outcome(manager, &format!("Unlocked '{}'", volume.name))?;
        }
        Command::UnmountAll => {
            manager.unmount_all().await;
            report_outcome(manager, "Unmounted all external volumes")?;
        }
        Command::Prefs { command } => run_pref_command(command, &state, manager)?,
        Command::Shares { .. } => unreachable!("handled in main"),
    }
    Ok(())
}

fn run_pref_command(
    command: PrefCommand,
    state: &DriveState,
    manager: &DriveManager,
) -> Result<()> {
    let mut prefs = manager.prefs().write().unwrap();

    match command {
        PrefCommand::Show => {
            println!("show internal disks: {}", prefs.show_internal_disks());
            println!("block USB auto-mount: {}", prefs.block_usb_auto_mount());
            for (label, list) in [
                ("protected", prefs.protected_volumes()),
                ("ignored", prefs.ignored_volumes()),
                ("blocked", prefs.blocked_volumes()),
            ] {
                println!("{label}:");
                for info in list {
                    println!("  {}  {}", info.composite_id(), info.name);
                }
            }
        }
        PrefCommand::Protect { volume } => prefs.protect(&find_volume(state, &volume)?)?,
        PrefCommand::Unprotect { volume } => {
            let info = find_managed(prefs.protected_volumes(), &volume)?;
            prefs.unprotect(&info)?;
        }
        PrefCommand::Ignore { volume } => prefs.ignore(&find_volume(state, &volume)?)?,
        PrefCommand::Unignore { volume } => {
            let info = find_managed(prefs.ignored_volumes(), &volume)?;
            prefs.unignore(&info)?;
        }
        PrefCommand::IgnoreDisk { disk } => prefs.ignore_disk(&find_disk(state, &disk)?)?,
        PrefCommand::Block { volume } => prefs.block(&find_volume(state, &volume)?)?,
        PrefCommand::Unblock { volume } => {
            let info = find_managed(prefs.blocked_volumes(), &volume)?;
            prefs.unblock(&info)?;
        }
        PrefCommand::ShowInternal { value } => prefs.set_show_internal_disks(value)?,
        PrefCommand::BlockUsb { value } => prefs.set_block_usb_auto_mount(value)?,
    }
    Ok(())
}

/// Un-* commands work against the persisted record: the volume may well be
/// disconnected (or hidden, for the ignored set) right now.
fn find_managed(list: &[ManagedVolumeInfo], query: &str) -> Result<ManagedVolumeInfo> {
    list.iter()
        .find(|info| {
            info.volume_uuid == query
                || info.composite_id() == query
                || info.name.eq_ignore_ascii_case(query)
        })
        .cloned()
        .with_context(|| format!("no persisted record matches '{query}'"))
}

async fn run_share_command(
    command: ShareCommand,
    shares: &NetworkShareManager,
    creds: &dyn CredentialStore,
) -> Result<()> {
    match command {
        ShareCommand::List => {
            let mounted = shares.mounted_share_ids().await?;
            for share in shares.shares() {
                let status = if mounted.contains(&share.id) {
                    "mounted"
                } else {
                    "not mounted"
                };
                println!(
                    "{}  {}  //{}@{}/{}  [{status}]",
                    share.id, share.name, share.username, share.server, share.share_path
                );
            }
        }
        ShareCommand::Add {
            name,
            server,
            share_path,
            username,
            password,
            mount_point,
            no_login_mount,
        } => {
            let mut share = NetworkShare::new(&name, &server, &share_path, &username);
            share.mount_at_login = !no_login_mount;
            share.custom_mount_point = mount_point;
            let id = share.id;
            shares.save_share(share, password.as_deref())?;
            println!("Added share {id}");
        }
        ShareCommand::Remove { id } => {
            shares.remove_share(id)?;
            println!("Removed share {id}");
        }
        ShareCommand::Mount { id, password } => {
            if let Some(password) = password {
                creds.save(&id.to_string(), &password)?;
            }
            shares.mount_share(id).await?;
            println!("Share mounted");
        }
        ShareCommand::Unmount { id } => {
            shares.unmount_share(id).await?;
            println!("Share unmounted");
        }
        ShareCommand::MountLogin => shares.mount_all_login_shares().await,
    }
    Ok(())
}

/// Trigger the startup refresh and wait for the first complete snapshot.
async fn load_state(manager: &DriveManager) -> Result<DriveState> {
    let mut rx = manager.subscribe();
    manager.refresh(RefreshReason::Startup);

    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if rx.borrow().initial_load_complete {
                return Ok::<_, anyhow::Error>(rx.borrow().clone());
            }
            rx.changed().await?;
        }
    })
    .await
    .context("timed out waiting for the disk list")?
    .context("engine stopped before the first refresh")
}

/// Print the alert the operation produced, if any; otherwise the success
/// message.
fn report_outcome(manager: &DriveManager, success: &str) -> Result<()> {
    let state = manager.subscribe().borrow().clone();
    match state.alert {
        Some(alert) => {
            eprintln!("{}", alert.title);
            eprintln!("{}", alert.message);
            if alert.interaction == AlertInteraction::UnlockPrompt {
                eprintln!("Run 'mountbar unlock <volume>' to provide the passphrase.");
            }
            bail!("operation failed");
        }
        None => {
            println!("{success}");
            Ok(())
        }
    }
}

fn read_passphrase() -> Result<String> {
    let mut passphrase = String::new();
    std::io::stdin()
        .read_to_string(&mut passphrase)
        .context("could not read the passphrase from stdin")?;
    let passphrase = passphrase.trim_end_matches(['\r', '\n']).to_string();
    if passphrase.is_empty() {
        bail!("empty passphrase");
    }
    Ok(passphrase)
}

fn find_volume(state: &DriveState, query: &str) -> Result<Volume> {
    let matches: Vec<&Volume> = state
        .disks
        .iter()
        .flat_map(|d| d.all_volumes())
        .filter(|v| {
            v.device_identifier == query
                || v.id == query
                || v.name.eq_ignore_ascii_case(query)
        })
        .collect();

    match matches.as_slice() {
        [] => bail!("no volume matches '{query}'"),
        [volume] => Ok((*volume).clone()),
        _ => bail!("'{query}' is ambiguous; use the device identifier"),
    }
}

fn find_disk(state: &DriveState, query: &str) -> Result<PhysicalDisk> {
    state
        .disks
        .iter()
        .find(|d| d.id == query || d.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(query)))
        .cloned()
        .with_context(|| format!("no disk matches '{query}'"))
}

fn print_disks(disks: &[PhysicalDisk]) {
    if disks.is_empty() {
        println!("No external disks.");
        return;
    }

    for disk in disks {
        let name = disk.name.as_deref().unwrap_or("(unnamed)");
        let usage = disk
            .stats
            .usage_percentage
            .map(|p| format!(", {:.0}% used", p * 100.0))
            .unwrap_or_default();
        println!("{}  {name}  [{}{usage}]", disk.id, disk.connection_type);

        for volume in disk.all_volumes() {
            let status = if volume.is_mounted {
                volume.mount_point.as_deref().unwrap_or("mounted")
            } else {
                "not mounted"
            };
            let size = volume.total_size.as_deref().unwrap_or("-");
            println!(
                "  {}  {}  {}  {}",
                volume.device_identifier, volume.name, size, status
            );
        }
    }
}
