use crate::service::native;
use crate::service::{config, Runtime, ServiceManager};
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use tokio::sync::mpsc;

pub fn logger(level: log::LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "servman: {} ({}) {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}

#[cfg(unix)]
fn check_privileges() {
    if !nix::unistd::Uid::effective().is_root() {
        warn!("not running as root, writing service definitions will likely fail");
    }
}

#[cfg(not(unix))]
fn check_privileges() {}

pub async fn install<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let descriptor = config::load(path)
        .with_context(|| format!("failed to load service config {}", path.display()))?;

    check_privileges();
    let manager = ServiceManager::local(native::local());
    let choice = manager.install(&descriptor).await?;
    println!("installed '{}' ({})", descriptor.name, choice);
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    check_privileges();
    let manager = ServiceManager::local(native::local());
    let choice = manager.remove(name).await?;
    println!("removed '{}' ({})", name, choice);
    Ok(())
}

pub async fn detect() -> Result<()> {
    let manager = ServiceManager::local(native::local());
    let choice = manager.detect().await?;
    println!("{}", choice);
    Ok(())
}

/// Run this process as a service until the host asks it to stop
pub async fn run() -> Result<()> {
    let runtime = Runtime::local(native::local());
    let (tx, mut rx) = mpsc::unbounded_channel();

    runtime.on("*", |event| match event.name() {
        Some(name) => info!("service control: {} {:?}", name, event.sub_type),
        None => info!("service control: unknown code {:#06x}", event.raw.code),
    })?;
    runtime.run(move || {
        let _ = tx.send(());
    })?;

    info!("running as a service, waiting for a stop request");
    rx.recv().await;
    runtime.stop(0);
    Ok(())
}
