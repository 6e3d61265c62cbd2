use crate::service::errors::ServiceError;
use anyhow::{bail, Result};
use log::debug;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub const INIT_DIR: &str = "/etc/init.d";
pub const SYSTEMD_DIR: &str = "/usr/lib/systemd/system";

/// Operating system family the process runs on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Platform {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn is_windows(&self) -> bool {
        *self == Platform::Windows
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::current()
    }
}

/// Where service definitions live on a Linux host
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub init_dir: PathBuf,
    pub systemd_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            init_dir: PathBuf::from(INIT_DIR),
            systemd_dir: PathBuf::from(SYSTEMD_DIR),
        }
    }
}

impl Layout {
    /// Layout rooted somewhere else than `/`
    pub fn under<P: AsRef<Path>>(root: P) -> Layout {
        let root = root.as_ref();
        Layout {
            init_dir: root.join(INIT_DIR.trim_start_matches('/')),
            systemd_dir: root.join(SYSTEMD_DIR.trim_start_matches('/')),
        }
    }

    pub fn init_script<S: AsRef<str>>(&self, name: S) -> PathBuf {
        self.init_dir.join(name.as_ref())
    }

    pub fn unit_file<S: AsRef<str>>(&self, name: S) -> PathBuf {
        self.systemd_dir.join(format!("{}.service", name.as_ref()))
    }
}

/// Service mechanism selected for one install or remove call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MechanismChoice {
    WindowsScm,
    Systemd,
    SysVInit,
}

impl fmt::Display for MechanismChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MechanismChoice::WindowsScm => "windows-scm",
            MechanismChoice::Systemd => "systemd",
            MechanismChoice::SysVInit => "sysvinit",
        };
        f.write_str(name)
    }
}

/// Picks the mechanism for this host. Never cached, the host is probed on every call.
pub async fn detect(platform: Platform, layout: &Layout) -> Result<MechanismChoice> {
    if platform.is_windows() {
        return Ok(MechanismChoice::WindowsScm);
    }

    let choice = match tokio::fs::metadata(&layout.systemd_dir).await {
        Ok(_) => MechanismChoice::Systemd,
        Err(err) if err.kind() == io::ErrorKind::NotFound => MechanismChoice::SysVInit,
        Err(err) => bail!(ServiceError::detection_failure(
            layout.systemd_dir.display().to_string(),
            err.to_string()
        )),
    };

    debug!("detected service mechanism: {}", choice);
    Ok(choice)
}
