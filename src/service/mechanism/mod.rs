//! One implementation per service mechanism.
//!
//! A mechanism knows how to register a service with its host and how to take
//! the registration away again. [`crate::service::ServiceManager`] picks one per call.

mod scm;
mod systemd;
mod sysv;

pub use scm::WindowsScm;
pub use systemd::Systemd;
pub use sysv::SysVInit;

use crate::manager::RunError;
use crate::service::config::ServiceDescriptor;
use crate::service::detect::Layout;
use crate::service::errors::ServiceError;
use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::Path;
use tokio::fs;

/// Mode of written service definitions (rwxr-xr-x)
pub const DEFINITION_MODE: u32 = 0o755;

#[async_trait]
pub trait Mechanism: Send + Sync {
    /// write or register the service definition and enable it
    async fn install(&self, descriptor: &ServiceDescriptor) -> Result<()>;

    /// disable the service and delete its definition
    async fn remove(&self, name: &str) -> Result<()>;
}

fn quote<S: AsRef<str>>(s: S) -> String {
    format!("\"{}\"", s.as_ref())
}

/// Command line that starts the service.
///
/// Arguments are always quoted, the interpreter and program paths only when
/// `quote_paths` is set.
pub(crate) fn command_line(descriptor: &ServiceDescriptor, quote_paths: bool) -> String {
    let path = |p: &str| {
        if quote_paths {
            quote(p)
        } else {
            p.to_string()
        }
    };

    let mut tokens: Vec<String> = Vec::new();
    if let Some(interpreter) = &descriptor.interpreter {
        tokens.push(path(interpreter.as_str()));
        tokens.extend(descriptor.interpreter_args.iter().map(quote));
    }
    tokens.push(path(descriptor.program.as_str()));
    tokens.extend(descriptor.program_args.iter().map(quote));

    tokens.join(" ")
}

/// Maps a failed tool run to the error taxonomy
pub(crate) fn tool_error(tool: &str, err: RunError) -> ServiceError {
    match err {
        RunError::NotFound => ServiceError::external_tool_missing(tool),
        err => ServiceError::external_tool_failure(tool, err.to_string()),
    }
}

pub(crate) async fn write_definition(path: &Path, content: &str) -> Result<()> {
    let fail = |err: io::Error| {
        ServiceError::write_failure(path.display().to_string(), err.to_string())
    };

    fs::write(path, content).await.map_err(fail)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(DEFINITION_MODE))
            .await
            .map_err(fail)?;
    }

    debug!("wrote service definition {}", path.display());
    Ok(())
}

/// Deletes the init script of `name`, or its unit file when there is no init script.
///
/// A missing init script is not an error, a missing unit file after that is.
pub(crate) async fn remove_definition(layout: &Layout, name: &str) -> Result<()> {
    let init = layout.init_script(name);
    match fs::remove_file(&init).await {
        Ok(_) => {
            debug!("removed {}", init.display());
            return Ok(());
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist, trying the unit file", init.display());
        }
        Err(err) => bail!(ServiceError::remove_failure(
            init.display().to_string(),
            err.to_string()
        )),
    }

    let unit = layout.unit_file(name);
    if let Err(err) = fs::remove_file(&unit).await {
        bail!(ServiceError::remove_failure(
            unit.display().to_string(),
            err.to_string()
        ));
    }

    debug!("removed {}", unit.display());
    Ok(())
}
