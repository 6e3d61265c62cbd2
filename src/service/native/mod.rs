use crate::service::control::RawControl;
use crate::service::errors::ServiceError;
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(windows)]
mod scm;

#[cfg(windows)]
pub use scm::ScmBinding;

/// Channel the binding pushes SCM control requests into
pub type ControlSender = mpsc::UnboundedSender<RawControl>;

/// Arguments for registering a service with the SCM
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub name: String,
    pub display_name: String,
    /// every token quoted, joined by spaces
    pub command_line: String,
    /// first token of the command line, unquoted
    pub executable: String,
    /// remaining tokens of the command line, unquoted
    pub arguments: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// NUL separated and double NUL terminated, empty when there are none
    pub dependencies: String,
}

/// The native Service Control Manager integration.
///
/// This is the only place that talks to the SCM. The rest of the crate
/// treats it as a black box, tests substitute a fake.
pub trait NativeBinding: Send + Sync {
    /// register a new service
    fn add(&self, registration: &Registration) -> Result<()>;

    /// delete a registered service
    fn remove(&self, name: &str) -> Result<()>;

    /// start the service dispatcher; control requests are delivered on `controls`
    fn run(&self, controls: ControlSender) -> Result<()>;

    /// report the final exit code to the SCM
    fn stop(&self, code: i32) -> Result<()>;

    fn set_state(&self, state: u32) -> Result<()>;

    fn get_state(&self) -> Result<u32>;

    fn set_controls_accepted(&self, mask: u32) -> Result<()>;

    fn is_stop_requested(&self) -> bool;
}

/// Binding of the host: the SCM on Windows, [`Unavailable`] elsewhere
#[cfg(windows)]
pub fn local() -> Arc<dyn NativeBinding> {
    Arc::new(ScmBinding::new())
}

/// Binding of the host: the SCM on Windows, [`Unavailable`] elsewhere
#[cfg(not(windows))]
pub fn local() -> Arc<dyn NativeBinding> {
    Arc::new(Unavailable)
}

/// Binding used where there is no SCM. Every operation fails.
#[derive(Clone, Debug, Default)]
pub struct Unavailable;

impl Unavailable {
    fn fail<T>(&self, op: &str) -> Result<T> {
        bail!(ServiceError::native_binding_failure(format!(
            "{}: no native service binding available on this host",
            op
        )))
    }
}

impl NativeBinding for Unavailable {
    fn add(&self, _registration: &Registration) -> Result<()> {
        self.fail("add")
    }

    fn remove(&self, _name: &str) -> Result<()> {
        self.fail("remove")
    }

    fn run(&self, _controls: ControlSender) -> Result<()> {
        self.fail("run")
    }

    fn stop(&self, _code: i32) -> Result<()> {
        self.fail("stop")
    }

    fn set_state(&self, _state: u32) -> Result<()> {
        self.fail("set_state")
    }

    fn get_state(&self) -> Result<u32> {
        self.fail("get_state")
    }

    fn set_controls_accepted(&self, _mask: u32) -> Result<()> {
        self.fail("set_controls_accepted")
    }

    fn is_stop_requested(&self) -> bool {
        false
    }
}
