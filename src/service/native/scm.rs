//! Service Control Manager binding built on `windows-service`.
//!
//! The dispatcher blocks its thread for as long as the service lives, so
//! [`ScmBinding::run`] starts it on a dedicated thread. Control requests are
//! forwarded to the runtime through the control channel; the process reports
//! its state through the status handle registered by `service_main`.

use super::{ControlSender, NativeBinding, Registration};
use crate::service::control::{Control, RawControl};
use crate::service::errors::ServiceError;
use crate::service::state::RunState;
use anyhow::{bail, Result};
use log::{debug, error};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use windows_service::service::{
    ServiceAccess, ServiceControl, ServiceControlAccept, ServiceDependency, ServiceErrorControl,
    ServiceExitCode, ServiceInfo, ServiceStartType, ServiceState, ServiceStatus, ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};
use windows_service::{define_windows_service, service_dispatcher};

/// Own process services ignore the name in the dispatch table
const SERVICE_NAME: &str = "";

const WAIT_HINT: Duration = Duration::from_secs(10);

/// Handed from `run` to `service_main`, which the dispatcher calls without arguments
static DISPATCH: Mutex<Option<Dispatch>> = Mutex::new(None);

struct Dispatch {
    shared: Arc<Shared>,
    controls: ControlSender,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn failure(call: &str, err: windows_service::Error) -> ServiceError {
    ServiceError::native_binding_failure(format!("{}() failed: {}", call, err))
}

fn service_state(state: RunState) -> ServiceState {
    match state {
        RunState::Stopped => ServiceState::Stopped,
        RunState::StartPending => ServiceState::StartPending,
        RunState::StopPending => ServiceState::StopPending,
        RunState::Running => ServiceState::Running,
        RunState::ContinuePending => ServiceState::ContinuePending,
        RunState::PausePending => ServiceState::PausePending,
        RunState::Paused => ServiceState::Paused,
    }
}

/// Stop and shutdown are always accepted on top of `mask`
fn accepted_mask(mask: u32) -> u32 {
    mask | Control::Stop.accept_flag() | Control::Shutdown.accept_flag()
}

fn exit_code(code: i32) -> ServiceExitCode {
    match code {
        0 => ServiceExitCode::Win32(0),
        code => ServiceExitCode::ServiceSpecific(code as u32),
    }
}

/// Wire form of a control, `None` for controls without a name here
#[allow(unreachable_patterns)]
fn raw_control(control: &ServiceControl) -> Option<RawControl> {
    let (control, event_type) = match control {
        ServiceControl::Stop => (Control::Stop, 0),
        ServiceControl::Pause => (Control::Pause, 0),
        ServiceControl::Continue => (Control::Continue, 0),
        ServiceControl::Interrogate => (Control::Interrogate, 0),
        ServiceControl::Shutdown => (Control::Shutdown, 0),
        ServiceControl::ParamChange => (Control::ParamChange, 0),
        ServiceControl::NetBindAdd => (Control::NetBindAdd, 0),
        ServiceControl::NetBindRemove => (Control::NetBindRemove, 0),
        ServiceControl::NetBindEnable => (Control::NetBindEnable, 0),
        ServiceControl::NetBindDisable => (Control::NetBindDisable, 0),
        ServiceControl::HardwareProfileChange(_) => (Control::HardwareProfileChange, 0),
        ServiceControl::PowerEvent(_) => (Control::PowerEvent, 0),
        ServiceControl::SessionChange(param) => (Control::SessionChange, param.reason as u32),
        ServiceControl::Preshutdown => (Control::PreShutdown, 0),
        ServiceControl::TimeChange => (Control::TimeChange, 0),
        ServiceControl::TriggerEvent => (Control::TriggerEvent, 0),
        _ => return None,
    };

    Some(RawControl::new(control.code(), event_type))
}

struct Status {
    handle: Option<ServiceStatusHandle>,
    state: RunState,
    accepted: u32,
}

struct Shared {
    status: Mutex<Status>,
    stop_requested: AtomicBool,
    finished: Mutex<bool>,
    finish: Condvar,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            status: Mutex::new(Status {
                handle: None,
                state: RunState::Stopped,
                accepted: 0,
            }),
            stop_requested: AtomicBool::new(false),
            finished: Mutex::new(false),
            finish: Condvar::new(),
        }
    }

    /// Records the state and reports it once the status handle is registered
    fn set_status(&self, state: RunState, code: i32, accepted: Option<u32>) -> Result<()> {
        let mut status = lock(&self.status);
        status.state = state;
        if let Some(mask) = accepted {
            status.accepted = mask;
        }

        let handle = match &status.handle {
            Some(handle) => handle,
            None => return Ok(()),
        };

        handle
            .set_service_status(ServiceStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state: service_state(state),
                controls_accepted: ServiceControlAccept::from_bits_truncate(accepted_mask(
                    status.accepted,
                )),
                exit_code: exit_code(code),
                checkpoint: 0,
                wait_hint: WAIT_HINT,
                process_id: None,
            })
            .map_err(|err| failure("SetServiceStatus", err))?;

        Ok(())
    }

    fn report(&self, state: RunState) {
        if let Err(err) = self.set_status(state, 0, None) {
            error!("failed to report service state {}: {:#}", state, err);
        }
    }

    fn handle(
        &self,
        control: ServiceControl,
        controls: &ControlSender,
    ) -> ServiceControlHandlerResult {
        let raw = match raw_control(&control) {
            Some(raw) => raw,
            None => return ServiceControlHandlerResult::NotImplemented,
        };

        match Control::from_code(raw.code) {
            Some(Control::Stop) | Some(Control::Shutdown) => {
                self.report(RunState::StopPending);
                self.stop_requested.store(true, Ordering::SeqCst);
            }
            Some(Control::Pause) => self.report(RunState::PausePending),
            Some(Control::Continue) => self.report(RunState::ContinuePending),
            _ => {}
        }

        if controls.send(raw).is_err() {
            debug!("service runtime is gone, control {:#06x} dropped", raw.code);
        }

        ServiceControlHandlerResult::NoError
    }

    fn wait_finished(&self) {
        let mut finished = lock(&self.finished);
        while !*finished {
            finished = match self.finish.wait(finished) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    fn mark_finished(&self) {
        *lock(&self.finished) = true;
        self.finish.notify_all();
    }
}

define_windows_service!(ffi_service_main, service_main);

fn service_main(_arguments: Vec<OsString>) {
    let Dispatch { shared, controls } = match lock(&DISPATCH).take() {
        Some(dispatch) => dispatch,
        None => {
            error!("service started without a control channel");
            return;
        }
    };

    let handler = Arc::clone(&shared);
    let sender = controls.clone();
    let handle = match service_control_handler::register(SERVICE_NAME, move |control| {
        handler.handle(control, &sender)
    }) {
        Ok(handle) => handle,
        Err(err) => {
            error!("{}", failure("RegisterServiceCtrlHandlerEx", err));
            return;
        }
    };

    lock(&shared.status).handle = Some(handle);
    shared.report(RunState::Running);
    if controls.send(RawControl::new(Control::Start.code(), 0)).is_err() {
        debug!("service runtime is gone before start");
    }

    // returning tells the dispatcher this service is done
    shared.wait_finished();
}

/// [`NativeBinding`] talking to the Service Control Manager of the local computer
pub struct ScmBinding {
    shared: Arc<Shared>,
}

impl ScmBinding {
    pub fn new() -> ScmBinding {
        ScmBinding {
            shared: Arc::new(Shared::new()),
        }
    }
}

impl Default for ScmBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBinding for ScmBinding {
    fn add(&self, registration: &Registration) -> Result<()> {
        let manager = ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )
        .map_err(|err| failure("OpenSCManager", err))?;

        let dependencies = registration
            .dependencies
            .split('\0')
            .filter(|name| !name.is_empty())
            .map(|name| ServiceDependency::Service(OsString::from(name)))
            .collect();

        let info = ServiceInfo {
            name: OsString::from(&registration.name),
            display_name: OsString::from(&registration.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::AutoStart,
            error_control: ServiceErrorControl::Normal,
            executable_path: PathBuf::from(&registration.executable),
            launch_arguments: registration.arguments.iter().map(OsString::from).collect(),
            dependencies,
            account_name: registration.username.as_ref().map(OsString::from),
            account_password: registration.password.as_ref().map(OsString::from),
        };

        manager
            .create_service(&info, ServiceAccess::QUERY_STATUS)
            .map_err(|err| failure("CreateService", err))?;

        debug!("created service '{}'", registration.name);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
            .map_err(|err| failure("OpenSCManager", err))?;
        let service = manager
            .open_service(name, ServiceAccess::DELETE)
            .map_err(|err| failure("OpenService", err))?;
        service
            .delete()
            .map_err(|err| failure("DeleteService", err))?;

        debug!("deleted service '{}'", name);
        Ok(())
    }

    fn run(&self, controls: ControlSender) -> Result<()> {
        *lock(&DISPATCH) = Some(Dispatch {
            shared: Arc::clone(&self.shared),
            controls,
        });

        let spawned = thread::Builder::new()
            .name("service-dispatcher".into())
            .spawn(|| {
                if let Err(err) = service_dispatcher::start(SERVICE_NAME, ffi_service_main) {
                    error!("{}", failure("StartServiceCtrlDispatcher", err));
                }
            });

        if let Err(err) = spawned {
            lock(&DISPATCH).take();
            bail!(ServiceError::native_binding_failure(format!(
                "CreateThread() failed: {}",
                err
            )));
        }

        Ok(())
    }

    fn stop(&self, code: i32) -> Result<()> {
        self.shared.report(RunState::StopPending);
        self.shared.mark_finished();
        self.shared.set_status(RunState::Stopped, code, None)
    }

    fn set_state(&self, state: u32) -> Result<()> {
        let state = match RunState::from_code(state) {
            Some(state) => state,
            None => bail!(ServiceError::native_binding_failure(format!(
                "SetServiceStatus() failed: unknown state {}",
                state
            ))),
        };

        self.shared.set_status(state, 0, None)
    }

    fn get_state(&self) -> Result<u32> {
        Ok(lock(&self.shared.status).state.code())
    }

    fn set_controls_accepted(&self, mask: u32) -> Result<()> {
        self.shared.set_status(RunState::Running, 0, Some(mask))
    }

    /// Reading the request clears it
    fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested.swap(false, Ordering::SeqCst)
    }
}
