use crate::service::control::{AcceptedControls, Control, ControlEvent, RawControl};
use crate::service::detect::Platform;
use crate::service::native::NativeBinding;
use crate::service::state::RunState;
use crate::service::types::{Published, Watcher};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Delay between a stop control and the stop callback
pub const STOP_CALLBACK_DELAY: Duration = Duration::from_secs(1);

/// Listener name that receives every control event
pub const WILDCARD: &str = "*";

pub type Listener = Arc<dyn Fn(&ControlEvent) + Send + Sync>;
pub type StopCallback = Arc<dyn Fn() + Send + Sync>;
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

fn exit_process(code: i32) {
    std::process::exit(code)
}

struct Inner {
    /// set once the signal handlers or the SCM dispatcher are in place
    initialized: bool,
    accepted: AcceptedControls,
    listeners: HashMap<String, Vec<Listener>>,
    stop_callback: Option<StopCallback>,
    /// last state pushed to the SCM
    state: Published<Option<RunState>>,
}

/// Process wide state of a program running as a service.
///
/// The runtime goes from uninitialized to initialized exactly once, on the
/// first [`Runtime::run`], and ends when the process exits through
/// [`Runtime::stop`]. Clones share the same state.
#[derive(Clone)]
pub struct Runtime {
    platform: Platform,
    binding: Arc<dyn NativeBinding>,
    exit: ExitHook,
    inner: Arc<Mutex<Inner>>,
}

impl Runtime {
    pub fn new(platform: Platform, binding: Arc<dyn NativeBinding>) -> Self {
        Self {
            platform,
            binding,
            exit: Arc::new(exit_process),
            inner: Arc::new(Mutex::new(Inner {
                initialized: false,
                accepted: AcceptedControls::default(),
                listeners: HashMap::new(),
                stop_callback: None,
                state: Published::new(None),
            })),
        }
    }

    pub fn local(binding: Arc<dyn NativeBinding>) -> Self {
        Self::new(Platform::current(), binding)
    }

    /// Replace the way the process terminates
    pub fn with_exit<F>(mut self, exit: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.exit = Arc::new(exit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // listeners run outside the lock, a poisoned lock still holds consistent state
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn accepted_controls(&self) -> AcceptedControls {
        self.lock().accepted
    }

    /// Start running as a service.
    ///
    /// The first call installs the SIGINT/SIGTERM handlers, or on Windows
    /// starts the SCM dispatcher and accepts the stop control. Later calls
    /// only replace `stop_callback`. Must be called from within a tokio runtime.
    pub fn run<F>(&self, stop_callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.stop_callback = Some(Arc::new(stop_callback));
        if inner.initialized {
            debug!("service runtime already initialized, stop callback replaced");
            return Ok(());
        }

        if self.platform.is_windows() {
            let (tx, rx) = mpsc::unbounded_channel();
            self.binding
                .run(tx)
                .context("failed to start service dispatcher")?;
            tokio::spawn(self.clone().dispatcher(rx));
            inner.accepted.insert(Control::Stop);
        } else {
            self.watch_signals()?;
        }

        inner.initialized = true;
        debug!("service runtime initialized");

        // masks are only pushed while holding the lock
        self.push_controls(inner.accepted.bits())
    }

    #[cfg(unix)]
    fn watch_signals(&self) -> Result<()> {
        use tokio::signal::unix;

        let mut term = unix::signal(unix::SignalKind::terminate())
            .context("failed to bind to SIGTERM")?;
        let mut int = unix::signal(unix::SignalKind::interrupt())
            .context("failed to bind to SIGINT")?;

        let runtime = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = term.recv() => debug!("SIGTERM received"),
                    _ = int.recv() => debug!("SIGINT received"),
                };

                runtime.call_stop_callback();
            }
        });

        Ok(())
    }

    #[cfg(not(unix))]
    fn watch_signals(&self) -> Result<()> {
        let runtime = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received");
                runtime.call_stop_callback();
            }
        });

        Ok(())
    }

    fn call_stop_callback(&self) {
        let callback = self.lock().stop_callback.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    async fn dispatcher(self, mut rx: mpsc::UnboundedReceiver<RawControl>) {
        while let Some(raw) = rx.recv().await {
            self.dispatch(raw);
        }

        debug!("service dispatcher closed");
    }

    /// Hands one control request to the listeners.
    ///
    /// Listeners registered for the control name are called first, then the
    /// wildcard listeners. Unknown codes only reach the wildcard listeners.
    /// Pause and continue then move the service to paused and running, stop
    /// schedules the stop callback.
    pub fn dispatch(&self, raw: RawControl) {
        let event = ControlEvent::from(raw);
        match event.control {
            Some(control) => debug!("service control received: {}", control),
            None => warn!("unknown service control code {:#06x}", raw.code),
        }

        let mut listeners: Vec<Listener> = Vec::new();
        {
            let inner = self.lock();
            if let Some(named) = event.name().and_then(|name| inner.listeners.get(name)) {
                listeners.extend(named.iter().cloned());
            }
            if let Some(wildcard) = inner.listeners.get(WILDCARD) {
                listeners.extend(wildcard.iter().cloned());
            }
        }

        for listener in listeners {
            listener(&event);
        }

        let control = match event.control {
            Some(control) => control,
            None => return,
        };

        if control == Control::Stop {
            self.schedule_stop();
        } else if let Some(state) = RunState::after_control(control) {
            if let Err(err) = self.set_state(state) {
                error!("failed to set service state to {}: {:#}", state, err);
            }
        }
    }

    fn schedule_stop(&self) {
        let callback = match self.lock().stop_callback.clone() {
            Some(callback) => callback,
            None => return,
        };

        tokio::spawn(async move {
            tokio::time::sleep(STOP_CALLBACK_DELAY).await;
            callback();
        });
    }

    /// Exit the process with `code`, telling the SCM first on Windows
    pub fn stop(&self, code: i32) {
        if self.platform.is_windows() {
            if let Err(err) = self.binding.stop(code) {
                error!("failed to report service stop: {:#}", err);
            }
        }

        info!("service exiting with code {}", code);
        (self.exit)(code);
    }

    /// Move the service to `state`.
    ///
    /// `Stopped` exits the process with code 0. Other states are reported to
    /// the SCM on Windows and ignored elsewhere.
    pub fn set_state(&self, state: RunState) -> Result<()> {
        if state.is_terminal() {
            self.stop(0);
            return Ok(());
        }

        if !self.platform.is_windows() {
            return Ok(());
        }

        self.binding
            .set_state(state.code())
            .with_context(|| format!("failed to set service state to {}", state))?;
        self.lock().state.publish(Some(state));
        Ok(())
    }

    /// Current state as the SCM sees it, `None` where there is no SCM
    pub fn get_state(&self) -> Result<Option<RunState>> {
        if !self.platform.is_windows() {
            return Ok(None);
        }

        let code = self.binding.get_state()?;
        Ok(Some(RunState::from_reported(code)))
    }

    /// Watch the states pushed through [`Runtime::set_state`]
    pub fn state_watcher(&self) -> Watcher<Option<RunState>> {
        self.lock().state.subscribe()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.platform.is_windows() && self.binding.is_stop_requested()
    }

    /// Register `listener` for a control name, or for [`WILDCARD`].
    ///
    /// Also asks the SCM to deliver that control. Does nothing off Windows.
    pub fn on<F>(&self, event: &str, listener: F) -> Result<()>
    where
        F: Fn(&ControlEvent) + Send + Sync + 'static,
    {
        if !self.platform.is_windows() {
            return Ok(());
        }

        if event != WILDCARD {
            match event.parse::<Control>() {
                Ok(control) => self.accept_control(&[control], true)?,
                Err(err) => warn!("{}, listener will never be called", err),
            }
        }

        self.lock()
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(listener));
        Ok(())
    }

    /// Add or remove controls from the accepted set.
    ///
    /// Before the runtime is initialized the change is only recorded, it
    /// reaches the SCM with the next push.
    pub fn accept_control(&self, controls: &[Control], add: bool) -> Result<()> {
        let mut inner = self.lock();
        for control in controls {
            if add {
                inner.accepted.insert(*control);
            } else {
                inner.accepted.remove(*control);
            }
        }

        if inner.initialized {
            self.push_controls(inner.accepted.bits())?;
        }
        Ok(())
    }

    fn push_controls(&self, mask: u32) -> Result<()> {
        if !self.platform.is_windows() {
            return Ok(());
        }

        debug!("accepting service controls {:#06x}", mask);
        self.binding
            .set_controls_accepted(mask)
            .context("failed to update accepted service controls")
    }
}
