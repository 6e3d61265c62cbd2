//! Fakes for the external collaborators, shared by the unit tests.

use crate::manager::{ProcessRunner, RunError};
use crate::service::control::RawControl;
use crate::service::errors::ServiceError;
use crate::service::native::{ControlSender, NativeBinding, Registration};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Outcome a fake tool reports
#[derive(Clone, Copy, Debug)]
pub enum Outcome {
    Missing,
    Exit(i32),
}

/// Records every command and answers with the configured outcome, success by default
#[derive(Default)]
pub struct FakeRunner {
    outcomes: Mutex<HashMap<String, Outcome>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> FakeRunner {
        FakeRunner::default()
    }

    pub fn with(self, program: &str, outcome: Outcome) -> FakeRunner {
        self.outcomes
            .lock()
            .unwrap()
            .insert(program.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), RunError> {
        let mut line = vec![program];
        line.extend_from_slice(args);
        self.calls.lock().unwrap().push(line.join(" "));

        match self.outcomes.lock().unwrap().get(program) {
            None => Ok(()),
            Some(Outcome::Missing) => Err(RunError::NotFound),
            Some(Outcome::Exit(code)) => Err(RunError::ExitCode(*code)),
        }
    }
}

/// In memory stand-in for the SCM
#[derive(Default)]
pub struct FakeBinding {
    pub services: Mutex<HashMap<String, Registration>>,
    pub state: Mutex<u32>,
    pub states: Mutex<Vec<u32>>,
    pub masks: Mutex<Vec<u32>>,
    pub stopped: Mutex<Option<i32>>,
    pub runs: Mutex<u32>,
    pub controls: Mutex<Option<ControlSender>>,
    pub stop_requested: Mutex<bool>,
    denied: HashSet<String>,
}

impl FakeBinding {
    pub fn new() -> FakeBinding {
        FakeBinding::default()
    }

    /// Makes the SCM refuse access to `name`
    pub fn deny(mut self, name: &str) -> FakeBinding {
        self.denied.insert(name.to_string());
        self
    }

    /// Delivers a control request as the SCM would
    pub fn deliver(&self, code: u32, event_type: u32) {
        let controls = self.controls.lock().unwrap();
        let sender = controls.as_ref().expect("service dispatcher not running");
        sender.send(RawControl::new(code, event_type)).unwrap();
    }

    pub fn masks(&self) -> Vec<u32> {
        self.masks.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<u32> {
        self.states.lock().unwrap().clone()
    }
}

impl NativeBinding for FakeBinding {
    fn add(&self, registration: &Registration) -> Result<()> {
        if self.denied.contains(&registration.name) {
            bail!(ServiceError::native_binding_failure(
                "OpenSCManager() failed: access is denied"
            ));
        }

        let mut services = self.services.lock().unwrap();
        if services.contains_key(&registration.name) {
            bail!(ServiceError::native_binding_failure(
                "CreateService() failed: the specified service already exists"
            ));
        }
        services.insert(registration.name.clone(), registration.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        if self.denied.contains(name) {
            bail!(ServiceError::native_binding_failure(
                "OpenService() failed: access is denied"
            ));
        }

        match self.services.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => bail!(ServiceError::native_binding_failure(
                "OpenService() failed: the specified service does not exist"
            )),
        }
    }

    fn run(&self, controls: ControlSender) -> Result<()> {
        *self.runs.lock().unwrap() += 1;
        *self.controls.lock().unwrap() = Some(controls);
        Ok(())
    }

    fn stop(&self, code: i32) -> Result<()> {
        *self.stopped.lock().unwrap() = Some(code);
        Ok(())
    }

    fn set_state(&self, state: u32) -> Result<()> {
        *self.state.lock().unwrap() = state;
        self.states.lock().unwrap().push(state);
        Ok(())
    }

    fn get_state(&self) -> Result<u32> {
        Ok(*self.state.lock().unwrap())
    }

    fn set_controls_accepted(&self, mask: u32) -> Result<()> {
        self.masks.lock().unwrap().push(mask);
        Ok(())
    }

    fn is_stop_requested(&self) -> bool {
        *self.stop_requested.lock().unwrap()
    }
}
