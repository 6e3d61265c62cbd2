use crate::service::control::Control;
use anyhow::bail;
use std::fmt;
use std::str::FromStr;

/// Run state of a service as the SCM sees it (`SERVICE_STATUS.dwCurrentState`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

impl RunState {
    pub const ALL: [RunState; 7] = [
        RunState::Stopped,
        RunState::StartPending,
        RunState::StopPending,
        RunState::Running,
        RunState::ContinuePending,
        RunState::PausePending,
        RunState::Paused,
    ];

    pub fn code(&self) -> u32 {
        match self {
            RunState::Stopped => 0x01,
            RunState::StartPending => 0x02,
            RunState::StopPending => 0x03,
            RunState::Running => 0x04,
            RunState::ContinuePending => 0x05,
            RunState::PausePending => 0x06,
            RunState::Paused => 0x07,
        }
    }

    pub fn from_code(code: u32) -> Option<RunState> {
        RunState::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Maps a state reported by the SCM, anything unknown reads as stopped
    pub fn from_reported(code: u32) -> RunState {
        RunState::from_code(code).unwrap_or(RunState::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::StartPending => "start-pending",
            RunState::StopPending => "stop-pending",
            RunState::Running => "running",
            RunState::ContinuePending => "continue-pending",
            RunState::PausePending => "pause-pending",
            RunState::Paused => "paused",
        }
    }

    /// Stopped ends the process
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped)
    }

    /// State the service moves to on its own when the SCM delivers `control`.
    ///
    /// Only pause and continue change state, every other control is left to
    /// the application.
    pub fn after_control(control: Control) -> Option<RunState> {
        match control {
            Control::Pause => Some(RunState::Paused),
            Control::Continue => Some(RunState::Running),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RunState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match RunState::ALL.iter().copied().find(|state| state.name() == s) {
            Some(state) => Ok(state),
            None => bail!("unknown service state {:?}", s),
        }
    }
}
