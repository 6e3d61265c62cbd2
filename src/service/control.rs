//! Windows service control codes and their names.
//!
//! Numeric values follow the `LPHANDLER_FUNCTION_EX` protocol of the SCM.

use std::fmt;
use std::str::FromStr;

/// Control request the SCM can deliver to a running service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    /// not a real SCM control code
    Start,
    Stop,
    Pause,
    Continue,
    Interrogate,
    Shutdown,
    ParamChange,
    NetBindAdd,
    NetBindRemove,
    NetBindEnable,
    NetBindDisable,
    DeviceEvent,
    HardwareProfileChange,
    PowerEvent,
    SessionChange,
    PreShutdown,
    TimeChange,
    TriggerEvent,
}

impl Control {
    pub const ALL: [Control; 18] = [
        Control::Start,
        Control::Stop,
        Control::Pause,
        Control::Continue,
        Control::Interrogate,
        Control::Shutdown,
        Control::ParamChange,
        Control::NetBindAdd,
        Control::NetBindRemove,
        Control::NetBindEnable,
        Control::NetBindDisable,
        Control::DeviceEvent,
        Control::HardwareProfileChange,
        Control::PowerEvent,
        Control::SessionChange,
        Control::PreShutdown,
        Control::TimeChange,
        Control::TriggerEvent,
    ];

    pub fn code(&self) -> u32 {
        match self {
            Control::Start => 0x0000,
            Control::Stop => 0x0001,
            Control::Pause => 0x0002,
            Control::Continue => 0x0003,
            Control::Interrogate => 0x0004,
            Control::Shutdown => 0x0005,
            Control::ParamChange => 0x0006,
            Control::NetBindAdd => 0x0007,
            Control::NetBindRemove => 0x0008,
            Control::NetBindEnable => 0x0009,
            Control::NetBindDisable => 0x000A,
            Control::DeviceEvent => 0x000B,
            Control::HardwareProfileChange => 0x000C,
            Control::PowerEvent => 0x000D,
            Control::SessionChange => 0x000E,
            Control::PreShutdown => 0x000F,
            Control::TimeChange => 0x0010,
            Control::TriggerEvent => 0x0020,
        }
    }

    /// Translates a wire code. Unmapped codes have no name.
    pub fn from_code(code: u32) -> Option<Control> {
        Control::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Control::Start => "start",
            Control::Stop => "stop",
            Control::Pause => "pause",
            Control::Continue => "continue",
            Control::Interrogate => "interrogate",
            Control::Shutdown => "shutdown",
            Control::ParamChange => "paramchange",
            Control::NetBindAdd => "netbindadd",
            Control::NetBindRemove => "netbindremove",
            Control::NetBindEnable => "netbindenable",
            Control::NetBindDisable => "netbinddisable",
            Control::DeviceEvent => "deviceevent",
            Control::HardwareProfileChange => "hardwareprofilechange",
            Control::PowerEvent => "powerevent",
            Control::SessionChange => "sessionchange",
            Control::PreShutdown => "preshutdown",
            Control::TimeChange => "timechange",
            Control::TriggerEvent => "triggerevent",
        }
    }

    /// `SERVICE_ACCEPT_*` bit that opts into this control, 0 if none exists
    pub fn accept_flag(&self) -> u32 {
        match self {
            Control::Stop => 0x0000_0001,
            Control::Pause | Control::Continue => 0x0000_0002,
            Control::Shutdown => 0x0000_0004,
            Control::ParamChange => 0x0000_0008,
            Control::NetBindAdd
            | Control::NetBindRemove
            | Control::NetBindEnable
            | Control::NetBindDisable => 0x0000_0010,
            Control::HardwareProfileChange => 0x0000_0020,
            Control::PowerEvent => 0x0000_0040,
            Control::SessionChange => 0x0000_0080,
            Control::PreShutdown => 0x0000_0100,
            Control::TimeChange => 0x0000_0200,
            Control::TriggerEvent => 0x0000_0400,
            Control::Start | Control::Interrogate | Control::DeviceEvent => 0,
        }
    }

    /// Name of the event type that came with this control, if known
    pub fn event_type_name(&self, event_type: u32) -> Option<&'static str> {
        match self {
            Control::SessionChange => session_change_name(event_type),
            _ => None,
        }
    }
}

// WTS_* reasons carried by SERVICE_CONTROL_SESSIONCHANGE
fn session_change_name(event_type: u32) -> Option<&'static str> {
    let name = match event_type {
        0x01 => "console-connect",
        0x02 => "console-disconnect",
        0x03 => "remote-connect",
        0x04 => "remote-disconnect",
        0x05 => "session-logon",
        0x06 => "session-logoff",
        0x07 => "session-lock",
        0x08 => "session-unlock",
        0x09 => "session-remote-control",
        0x0A => "session-create",
        0x0B => "session-terminate",
        _ => return None,
    };

    Some(name)
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownControl(pub String);

impl fmt::Display for UnknownControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown service control {:?}", self.0)
    }
}

impl std::error::Error for UnknownControl {}

impl FromStr for Control {
    type Err = UnknownControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Control::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownControl(s.to_string()))
    }
}

/// Set of controls the process asked the SCM to deliver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcceptedControls(u32);

impl AcceptedControls {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, control: Control) {
        self.0 |= control.accept_flag();
    }

    pub fn remove(&mut self, control: Control) {
        self.0 &= !control.accept_flag();
    }
}

/// A control request as delivered by the SCM, before translation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawControl {
    pub code: u32,
    pub event_type: u32,
}

impl RawControl {
    pub fn new(code: u32, event_type: u32) -> RawControl {
        RawControl { code, event_type }
    }
}

/// A translated control request handed to listeners
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlEvent {
    /// translated control, `None` for codes outside the known set
    pub control: Option<Control>,
    /// translated event type, only known for sessionchange today
    pub sub_type: Option<&'static str>,
    pub raw: RawControl,
}

impl ControlEvent {
    pub fn name(&self) -> Option<&'static str> {
        self.control.map(|c| c.name())
    }
}

impl From<RawControl> for ControlEvent {
    fn from(raw: RawControl) -> Self {
        let control = Control::from_code(raw.code);
        let sub_type = control.and_then(|c| c.event_type_name(raw.event_type));
        ControlEvent {
            control,
            sub_type,
            raw,
        }
    }
}
