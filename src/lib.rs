pub mod app;
pub mod manager;
pub mod service;

pub use service::{
    Control, ControlEvent, MechanismChoice, Platform, RunState, Runtime, ServiceDescriptor,
    ServiceError, ServiceManager,
};
