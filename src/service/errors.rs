use thiserror::Error;

/// Errors that can occur while installing, removing or controlling a service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Probing the host for a service mechanism failed with something other than not-found
    #[error("stat({path}) failed: {message}")]
    DetectionFailure { path: String, message: String },

    /// A service definition could not be rendered
    #[error("render of {template} failed: {message}")]
    RenderFailure { template: String, message: String },

    /// A service definition could not be written
    #[error("writeFile({path}) failed: {message}")]
    WriteFailure { path: String, message: String },

    /// A service definition could not be deleted
    #[error("unlink({path}) failed: {message}")]
    RemoveFailure { path: String, message: String },

    /// An external tool ran and reported a failure
    #[error("{tool} failed: {message}")]
    ExternalToolFailure { tool: String, message: String },

    /// An external tool is not installed on this host
    #[error("{tool} failed: command not found")]
    ExternalToolMissing { tool: String },

    /// The native service binding rejected the request
    #[error("native service binding: {message}")]
    NativeBindingFailure { message: String },

    /// The service descriptor is not usable
    #[error("invalid service descriptor: {message}")]
    InvalidDescriptor { message: String },
}

impl ServiceError {
    pub fn detection_failure<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        ServiceError::DetectionFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn render_failure<T: Into<String>, M: Into<String>>(template: T, message: M) -> Self {
        ServiceError::RenderFailure {
            template: template.into(),
            message: message.into(),
        }
    }

    pub fn write_failure<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        ServiceError::WriteFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn remove_failure<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        ServiceError::RemoveFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn external_tool_failure<T: Into<String>, M: Into<String>>(tool: T, message: M) -> Self {
        ServiceError::ExternalToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn external_tool_missing<T: Into<String>>(tool: T) -> Self {
        ServiceError::ExternalToolMissing { tool: tool.into() }
    }

    pub fn native_binding_failure<M: Into<String>>(message: M) -> Self {
        ServiceError::NativeBindingFailure {
            message: message.into(),
        }
    }

    pub fn invalid_descriptor<M: Into<String>>(message: M) -> Self {
        ServiceError::InvalidDescriptor {
            message: message.into(),
        }
    }
}
