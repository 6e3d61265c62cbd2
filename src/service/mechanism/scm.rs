use super::{command_line, Mechanism};
use crate::service::config::ServiceDescriptor;
use crate::service::native::{NativeBinding, Registration};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

/// Registers services with the Windows Service Control Manager
pub struct WindowsScm {
    binding: Arc<dyn NativeBinding>,
}

impl WindowsScm {
    pub fn new(binding: Arc<dyn NativeBinding>) -> WindowsScm {
        WindowsScm { binding }
    }

    pub fn registration(descriptor: &ServiceDescriptor) -> Registration {
        let dependencies = if descriptor.dependencies.is_empty() {
            String::new()
        } else {
            format!("{}\0\0", descriptor.joined_dependencies("\0"))
        };

        let mut arguments = Vec::new();
        let executable = match &descriptor.interpreter {
            Some(interpreter) => {
                arguments.extend(descriptor.interpreter_args.iter().cloned());
                arguments.push(descriptor.program.clone());
                interpreter.clone()
            }
            None => descriptor.program.clone(),
        };
        arguments.extend(descriptor.program_args.iter().cloned());

        let credentials = descriptor.credentials.as_ref();
        Registration {
            name: descriptor.name.clone(),
            display_name: descriptor.display_name().to_string(),
            command_line: command_line(descriptor, true),
            executable,
            arguments,
            username: credentials.map(|c| c.username.clone()),
            password: credentials.and_then(|c| c.password.clone()),
            dependencies,
        }
    }
}

#[async_trait]
impl Mechanism for WindowsScm {
    async fn install(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        let registration = Self::registration(descriptor);
        debug!("registering '{}' as {}", registration.name, registration.command_line);
        self.binding.add(&registration)?;

        info!("service '{}' registered with the SCM", descriptor.name);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.binding.remove(name)?;

        info!("service '{}' removed from the SCM", name);
        Ok(())
    }
}
