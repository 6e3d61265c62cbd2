use crate::service::errors::ServiceError;
use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_yaml as yaml;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

pub const DEFAULT_WANTED_BY: &str = "multi-user.target";
pub const DEFAULT_RUN_LEVELS: [u8; 4] = [2, 3, 4, 5];

/// Account a Windows service runs under
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Identity and launch settings of a service.
///
/// `name` is the unit file name, the init script name and the SCM key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptor {
    #[serde(skip)]
    pub name: String,
    /// shown by the SCM, defaults to the name
    pub display_name: Option<String>,
    /// optional interpreter that runs the program (node, python, ...)
    pub interpreter: Option<String>,
    pub interpreter_args: Vec<String>,
    /// program to run, defaults to the current executable
    pub program: String,
    pub program_args: Vec<String>,
    /// services that must be up first
    pub dependencies: BTreeSet<String>,
    /// SysV run levels
    pub run_levels: BTreeSet<u8>,
    /// systemd install target
    pub wanted_by: String,
    pub credentials: Option<Credentials>,
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        ServiceDescriptor {
            name: String::new(),
            display_name: None,
            interpreter: None,
            interpreter_args: Vec::new(),
            program: current_executable(),
            program_args: Vec::new(),
            dependencies: BTreeSet::new(),
            run_levels: DEFAULT_RUN_LEVELS.iter().copied().collect(),
            wanted_by: String::from(DEFAULT_WANTED_BY),
            credentials: None,
        }
    }
}

fn current_executable() -> String {
    match std::env::current_exe() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(err) => {
            warn!("failed to resolve current executable: {}", err);
            String::new()
        }
    }
}

impl ServiceDescriptor {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, program: P) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.into(),
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Dependency names in ascending order, separated by `sep`
    pub fn joined_dependencies(&self, sep: &str) -> String {
        let names: Vec<&str> = self.dependencies.iter().map(String::as_str).collect();
        names.join(sep)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        if self.program.is_empty() {
            bail!(ServiceError::invalid_descriptor("missing program directive"));
        }

        if self.interpreter.is_none() && !self.interpreter_args.is_empty() {
            bail!(ServiceError::invalid_descriptor(
                "interpreter_args given without an interpreter"
            ));
        }

        if let Some(level) = self.run_levels.iter().find(|level| **level > 6) {
            bail!(ServiceError::invalid_descriptor(format!(
                "invalid run level {}",
                level
            )));
        }

        Ok(())
    }
}

/// Checks that `name` can be used as a file name inside the service directories
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!(ServiceError::invalid_descriptor("missing service name"));
    }

    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        bail!(ServiceError::invalid_descriptor(format!(
            "invalid service name {:?}, it must be a plain file name",
            name
        )));
    }

    Ok(())
}

/// load reads a descriptor from a yaml file, the service is named after the file
pub fn load<T: AsRef<Path>>(t: T) -> Result<ServiceDescriptor> {
    let p = t.as_ref();
    let name = match p.file_stem().and_then(|name| name.to_str()) {
        Some(name) => name,
        None => bail!("invalid file name: {}", p.display()),
    };

    let file = File::open(p).with_context(|| format!("failed to open {}", p.display()))?;
    let mut descriptor: ServiceDescriptor =
        yaml::from_reader(&file).with_context(|| format!("failed to parse {}", p.display()))?;
    descriptor.name = String::from(name);
    descriptor.validate()?;

    Ok(descriptor)
}
