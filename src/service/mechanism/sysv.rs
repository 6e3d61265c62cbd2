use super::{command_line, remove_definition, tool_error, write_definition, Mechanism};
use crate::manager::ProcessRunner;
use crate::service::config::ServiceDescriptor;
use crate::service::detect::Layout;
use crate::service::templates::{self, INIT_SCRIPT};
use anyhow::{bail, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

const CHKCONFIG: &str = "chkconfig";
const UPDATE_RC: &str = "update-rc.d";

/// Installs services as SysV init scripts
pub struct SysVInit {
    layout: Layout,
    runner: Arc<dyn ProcessRunner>,
}

impl SysVInit {
    pub fn new(layout: Layout, runner: Arc<dyn ProcessRunner>) -> SysVInit {
        SysVInit { layout, runner }
    }

    pub fn script(descriptor: &ServiceDescriptor) -> Result<String> {
        let levels: Vec<String> = descriptor.run_levels.iter().map(|l| l.to_string()).collect();

        let mut vars = HashMap::new();
        vars.insert("NAME", descriptor.name.clone());
        vars.insert("COMMAND", command_line(descriptor, true));
        vars.insert("PID_FILE", format!("{}.pid", descriptor.program));
        vars.insert("DEPENDENCIES", descriptor.joined_dependencies(" "));
        vars.insert("RUN_LEVELS_ARR", levels.join(" "));
        vars.insert("RUN_LEVELS_STR", levels.concat());

        templates::render(INIT_SCRIPT, &vars)
    }

    /// Runs chkconfig, and update-rc.d only when chkconfig is not installed.
    /// Any other chkconfig failure is returned as is.
    async fn register(&self, chkconfig: &[&str], update_rc: &[&str]) -> Result<()> {
        match self.runner.run(CHKCONFIG, chkconfig).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_not_found() => {
                debug!("{} not found, falling back to {}", CHKCONFIG, UPDATE_RC);
            }
            Err(err) => bail!(tool_error(CHKCONFIG, err)),
        }

        self.runner
            .run(UPDATE_RC, update_rc)
            .await
            .map_err(|err| tool_error(UPDATE_RC, err))?;

        Ok(())
    }
}

#[async_trait]
impl Mechanism for SysVInit {
    async fn install(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        let script = Self::script(descriptor)?;
        write_definition(&self.layout.init_script(&descriptor.name), &script).await?;

        let name = descriptor.name.as_str();
        self.register(&["--add", name], &[name, "defaults"]).await?;

        info!("service '{}' registered with init.d", name);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.register(&["--del", name], &[name, "remove"]).await?;

        remove_definition(&self.layout, name).await?;
        info!("service '{}' removed from init.d", name);
        Ok(())
    }
}
