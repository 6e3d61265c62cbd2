use super::{command_line, remove_definition, tool_error, write_definition, Mechanism};
use crate::manager::ProcessRunner;
use crate::service::config::ServiceDescriptor;
use crate::service::detect::Layout;
use crate::service::templates::{self, SYSTEMD_UNIT};
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

const SYSTEMCTL: &str = "systemctl";

/// Installs services as systemd units
pub struct Systemd {
    layout: Layout,
    runner: Arc<dyn ProcessRunner>,
}

impl Systemd {
    pub fn new(layout: Layout, runner: Arc<dyn ProcessRunner>) -> Systemd {
        Systemd { layout, runner }
    }

    pub fn unit(descriptor: &ServiceDescriptor) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("NAME", descriptor.name.clone());
        vars.insert("COMMAND", command_line(descriptor, false));
        vars.insert("DEPENDENCIES", descriptor.joined_dependencies(" "));
        vars.insert("SYSTEMD_WANTED_BY", descriptor.wanted_by.clone());

        templates::render(SYSTEMD_UNIT, &vars)
    }
}

#[async_trait]
impl Mechanism for Systemd {
    async fn install(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        let unit = Self::unit(descriptor)?;
        write_definition(&self.layout.unit_file(&descriptor.name), &unit).await?;

        // the unit file stays in place when enable fails
        self.runner
            .run(SYSTEMCTL, &["enable", descriptor.name.as_str()])
            .await
            .map_err(|err| tool_error(SYSTEMCTL, err))?;

        info!("service '{}' enabled with systemd", descriptor.name);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.runner
            .run(SYSTEMCTL, &["disable", name])
            .await
            .map_err(|err| tool_error(SYSTEMCTL, err))?;

        remove_definition(&self.layout, name).await?;
        info!("service '{}' removed from systemd", name);
        Ok(())
    }
}
