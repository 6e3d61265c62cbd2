pub mod config;
pub mod control;
pub mod detect;
pub mod errors;
pub mod mechanism;
pub mod native;
pub mod runtime;
pub mod state;
pub mod templates;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::{Credentials, ServiceDescriptor};
pub use control::{AcceptedControls, Control, ControlEvent, RawControl};
pub use detect::{Layout, MechanismChoice, Platform};
pub use errors::ServiceError;
pub use native::{NativeBinding, Registration};
pub use runtime::Runtime;
pub use state::RunState;

use crate::manager::{CommandRunner, ProcessRunner};
use anyhow::{Context, Result};
use log::debug;
use mechanism::{Mechanism, SysVInit, Systemd, WindowsScm};
use std::sync::Arc;

/// Installs and removes services using whatever mechanism the host offers
#[derive(Clone)]
pub struct ServiceManager {
    platform: Platform,
    layout: Layout,
    runner: Arc<dyn ProcessRunner>,
    binding: Arc<dyn NativeBinding>,
}

impl ServiceManager {
    pub fn new(
        platform: Platform,
        layout: Layout,
        runner: Arc<dyn ProcessRunner>,
        binding: Arc<dyn NativeBinding>,
    ) -> Self {
        Self {
            platform,
            layout,
            runner,
            binding,
        }
    }

    /// Manager for the current host, running real commands against the standard layout
    pub fn local(binding: Arc<dyn NativeBinding>) -> Self {
        Self::new(
            Platform::current(),
            Layout::default(),
            Arc::new(CommandRunner::new()),
            binding,
        )
    }

    pub async fn detect(&self) -> Result<MechanismChoice> {
        detect::detect(self.platform, &self.layout).await
    }

    /// Mechanism implementing `choice`
    pub fn mechanism(&self, choice: MechanismChoice) -> Box<dyn Mechanism> {
        match choice {
            MechanismChoice::WindowsScm => Box::new(WindowsScm::new(Arc::clone(&self.binding))),
            MechanismChoice::Systemd => {
                Box::new(Systemd::new(self.layout.clone(), Arc::clone(&self.runner)))
            }
            MechanismChoice::SysVInit => {
                Box::new(SysVInit::new(self.layout.clone(), Arc::clone(&self.runner)))
            }
        }
    }

    /// Install a service. Nothing is rolled back when a later step fails.
    pub async fn install(&self, descriptor: &ServiceDescriptor) -> Result<MechanismChoice> {
        descriptor.validate()?;

        let choice = self.detect().await?;
        debug!("installing service '{}' using {}", descriptor.name, choice);
        self.mechanism(choice)
            .install(descriptor)
            .await
            .with_context(|| format!("failed to install service '{}'", descriptor.name))?;

        Ok(choice)
    }

    /// Disable and delete a service
    pub async fn remove<S: AsRef<str>>(&self, name: S) -> Result<MechanismChoice> {
        let name = name.as_ref();
        config::validate_name(name)?;

        let choice = self.detect().await?;
        debug!("removing service '{}' using {}", name, choice);
        self.mechanism(choice)
            .remove(name)
            .await
            .with_context(|| format!("failed to remove service '{}'", name))?;

        Ok(choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::{FakeBinding, FakeRunner, Outcome};

    struct Host {
        _root: tempfile::TempDir,
        layout: Layout,
    }

    fn sysv_host() -> Host {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::under(root.path());
        std::fs::create_dir_all(&layout.init_dir).unwrap();
        Host {
            _root: root,
            layout,
        }
    }

    fn systemd_host() -> Host {
        let host = sysv_host();
        std::fs::create_dir_all(&host.layout.systemd_dir).unwrap();
        host
    }

    fn manager(host: &Host, runner: Arc<FakeRunner>) -> ServiceManager {
        ServiceManager::new(
            Platform::Unix,
            host.layout.clone(),
            runner,
            Arc::new(FakeBinding::new()),
        )
    }

    fn node_app() -> ServiceDescriptor {
        let mut descriptor = ServiceDescriptor::new("myapp", "/opt/myapp/app.js");
        descriptor.interpreter = Some("/usr/bin/node".into());
        descriptor
    }

    fn service_error(err: &anyhow::Error) -> &ServiceError {
        err.downcast_ref::<ServiceError>()
            .unwrap_or_else(|| panic!("not a service error: {:?}", err))
    }

    #[tokio::test]
    async fn test_install_systemd_unit() {
        let host = systemd_host();
        let runner = Arc::new(FakeRunner::new());
        let manager = manager(&host, Arc::clone(&runner));

        let choice = manager.install(&node_app()).await.unwrap();
        assert_eq!(choice, MechanismChoice::Systemd);

        let unit = std::fs::read_to_string(host.layout.unit_file("myapp")).unwrap();
        assert!(unit.contains("ExecStart=/usr/bin/node /opt/myapp/app.js\n"));
        assert!(unit.contains("WantedBy=multi-user.target"));
        assert_eq!(runner.calls(), vec!["systemctl enable myapp"]);
    }

    #[tokio::test]
    async fn test_systemd_enable_failure_keeps_unit_file() {
        let host = systemd_host();
        let runner = Arc::new(FakeRunner::new().with("systemctl", Outcome::Exit(1)));
        let manager = manager(&host, Arc::clone(&runner));

        let err = manager.install(&node_app()).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::ExternalToolFailure { tool, .. } if tool == "systemctl"
        ));
        assert!(host.layout.unit_file("myapp").exists());
    }

    #[tokio::test]
    async fn test_install_sysv_falls_back_to_update_rc() {
        let host = sysv_host();
        let runner = Arc::new(FakeRunner::new().with("chkconfig", Outcome::Missing));
        let manager = manager(&host, Arc::clone(&runner));

        let choice = manager.install(&node_app()).await.unwrap();
        assert_eq!(choice, MechanismChoice::SysVInit);

        let script = std::fs::read_to_string(host.layout.init_script("myapp")).unwrap();
        assert!(script.contains("# Provides:          myapp\n"));
        assert!(script.contains("# Default-Start:     2 3 4 5\n"));
        assert!(script.contains("# chkconfig:   2345 99 1\n"));
        assert!(script.contains(r#""/usr/bin/node" "/opt/myapp/app.js" >/dev/null 2>&1 &"#));
        assert!(script.contains(r#"head -1 "/opt/myapp/app.js.pid""#));
        assert_eq!(
            runner.calls(),
            vec!["chkconfig --add myapp", "update-rc.d myapp defaults"]
        );
    }

    #[tokio::test]
    async fn test_chkconfig_failure_is_not_a_fallback() {
        let host = sysv_host();
        let runner = Arc::new(FakeRunner::new().with("chkconfig", Outcome::Exit(2)));
        let manager = manager(&host, Arc::clone(&runner));

        let err = manager.install(&node_app()).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::ExternalToolFailure { tool, .. } if tool == "chkconfig"
        ));
        assert_eq!(runner.calls(), vec!["chkconfig --add myapp"]);
    }

    #[tokio::test]
    async fn test_both_init_tools_missing() {
        let host = sysv_host();
        let runner = Arc::new(
            FakeRunner::new()
                .with("chkconfig", Outcome::Missing)
                .with("update-rc.d", Outcome::Missing),
        );
        let manager = manager(&host, runner);

        let err = manager.install(&node_app()).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::ExternalToolMissing { tool } if tool == "update-rc.d"
        ));
    }

    #[tokio::test]
    async fn test_install_fails_to_write_without_init_dir() {
        let root = tempfile::tempdir().unwrap();
        let host = Host {
            layout: Layout::under(root.path()),
            _root: root,
        };
        let runner = Arc::new(FakeRunner::new());
        let manager = manager(&host, Arc::clone(&runner));

        let err = manager.install(&node_app()).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::WriteFailure { .. }
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_then_remove_sysv() {
        let host = sysv_host();
        let runner = Arc::new(FakeRunner::new().with("chkconfig", Outcome::Missing));
        let manager = manager(&host, Arc::clone(&runner));
        let descriptor = node_app();

        manager.install(&descriptor).await.unwrap();
        manager.remove("myapp").await.unwrap();

        assert!(!host.layout.init_script("myapp").exists());
        assert!(!host.layout.unit_file("myapp").exists());
        assert_eq!(
            runner.calls(),
            vec![
                "chkconfig --add myapp",
                "update-rc.d myapp defaults",
                "chkconfig --del myapp",
                "update-rc.d myapp remove",
            ]
        );
    }

    #[tokio::test]
    async fn test_install_then_remove_systemd() {
        let host = systemd_host();
        let runner = Arc::new(FakeRunner::new());
        let manager = manager(&host, Arc::clone(&runner));

        manager.install(&node_app()).await.unwrap();
        manager.remove("myapp").await.unwrap();

        assert!(!host.layout.init_script("myapp").exists());
        assert!(!host.layout.unit_file("myapp").exists());
        assert_eq!(
            runner.calls(),
            vec!["systemctl enable myapp", "systemctl disable myapp"]
        );
    }

    #[tokio::test]
    async fn test_remove_absent_service_reports_not_found() {
        let host = systemd_host();
        let manager = manager(&host, Arc::new(FakeRunner::new()));

        let err = manager.remove("ghost").await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::RemoveFailure { .. }
        ));
    }

    #[tokio::test]
    async fn test_install_then_remove_windows() {
        let host = sysv_host();
        let binding = Arc::new(FakeBinding::new());
        let runner = Arc::new(FakeRunner::new());
        let manager = ServiceManager::new(
            Platform::Windows,
            host.layout.clone(),
            Arc::clone(&runner) as Arc<dyn ProcessRunner>,
            Arc::clone(&binding) as Arc<dyn NativeBinding>,
        );

        let mut descriptor = node_app();
        descriptor.display_name = Some("My App".into());
        descriptor.program_args = vec!["--port".into(), "8080".into()];
        descriptor.dependencies = ["Tcpip", "Dnscache", "Tcpip"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        descriptor.credentials = Some(Credentials {
            username: ".\\svc".into(),
            password: Some("secret".into()),
        });

        let choice = manager.install(&descriptor).await.unwrap();
        assert_eq!(choice, MechanismChoice::WindowsScm);

        {
            let services = binding.services.lock().unwrap();
            let registration = services.get("myapp").unwrap();
            assert_eq!(registration.display_name, "My App");
            assert_eq!(
                registration.command_line,
                r#""/usr/bin/node" "/opt/myapp/app.js" "--port" "8080""#
            );
            assert_eq!(registration.executable, "/usr/bin/node");
            assert_eq!(
                registration.arguments,
                vec!["/opt/myapp/app.js", "--port", "8080"]
            );
            assert_eq!(registration.dependencies, "Dnscache\0Tcpip\0\0");
            assert_eq!(registration.username.as_deref(), Some(".\\svc"));
            assert_eq!(registration.password.as_deref(), Some("secret"));
        }

        // a second registration under the same name is rejected by the SCM
        let err = manager.install(&descriptor).await.unwrap_err();
        assert!(format!("{:#}", err).contains("already exists"));

        manager.remove("myapp").await.unwrap();
        assert!(binding.services.lock().unwrap().is_empty());
        assert!(runner.calls().is_empty());
        assert!(!host.layout.init_script("myapp").exists());
    }

    #[test]
    fn test_windows_without_dependencies() {
        let descriptor = ServiceDescriptor::new("myapp", "C:\\app\\myapp.exe");
        let registration = WindowsScm::registration(&descriptor);
        assert_eq!(registration.dependencies, "");
        assert_eq!(registration.display_name, "myapp");
        assert_eq!(registration.executable, "C:\\app\\myapp.exe");
        assert!(registration.arguments.is_empty());
        assert!(registration.username.is_none());
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_rejected_before_detection() {
        let host = systemd_host();
        let runner = Arc::new(FakeRunner::new());
        let manager = manager(&host, Arc::clone(&runner));

        let descriptor = ServiceDescriptor::new("", "/usr/bin/myapp");
        assert!(manager.install(&descriptor).await.is_err());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_chkconfig_failure_is_not_a_fallback() {
        let host = sysv_host();
        std::fs::write(host.layout.init_script("myapp"), "#!/bin/bash\n").unwrap();
        let runner = Arc::new(FakeRunner::new().with("chkconfig", Outcome::Exit(1)));
        let manager = manager(&host, Arc::clone(&runner));

        let err = manager.remove("myapp").await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::ExternalToolFailure { tool, .. } if tool == "chkconfig"
        ));
        assert_eq!(runner.calls(), vec!["chkconfig --del myapp"]);
        assert!(host.layout.init_script("myapp").exists());
    }

    fn windows_manager(host: &Host, binding: Arc<FakeBinding>) -> ServiceManager {
        ServiceManager::new(
            Platform::Windows,
            host.layout.clone(),
            Arc::new(FakeRunner::new()),
            binding,
        )
    }

    #[tokio::test]
    async fn test_access_denied_reaches_caller() {
        let host = sysv_host();
        let binding = Arc::new(FakeBinding::new().deny("myapp"));
        let manager = windows_manager(&host, Arc::clone(&binding));

        for err in vec![
            manager.install(&node_app()).await.unwrap_err(),
            manager.remove("myapp").await.unwrap_err(),
        ] {
            match service_error(&err) {
                ServiceError::NativeBindingFailure { message } => {
                    assert!(message.ends_with("failed: access is denied"))
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
        assert!(binding.services.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_rejects_path_names() {
        let host = sysv_host();
        let binding = Arc::new(FakeBinding::new());
        let manager = windows_manager(&host, binding);

        let err = manager.remove("..\\Spooler").await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::InvalidDescriptor { .. }
        ));
    }
}
