use async_trait::async_trait;
use servman::manager::{ProcessRunner, RunError};
use servman::service::native::Unavailable;
use servman::service::Layout;
use servman::{MechanismChoice, Platform, ServiceDescriptor, ServiceError, ServiceManager};
use std::sync::{Arc, Mutex};

// Pretends that only update-rc.d and systemctl are installed
#[derive(Default)]
struct Debian {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ProcessRunner for Debian {
    async fn run(&self, program: &str, args: &[&str]) -> Result<(), RunError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));
        match program {
            "update-rc.d" | "systemctl" => Ok(()),
            _ => Err(RunError::NotFound),
        }
    }
}

fn manager(layout: &Layout, runner: Arc<Debian>) -> ServiceManager {
    ServiceManager::new(Platform::Unix, layout.clone(), runner, Arc::new(Unavailable))
}

fn descriptor() -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::new("myapp", "/opt/myapp/server.js");
    descriptor.interpreter = Some("/usr/bin/node".to_string());
    descriptor.program_args = vec!["--port".to_string(), "8080".to_string()];
    descriptor.dependencies = ["syslog", "network", "syslog"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    descriptor
}

#[tokio::test]
async fn test_init_script_without_chkconfig() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::under(root.path());
    std::fs::create_dir_all(&layout.init_dir).unwrap();
    let runner = Arc::new(Debian::default());
    let manager = manager(&layout, Arc::clone(&runner));

    let choice = manager.install(&descriptor()).await.unwrap();
    assert_eq!(choice, MechanismChoice::SysVInit);

    let path = root.path().join("etc/init.d/myapp");
    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("Provides:          myapp"));
    assert!(script.contains("# Required-Start:    network syslog\n"));
    assert!(script.contains(
        r#""/usr/bin/node" "/opt/myapp/server.js" "--port" "8080" >/dev/null 2>&1 &"#
    ));
    assert_eq!(
        *runner.calls.lock().unwrap(),
        vec!["chkconfig --add myapp", "update-rc.d myapp defaults"]
    );

    manager.remove("myapp").await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_systemd_unit_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::under(root.path());
    std::fs::create_dir_all(&layout.systemd_dir).unwrap();
    let runner = Arc::new(Debian::default());
    let manager = manager(&layout, Arc::clone(&runner));

    let mut descriptor = descriptor();
    descriptor.wanted_by = "graphical.target".to_string();
    manager.install(&descriptor).await.unwrap();

    let path = root.path().join("usr/lib/systemd/system/myapp.service");
    let unit = std::fs::read_to_string(&path).unwrap();
    assert!(unit.contains("ExecStart=/usr/bin/node /opt/myapp/server.js \"--port\" \"8080\"\n"));
    assert!(unit.contains("Requires=network syslog\n"));
    assert!(unit.contains("WantedBy=graphical.target"));

    manager.remove("myapp").await.unwrap();
    assert!(!path.exists());
    assert_eq!(
        *runner.calls.lock().unwrap(),
        vec!["systemctl enable myapp", "systemctl disable myapp"]
    );
}

#[tokio::test]
async fn test_remove_stays_inside_service_directories() {
    let root = tempfile::tempdir().unwrap();
    let layout = Layout::under(root.path());
    std::fs::create_dir_all(&layout.init_dir).unwrap();
    let shadow = root.path().join("etc/shadow");
    std::fs::write(&shadow, "root:*:19000:0:99999:7:::\n").unwrap();
    let runner = Arc::new(Debian::default());
    let manager = manager(&layout, Arc::clone(&runner));

    for name in &["../shadow", "..", ""] {
        let err = manager.remove(name).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::InvalidDescriptor { .. })
        ));
    }

    assert!(shadow.exists());
    assert!(runner.calls.lock().unwrap().is_empty());
}
