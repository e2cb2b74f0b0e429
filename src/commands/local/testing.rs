//! In-memory collaborators and on-disk fixtures for unit tests.

use super::bootstrap::{Bootstrapper, BootstrapperResolver};
use super::kubeconfig::CredentialsEditor;
use super::layout::StateLayout;
use super::machine::{HostDoesNotExist, MachineApi, MachineHandle};
use super::profile::ClusterConfig;
use super::reaper::{ProcessEntry, ProcessTable};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Default)]
pub struct FakeProcesses {
    live: HashMap<u32, String>,
    fail_terminate: bool,
    terminated: RefCell<Vec<u32>>,
}

impl FakeProcesses {
    pub fn with_process(mut self, pid: u32, command: &str) -> Self {
        self.live.insert(pid, command.to_string());
        self
    }

    pub fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.borrow().clone()
    }
}

impl ProcessTable for FakeProcesses {
    fn lookup(&self, pid: u32) -> io::Result<Option<ProcessEntry>> {
        Ok(self.live.get(&pid).map(|command| ProcessEntry {
            pid,
            command: command.clone(),
        }))
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        if self.fail_terminate {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.terminated.borrow_mut().push(pid);
        Ok(())
    }
}

#[derive(Default)]
struct MachineState {
    hosts: HashSet<String>,
    failing: HashSet<String>,
    tool_missing: bool,
    deleted: Vec<String>,
    open_handles: usize,
}

#[derive(Default)]
pub struct FakeMachines {
    state: Rc<RefCell<MachineState>>,
    connects: Cell<usize>,
}

impl FakeMachines {
    pub fn with_hosts(hosts: &[&str]) -> Self {
        let machines = Self::default();
        machines
            .state
            .borrow_mut()
            .hosts
            .extend(hosts.iter().map(|h| h.to_string()));
        machines
    }

    pub fn failing_delete(self, host: &str) -> Self {
        self.state.borrow_mut().failing.insert(host.to_string());
        self
    }

    /// Host tooling is not installed; every deletion fails with a plain error.
    pub fn without_tool(self) -> Self {
        self.state.borrow_mut().tool_missing = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.get()
    }

    pub fn open_handles(&self) -> usize {
        self.state.borrow().open_handles
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.borrow().deleted.clone()
    }
}

impl MachineApi for FakeMachines {
    fn connect(&self) -> Result<Box<dyn MachineHandle>, Box<dyn Error>> {
        self.connects.set(self.connects.get() + 1);
        self.state.borrow_mut().open_handles += 1;
        Ok(Box::new(FakeHandle {
            state: Rc::clone(&self.state),
        }))
    }
}

struct FakeHandle {
    state: Rc<RefCell<MachineState>>,
}

impl MachineHandle for FakeHandle {
    fn delete_host(&self, name: &str) -> Result<(), Box<dyn Error>> {
        let mut state = self.state.borrow_mut();
        if state.tool_missing {
            return Err("colima is not installed or not in PATH".into());
        }
        if state.failing.contains(name) {
            return Err(format!("hypervisor refused to delete {}", name).into());
        }
        if !state.hosts.remove(name) {
            return Err(Box::new(HostDoesNotExist {
                name: name.to_string(),
            }));
        }
        state.deleted.push(name.to_string());
        Ok(())
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().open_handles -= 1;
    }
}

#[derive(Default)]
pub struct FakeBootstrappers {
    uninstalled: Rc<RefCell<Vec<String>>>,
    fail_uninstall: bool,
}

impl FakeBootstrappers {
    pub fn failing_uninstall(mut self) -> Self {
        self.fail_uninstall = true;
        self
    }

    pub fn uninstalled(&self) -> Vec<String> {
        self.uninstalled.borrow().clone()
    }
}

impl BootstrapperResolver for FakeBootstrappers {
    fn resolve(&self, name: &str) -> Result<Box<dyn Bootstrapper>, Box<dyn Error>> {
        if name != "k3s" {
            return Err(format!("unknown bootstrapper: {:?}", name).into());
        }
        Ok(Box::new(FakeBootstrapper {
            uninstalled: Rc::clone(&self.uninstalled),
            fail: self.fail_uninstall,
        }))
    }
}

struct FakeBootstrapper {
    uninstalled: Rc<RefCell<Vec<String>>>,
    fail: bool,
}

impl Bootstrapper for FakeBootstrapper {
    fn uninstall(&self, config: &ClusterConfig) -> Result<(), Box<dyn Error>> {
        if self.fail {
            return Err("uninstall script exited with exit status: 1".into());
        }
        self.uninstalled
            .borrow_mut()
            .push(config.kubernetes_version.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    removed: RefCell<Vec<String>>,
    fail_for: HashSet<String>,
}

impl FakeCredentials {
    pub fn failing_for(mut self, profile: &str) -> Self {
        self.fail_for.insert(profile.to_string());
        self
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.borrow().clone()
    }
}

impl CredentialsEditor for FakeCredentials {
    fn remove_entry(&self, _path: &Path, profile: &str) -> Result<(), Box<dyn Error>> {
        if self.fail_for.contains(profile) {
            return Err("kubeconfig is not a YAML mapping".into());
        }
        self.removed.borrow_mut().push(profile.to_string());
        Ok(())
    }
}

/// A state root in a temp dir, laid out the way `hops local start` leaves it.
pub struct StateFixture {
    _dir: tempfile::TempDir,
    pub layout: StateLayout,
}

impl StateFixture {
    pub fn new(profiles: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("local");
        let layout = StateLayout::new(&root, dir.path().join("kubeconfig"));
        fs::create_dir_all(&root).unwrap();

        let fixture = Self { _dir: dir, layout };
        fixture.write_registry(profiles, None);
        for profile in profiles {
            fixture.add_profile_state(profile, "colima");
        }
        fixture
    }

    pub fn write_registry(&self, profiles: &[&str], active: Option<&str>) {
        let doc = serde_json::json!({ "active": active, "profiles": profiles });
        fs::write(self.layout.registry_file(), doc.to_string()).unwrap();
    }

    pub fn add_profile_state(&self, profile: &str, driver: &str) {
        fs::create_dir_all(self.layout.machine_dir(profile)).unwrap();
        fs::create_dir_all(self.layout.profile_dir(profile)).unwrap();
        let config = serde_json::json!({
            "driver": driver,
            "kubernetes_version": "v1.31.0",
        });
        fs::write(self.layout.profile_config(profile), config.to_string()).unwrap();
    }

    pub fn write_pid_file(&self, contents: &str) -> PathBuf {
        let path = self.layout.helper_pid_file();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn registry_raw(&self) -> String {
        fs::read_to_string(self.layout.registry_file()).unwrap()
    }

    pub fn has_profile_dirs(&self, profile: &str) -> bool {
        self.layout.machine_dir(profile).exists() || self.layout.profile_dir(profile).exists()
    }
}
