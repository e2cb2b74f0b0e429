use super::{command_exists, run_cmd, run_cmd_output};
use serde::Deserialize;
use std::error::Error;

/// The host backing a profile is already gone.
#[derive(Debug, thiserror::Error)]
#[error("host \"{name}\" does not exist")]
pub struct HostDoesNotExist {
    pub name: String,
}

/// How a failed host deletion should be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostFailure {
    Absent,
    Other,
}

/// Classify a host deletion error by walking its cause chain.
pub fn classify(err: &(dyn Error + 'static)) -> HostFailure {
    let mut cause = Some(err);
    while let Some(current) = cause {
        if current.downcast_ref::<HostDoesNotExist>().is_some() {
            return HostFailure::Absent;
        }
        cause = current.source();
    }
    HostFailure::Other
}

/// Entry point to the VM management tooling.
pub trait MachineApi {
    /// Open a client. The returned handle is released when dropped.
    fn connect(&self) -> Result<Box<dyn MachineHandle>, Box<dyn Error>>;
}

pub trait MachineHandle {
    fn delete_host(&self, name: &str) -> Result<(), Box<dyn Error>>;
}

#[derive(Debug, Deserialize)]
struct ColimaInstance {
    name: String,
}

/// Colima-backed hosts, driven through the `colima` CLI.
pub struct Colima;

impl MachineApi for Colima {
    fn connect(&self) -> Result<Box<dyn MachineHandle>, Box<dyn Error>> {
        log::debug!("Opened colima client");
        Ok(Box::new(ColimaClient))
    }
}

struct ColimaClient;

impl MachineHandle for ColimaClient {
    fn delete_host(&self, name: &str) -> Result<(), Box<dyn Error>> {
        // In-place profiles are usually deleted on hosts that never had colima.
        if !command_exists("colima") {
            return Err(
                "colima is not installed or not in PATH (install it, e.g. `brew install colima`)"
                    .into(),
            );
        }
        let listing = run_cmd_output("colima", &["list", "--json"])?;
        if !listed_instances(&listing)?.iter().any(|i| i == name) {
            return Err(Box::new(HostDoesNotExist {
                name: name.to_string(),
            }));
        }

        log::info!("Deleting Colima VM \"{}\"...", name);
        run_cmd("colima", &["delete", "--profile", name, "--force"])
    }
}

impl Drop for ColimaClient {
    fn drop(&mut self) {
        log::debug!("Closed colima client");
    }
}

/// `colima list --json` prints one JSON object per instance.
fn listed_instances(output: &str) -> Result<Vec<String>, Box<dyn Error>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| -> Result<String, Box<dyn Error>> {
            let instance: ColimaInstance = serde_json::from_str(line)
                .map_err(|err| format!("unexpected colima list output {:?}: {}", line, err))?;
            Ok(instance.name)
        })
        .collect()
}
