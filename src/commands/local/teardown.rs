use super::bootstrap::BootstrapperResolver;
use super::kubeconfig::CredentialsEditor;
use super::layout::{is_valid_profile_name, StateLayout};
use super::machine::{classify, HostFailure, MachineApi, MachineHandle};
use super::profile::{ClusterConfig, ProfileRegistry, StoreError};
use super::reaper::{reap_helper, ProcessTable, Reaped};
use super::remove_dir_if_present;

/// Collaborators used to tear a profile down.
pub struct Teardown<'a> {
    pub layout: &'a StateLayout,
    pub registry: &'a dyn ProfileRegistry,
    pub machines: &'a dyn MachineApi,
    pub bootstrappers: &'a dyn BootstrapperResolver,
    pub credentials: &'a dyn CredentialsEditor,
    pub processes: &'a dyn ProcessTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Connect,
    LoadConfig,
    UninstallRuntime,
    ReapHelper,
    DeleteHost,
    RemoveDirectories,
    DeleteMetadata,
    RemoveCredentials,
    ClearActive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped,
    Warned(String),
}

/// A failure that ends the teardown of one profile.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("invalid profile name {0:?}: must be a single path component")]
    InvalidName(String),
    #[error("error getting machine client: {0}")]
    Connect(String),
    #[error("failed to remove profile: {0}")]
    Metadata(#[source] StoreError),
    #[error("failed to update kubeconfig: {0}")]
    Credentials(String),
    #[error("failed to clear active profile: {0}")]
    ClearActive(#[source] StoreError),
}

#[derive(Debug)]
pub enum ProfileStatus {
    Deleted,
    /// The metadata entry was already gone; the remaining cleanup still ran.
    AlreadyAbsent,
    Failed(StepError),
}

#[derive(Debug)]
pub struct ProfileOutcome {
    pub name: String,
    pub steps: Vec<(Step, StepStatus)>,
    pub status: ProfileStatus,
}

impl ProfileOutcome {
    #[cfg(test)]
    pub fn step(&self, step: Step) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|(recorded, _)| *recorded == step)
            .map(|(_, status)| status)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ProfileStatus::Failed(_))
    }

    pub fn warnings(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, status)| matches!(status, StepStatus::Warned(_)))
            .count()
    }
}

impl Teardown<'_> {
    /// Tear down everything that belongs to `name`.
    ///
    /// Soft failures are logged and recorded as warnings; the sequence only
    /// stops early for the failures listed in [`StepError`].
    pub fn delete_profile(&self, name: &str) -> ProfileOutcome {
        let mut steps = Vec::new();
        let status = match self.run_steps(name, &mut steps) {
            Ok(status) => status,
            Err(err) => {
                log::error!("Deleting \"{}\" failed: {}", name, err);
                ProfileStatus::Failed(err)
            }
        };
        ProfileOutcome {
            name: name.to_string(),
            steps,
            status,
        }
    }

    fn run_steps(
        &self,
        name: &str,
        steps: &mut Vec<(Step, StepStatus)>,
    ) -> Result<ProfileStatus, StepError> {
        log::debug!("Deleting profile \"{}\"", name);
        if !is_valid_profile_name(name) {
            return Err(StepError::InvalidName(name.to_string()));
        }

        // Released when dropped, on every return path below.
        let machine = self
            .machines
            .connect()
            .map_err(|err| StepError::Connect(err.to_string()))?;
        steps.push((Step::Connect, StepStatus::Done));

        let (config, status) = self.load_config(name);
        steps.push((Step::LoadConfig, status));

        let status = match config.as_ref().filter(|config| config.is_in_place()) {
            Some(config) => self.uninstall_runtime(config),
            None => StepStatus::Skipped,
        };
        steps.push((Step::UninstallRuntime, status));

        steps.push((Step::ReapHelper, self.reap_helper()));
        steps.push((Step::DeleteHost, delete_host(machine.as_ref(), name)));
        steps.push((Step::RemoveDirectories, self.remove_directories(name)));

        let status = match self.registry.remove(name) {
            Ok(()) => {
                log::info!("The \"{}\" cluster has been deleted.", name);
                steps.push((Step::DeleteMetadata, StepStatus::Done));
                ProfileStatus::Deleted
            }
            Err(err) if err.is_not_found() => {
                log::info!("\"{}\" profile does not exist", name);
                steps.push((Step::DeleteMetadata, StepStatus::Skipped));
                ProfileStatus::AlreadyAbsent
            }
            Err(err) => return Err(StepError::Metadata(err)),
        };

        self.credentials
            .remove_entry(self.layout.kubeconfig(), name)
            .map_err(|err| StepError::Credentials(err.to_string()))?;
        steps.push((Step::RemoveCredentials, StepStatus::Done));

        let cleared = self
            .registry
            .clear_active(name)
            .map_err(StepError::ClearActive)?;
        if cleared {
            log::debug!("Cleared active profile \"{}\"", name);
        }
        steps.push((
            Step::ClearActive,
            if cleared {
                StepStatus::Done
            } else {
                StepStatus::Skipped
            },
        ));

        Ok(status)
    }

    fn load_config(&self, name: &str) -> (Option<ClusterConfig>, StepStatus) {
        match self.registry.load_config(name) {
            Ok(config) => (Some(config), StepStatus::Done),
            Err(err) if err.is_not_found() => {
                log::debug!("No configuration for \"{}\", continuing", name);
                (None, StepStatus::Skipped)
            }
            Err(err) => {
                log::warn!("Error loading profile {}: {}", name, err);
                (None, StepStatus::Warned(err.to_string()))
            }
        }
    }

    /// Profiles without a VM get Kubernetes removed from this host instead.
    fn uninstall_runtime(&self, config: &ClusterConfig) -> StepStatus {
        log::info!(
            "Uninstalling Kubernetes {} using {} ...",
            config.kubernetes_version,
            config.bootstrapper
        );
        let bootstrapper = match self.bootstrappers.resolve(&config.bootstrapper) {
            Ok(bootstrapper) => bootstrapper,
            Err(err) => {
                log::warn!("Unable to get bootstrapper: {}", err);
                return StepStatus::Warned(err.to_string());
            }
        };
        match bootstrapper.uninstall(config) {
            Ok(()) => StepStatus::Done,
            Err(err) => {
                log::warn!("Failed to delete cluster: {}", err);
                StepStatus::Warned(err.to_string())
            }
        }
    }

    fn reap_helper(&self) -> StepStatus {
        match reap_helper(&self.layout.helper_pid_file(), self.processes) {
            Ok(Reaped::NoPidFile) => StepStatus::Skipped,
            Ok(Reaped::Stale(pid) | Reaped::Mismatch(pid)) => {
                log::debug!("Removed stale kubefwd pid file (pid {})", pid);
                StepStatus::Done
            }
            Ok(Reaped::Terminated(pid)) => {
                log::info!("Stopped kubefwd (pid {})", pid);
                StepStatus::Done
            }
            Err(err) => {
                log::warn!("Failed to kill kubefwd process: {}", err);
                StepStatus::Warned(err.to_string())
            }
        }
    }

    /// Runs regardless of the host deletion result, in case it only got part way.
    fn remove_directories(&self, name: &str) -> StepStatus {
        let mut removed = false;
        let mut failures = Vec::new();
        for dir in [self.layout.machine_dir(name), self.layout.profile_dir(name)] {
            match remove_dir_if_present(&dir) {
                Ok(existed) => removed |= existed,
                Err(err) => {
                    log::warn!("Unable to remove {}: {}", dir.display(), err);
                    failures.push(format!("{}: {}", dir.display(), err));
                }
            }
        }

        if !failures.is_empty() {
            StepStatus::Warned(failures.join("; "))
        } else if removed {
            StepStatus::Done
        } else {
            StepStatus::Skipped
        }
    }
}

fn delete_host(machine: &dyn MachineHandle, name: &str) -> StepStatus {
    let Err(err) = machine.delete_host(name) else {
        return StepStatus::Done;
    };
    match classify(err.as_ref()) {
        HostFailure::Absent => {
            log::info!(
                "\"{}\" cluster does not exist. Proceeding ahead with cleanup.",
                name
            );
            StepStatus::Skipped
        }
        HostFailure::Other => {
            log::warn!("Failed to delete cluster: {}", err);
            log::info!(
                "You may need to manually remove the \"{}\" VM from your hypervisor",
                name
            );
            StepStatus::Warned(err.to_string())
        }
    }
}
