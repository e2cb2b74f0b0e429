use std::error::Error;
use std::path::{Component, Path, PathBuf};

const HOME_OVERRIDE_ENV: &str = "HOPS_LOCAL_HOME";
const DEFAULT_STATE_DIR: &str = ".hops/local";
const REGISTRY_FILE: &str = "profiles.json";
const PROFILE_CONFIG_FILE: &str = "config.json";
const HELPER_PID_FILE: &str = "kubefwd.pid";

/// Profile names are joined onto the state root, so they must be exactly one
/// plain path component: no separators, no `.`/`..`, not absolute.
pub fn is_valid_profile_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// On-disk locations of the local environment state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
    kubeconfig: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    /// Resolve the layout from `HOPS_LOCAL_HOME`, `KUBECONFIG` and `HOME`.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let home = std::env::var("HOME").ok();
        let override_root = std::env::var(HOME_OVERRIDE_ENV).ok();
        let kubeconfig = std::env::var("KUBECONFIG").ok();
        Self::resolve(
            home.as_deref(),
            override_root.as_deref(),
            kubeconfig.as_deref(),
        )
    }

    fn resolve(
        home: Option<&str>,
        override_root: Option<&str>,
        kubeconfig: Option<&str>,
    ) -> Result<Self, Box<dyn Error>> {
        let home = home.map(str::trim).filter(|h| !h.is_empty());

        let root = match override_root.map(str::trim).filter(|r| !r.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => {
                let home = home.ok_or(
                    "HOME is not set; unable to determine the local state directory (set HOPS_LOCAL_HOME)",
                )?;
                Path::new(home).join(DEFAULT_STATE_DIR)
            }
        };

        // KUBECONFIG may hold a path list; edits go to the first entry.
        let kubeconfig = match kubeconfig
            .and_then(|list| list.split(':').map(str::trim).find(|p| !p.is_empty()))
        {
            Some(path) => PathBuf::from(path),
            None => {
                let home = home.ok_or("HOME is not set; unable to locate the kubeconfig")?;
                Path::new(home).join(".kube").join("config")
            }
        };

        Ok(Self::new(root, kubeconfig))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn helper_pid_file(&self) -> PathBuf {
        self.root.join(HELPER_PID_FILE)
    }

    pub fn machine_dir(&self, profile: &str) -> PathBuf {
        self.root.join("machines").join(profile)
    }

    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.root.join("profiles").join(profile)
    }

    pub fn profile_config(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join(PROFILE_CONFIG_FILE)
    }
}
