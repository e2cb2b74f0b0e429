use super::profile::ClusterConfig;
use super::run_cmd;
use std::error::Error;

const K3S_UNINSTALL_SCRIPT: &str = "/usr/local/bin/k3s-uninstall.sh";

/// Installs and removes Kubernetes for profiles that run on this host.
pub trait Bootstrapper {
    fn uninstall(&self, config: &ClusterConfig) -> Result<(), Box<dyn Error>>;
}

pub trait BootstrapperResolver {
    fn resolve(&self, name: &str) -> Result<Box<dyn Bootstrapper>, Box<dyn Error>>;
}

/// Resolves the bootstrappers shipped with the CLI.
pub struct Bootstrappers;

impl BootstrapperResolver for Bootstrappers {
    fn resolve(&self, name: &str) -> Result<Box<dyn Bootstrapper>, Box<dyn Error>> {
        match name.trim().to_ascii_lowercase().as_str() {
            "k3s" => Ok(Box::new(K3s)),
            "kubeadm" => Ok(Box::new(Kubeadm)),
            other => Err(format!("unknown bootstrapper: {:?}", other).into()),
        }
    }
}

struct K3s;

impl Bootstrapper for K3s {
    fn uninstall(&self, _config: &ClusterConfig) -> Result<(), Box<dyn Error>> {
        run_cmd("sudo", &[K3S_UNINSTALL_SCRIPT])
    }
}

struct Kubeadm;

impl Bootstrapper for Kubeadm {
    fn uninstall(&self, _config: &ClusterConfig) -> Result<(), Box<dyn Error>> {
        run_cmd("sudo", &["kubeadm", "reset", "--force"])
    }
}
