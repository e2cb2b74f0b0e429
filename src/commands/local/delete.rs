use super::bootstrap::Bootstrappers;
use super::kubeconfig::Kubeconfig;
use super::layout::StateLayout;
use super::machine::Colima;
use super::profile::FileRegistry;
use super::reaper::SystemProcesses;
use super::remove_dir_if_present;
use super::teardown::{ProfileOutcome, Teardown};
use clap::Args;
use std::error::Error;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Also delete the whole local state directory (~/.hops/local)
    #[arg(long)]
    pub purge: bool,

    /// Allow --purge to delete every profile when more than one exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug)]
pub enum RunReport {
    /// `--purge` found several profiles without `--force`; nothing was touched.
    Guarded(Vec<String>),
    Completed {
        outcomes: Vec<ProfileOutcome>,
        purged: bool,
    },
}

pub fn run(args: &DeleteArgs) -> Result<(), Box<dyn Error>> {
    let layout = StateLayout::from_env()?;
    let registry = FileRegistry::new(layout.clone());
    let teardown = Teardown {
        layout: &layout,
        registry: &registry,
        machines: &Colima,
        bootstrappers: &Bootstrappers,
        credentials: &Kubeconfig,
        processes: &SystemProcesses,
    };

    let report = execute(&teardown, args.purge, args.force)?;
    summarize(&report)
}

/// Delete every known profile, then the state root when `purge` is set.
pub fn execute(teardown: &Teardown, purge: bool, force: bool) -> Result<RunReport, Box<dyn Error>> {
    let profiles = match teardown.registry.list() {
        Ok(profiles) => profiles,
        Err(err) if purge && force => {
            log::warn!("Unable to list profiles ({}), purging anyway", err);
            Vec::new()
        }
        Err(err) => return Err(format!("Unable to list profiles: {}", err).into()),
    };

    if purge && profiles.len() > 1 && !force {
        log::warn!("Multiple local profiles were found -");
        for profile in &profiles {
            log::info!("    - {}", profile);
        }
        log::info!("Please use --force to delete all of the configuration and the profiles.");
        return Ok(RunReport::Guarded(profiles));
    }

    let outcomes: Vec<ProfileOutcome> = profiles
        .iter()
        .map(|profile| teardown.delete_profile(profile))
        .collect();

    if purge {
        let root = teardown.layout.root();
        log::debug!("Purging the local state directory located at {}", root.display());
        remove_dir_if_present(root).map_err(|err| {
            format!(
                "Unable to delete local state directory {}: {}",
                root.display(),
                err
            )
        })?;
        log::info!(
            "Successfully purged local state directory located at - [{}]",
            root.display()
        );
    }

    Ok(RunReport::Completed {
        outcomes,
        purged: purge,
    })
}

fn summarize(report: &RunReport) -> Result<(), Box<dyn Error>> {
    let RunReport::Completed { outcomes, purged } = report else {
        return Ok(());
    };
    if outcomes.is_empty() && !purged {
        log::info!("No local profiles found");
        return Ok(());
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|outcome| outcome.is_failure())
        .map(|outcome| outcome.name.as_str())
        .collect();
    for outcome in outcomes {
        log::debug!(
            "{}: {:?} ({} warning(s))",
            outcome.name,
            outcome.status,
            outcome.warnings()
        );
    }

    if failed.is_empty() {
        return Ok(());
    }
    Err(format!(
        "failed to delete {} of {} profile(s): {}",
        failed.len(),
        outcomes.len(),
        failed.join(", ")
    )
    .into())
}
