mod bootstrap;
mod delete;
mod kubeconfig;
mod layout;
mod machine;
mod profile;
mod reaper;
mod teardown;
#[cfg(test)]
mod testing;

use clap::{Args, Subcommand};
use std::error::Error;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

#[derive(Args, Debug)]
pub struct LocalArgs {
    #[command(subcommand)]
    pub command: LocalCommands,
}

#[derive(Subcommand, Debug)]
pub enum LocalCommands {
    /// Delete local clusters and remove their state
    Delete(delete::DeleteArgs),
}

pub fn run(args: &LocalArgs) -> Result<(), Box<dyn Error>> {
    match &args.command {
        LocalCommands::Delete(delete_args) => delete::run(delete_args),
    }
}

/// Run an external command with inherited stdio. Fails on non-zero exit.
pub fn run_cmd(program: &str, args: &[&str]) -> Result<(), Box<dyn Error>> {
    log::debug!("Running: {} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        return Err(format!("{} exited with {}", program, status).into());
    }
    Ok(())
}

/// Run an external command and capture stdout.
pub fn run_cmd_output(program: &str, args: &[&str]) -> Result<String, Box<dyn Error>> {
    log::debug!("Running: {} {}", program, args.join(" "));
    let output = Command::new(program).args(args).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", program, output.status, stderr).into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn command_exists(program: &str) -> bool {
    Command::new("sh")
        .args(["-c", &format!("command -v {} >/dev/null 2>&1", program)])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Recursively remove `dir`. Returns false when there was nothing to remove.
fn remove_dir_if_present(dir: &Path) -> io::Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    log::info!("Removing {} ...", dir.display());
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        command: LocalCommands,
    }

    #[test]
    fn remove_dir_if_present_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("machines").join("dev");
        fs::create_dir_all(target.join("disk")).unwrap();
        fs::write(target.join("disk").join("image.raw"), b"data").unwrap();

        assert!(remove_dir_if_present(&target).unwrap());
        assert!(!target.exists());
        assert!(!remove_dir_if_present(&target).unwrap());
    }

    #[test]
    fn delete_accepts_purge_and_force() {
        let cli = Cli::try_parse_from(["local", "delete", "--purge", "--force"]).unwrap();
        let LocalCommands::Delete(args) = cli.command;
        assert!(args.purge);
        assert!(args.force);
    }

    #[test]
    fn delete_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["local", "delete", "dev"]).is_err());
    }
}
