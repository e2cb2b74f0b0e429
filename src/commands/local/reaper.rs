use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A live entry of the OS process table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command: String,
}

pub trait ProcessTable {
    /// Look a PID up. `Ok(None)` means no such process.
    fn lookup(&self, pid: u32) -> io::Result<Option<ProcessEntry>>;

    /// Ask the process to exit. Does not wait for it.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Process table backed by `ps` and `kill`.
pub struct SystemProcesses;

impl ProcessTable for SystemProcesses {
    fn lookup(&self, pid: u32) -> io::Result<Option<ProcessEntry>> {
        let output = Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "command="])
            .output()?;
        if !output.status.success() {
            return Ok(None);
        }

        let command = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if command.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProcessEntry { pid, command }))
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        let pid_str = pid.to_string();
        let quiet_kill = Command::new("kill")
            .arg(&pid_str)
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if quiet_kill {
            return Ok(());
        }

        // The helper usually runs under sudo.
        let status = Command::new("sudo")
            .args(["kill", &pid_str])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        if !status.success() {
            return Err(io::Error::other(format!("sudo kill exited with {}", status)));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReapError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error parsing pid {contents:?}: {source}")]
    Parse {
        contents: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to look up pid {pid}: {source}")]
    Lookup {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to kill pid {pid} ({command}): {source}")]
    Terminate {
        pid: u32,
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale pid file {}: {source}", .path.display())]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a successful reap did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reaped {
    NoPidFile,
    /// The recorded process was gone; the PID file was removed.
    Stale(u32),
    /// A different program now owns the PID; the PID file was removed.
    Mismatch(u32),
    /// A termination request was sent. The helper removes its own PID file on exit.
    Terminated(u32),
}

/// Contents of the helper PID file: a PID, optionally followed by a line
/// naming the executable that wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PidRecord {
    pid: u32,
    identity: Option<String>,
}

impl PidRecord {
    fn parse(contents: &str) -> Result<Self, ReapError> {
        let mut lines = contents.lines().map(str::trim);
        let first = lines.next().unwrap_or_default();
        let pid = first.parse::<u32>().map_err(|source| ReapError::Parse {
            contents: contents.to_string(),
            source,
        })?;
        let identity = lines
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Ok(Self { pid, identity })
    }

    fn matches(&self, entry: &ProcessEntry) -> bool {
        match &self.identity {
            Some(identity) => entry.command.contains(identity.as_str()),
            None => true,
        }
    }
}

/// Stop the background helper tracked by `pid_path`, if it is still around.
pub fn reap_helper(pid_path: &Path, processes: &dyn ProcessTable) -> Result<Reaped, ReapError> {
    if !pid_path.exists() {
        return Ok(Reaped::NoPidFile);
    }

    log::debug!("Found {} ...", pid_path.display());
    let contents = fs::read_to_string(pid_path).map_err(|source| ReapError::Read {
        path: pid_path.to_path_buf(),
        source,
    })?;
    let record = PidRecord::parse(&contents)?;
    // kill 0 would signal our own process group.
    if record.pid == 0 {
        log::debug!("Ignoring pid 0 in {}", pid_path.display());
        remove_stale(pid_path)?;
        return Ok(Reaped::Stale(0));
    }

    let entry = processes
        .lookup(record.pid)
        .map_err(|source| ReapError::Lookup {
            pid: record.pid,
            source,
        })?;
    let Some(entry) = entry else {
        log::debug!("Stale pid: {}", record.pid);
        remove_stale(pid_path)?;
        return Ok(Reaped::Stale(record.pid));
    };

    if !record.matches(&entry) {
        log::warn!(
            "Ignoring pid {} from {}: it belongs to {:?}, not the helper",
            record.pid,
            pid_path.display(),
            entry.command
        );
        remove_stale(pid_path)?;
        return Ok(Reaped::Mismatch(record.pid));
    }

    log::debug!("Killing pid {} ({}) ...", entry.pid, entry.command);
    if let Err(source) = processes.terminate(entry.pid) {
        log::debug!(
            "Kill failed with {} - removing probably stale pid...",
            source
        );
        remove_stale(pid_path)?;
        return Err(ReapError::Terminate {
            pid: entry.pid,
            command: entry.command,
            source,
        });
    }
    Ok(Reaped::Terminated(entry.pid))
}

fn remove_stale(pid_path: &Path) -> Result<(), ReapError> {
    fs::remove_file(pid_path).map_err(|source| ReapError::RemoveStale {
        path: pid_path.to_path_buf(),
        source,
    })
}
