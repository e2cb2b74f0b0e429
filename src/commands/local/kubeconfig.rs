use serde_yaml::Value;
use std::error::Error;
use std::fs;
use std::io;
use std::path::Path;

const NAMED_SECTIONS: [&str; 3] = ["clusters", "contexts", "users"];

/// Edits the credentials file that kubectl reads.
pub trait CredentialsEditor {
    /// Drop every entry that belongs to `profile` from the file at `path`.
    fn remove_entry(&self, path: &Path, profile: &str) -> Result<(), Box<dyn Error>>;
}

pub struct Kubeconfig;

impl CredentialsEditor for Kubeconfig {
    fn remove_entry(&self, path: &Path, profile: &str) -> Result<(), Box<dyn Error>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("No kubeconfig at {}, nothing to update", path.display());
                return Ok(());
            }
            Err(err) => return Err(format!("Failed to read {}: {}", path.display(), err).into()),
        };

        let Some(updated) = without_profile(&raw, profile)? else {
            return Ok(());
        };
        fs::write(path, updated)
            .map_err(|err| format!("Failed to write {}: {}", path.display(), err))?;
        log::debug!("Removed \"{}\" from {}", profile, path.display());
        Ok(())
    }
}

/// Returns the rewritten document, or `None` when nothing referenced `profile`.
fn without_profile(raw: &str, profile: &str) -> Result<Option<String>, Box<dyn Error>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let mut doc: Value = serde_yaml::from_str(raw)?;
    let Some(root) = doc.as_mapping_mut() else {
        return Err("kubeconfig is not a YAML mapping".into());
    };

    let mut changed = false;
    for section in NAMED_SECTIONS {
        if let Some(Value::Sequence(entries)) = root.get_mut(section) {
            let before = entries.len();
            entries.retain(|entry| entry.get("name").and_then(Value::as_str) != Some(profile));
            changed |= entries.len() != before;
        }
    }

    if root.get("current-context").and_then(Value::as_str) == Some(profile) {
        root.insert(
            Value::String("current-context".to_string()),
            Value::String(String::new()),
        );
        changed = true;
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(serde_yaml::to_string(&doc)?))
}
