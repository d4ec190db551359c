//! Running-config backup artifacts.
//!
//! Before a push, the reconciliation module can write the fetched running
//! config to disk. The default artifact name embeds the device identifier and
//! the local wall-clock time, `<hostname>_config.<YYYY-MM-DD>@<HH:MM:SS>`,
//! in a `./backup/` directory created on demand; both the directory and the
//! filename can be overridden.

use crate::modules::{ModuleError, ModuleResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Operator overrides for the backup artifact location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupOptions {
    /// Artifact filename, defaults to `<hostname>_config.<date>@<time>`
    #[serde(default)]
    pub filename: Option<String>,
    /// Target directory, defaults to `./backup`; `~` and env vars expand
    #[serde(default)]
    pub dir_path: Option<String>,
}

/// Where a backup landed, echoed back in the module result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub backup_path: PathBuf,
    pub filename: String,
    pub date: String,
    pub time: String,
}

/// Write `contents` to a backup artifact for `hostname`.
pub fn write_backup(
    hostname: &str,
    contents: &str,
    options: &BackupOptions,
) -> ModuleResult<BackupArtifact> {
    let now = Local::now();
    let date = now.format("%Y-%m-%d").to_string();
    let time = now.format("%H:%M:%S").to_string();

    let dir: PathBuf = match &options.dir_path {
        Some(dir) => {
            let expanded = shellexpand::full(dir).map_err(|e| {
                ModuleError::InvalidParameter(format!("Invalid backup dir_path '{dir}': {e}"))
            })?;
            PathBuf::from(expanded.as_ref())
        }
        None => PathBuf::from("backup"),
    };
    if !dir.is_dir() {
        fs::create_dir_all(&dir)?;
    }

    let filename = match &options.filename {
        Some(name) => name.clone(),
        None => format!("{hostname}_config.{date}@{time}"),
    };

    let backup_path = dir.join(&filename);
    fs::write(&backup_path, contents)?;
    debug!(path = %backup_path.display(), "wrote running-config backup");

    Ok(BackupArtifact {
        backup_path,
        filename,
        date,
        time,
    })
}

/// Expand and read a source file path given as a module parameter.
pub fn read_src_file(path: &str) -> ModuleResult<String> {
    let expanded = shellexpand::full(path)
        .map_err(|e| ModuleError::InvalidParameter(format!("Invalid src path '{path}': {e}")))?;
    let path = Path::new(expanded.as_ref());
    fs::read_to_string(path).map_err(|e| {
        ModuleError::ExecutionFailed(format!("Unable to read src {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_filename_shape() {
        let dir = tempdir().unwrap();
        let options = BackupOptions {
            filename: None,
            dir_path: Some(dir.path().to_string_lossy().into_owned()),
        };

        let artifact = write_backup("acos-lb1", "hostname acos-lb1\n", &options).unwrap();
        assert!(artifact.filename.starts_with("acos-lb1_config."));
        assert!(artifact.filename.contains('@'));
        assert_eq!(
            fs::read_to_string(&artifact.backup_path).unwrap(),
            "hostname acos-lb1\n"
        );
    }

    #[test]
    fn test_explicit_filename_and_dir() {
        let dir = tempdir().unwrap();
        let options = BackupOptions {
            filename: Some("golden.cfg".to_string()),
            dir_path: Some(dir.path().to_string_lossy().into_owned()),
        };

        let artifact = write_backup("acos-lb1", "x", &options).unwrap();
        assert_eq!(artifact.filename, "golden.cfg");
        assert_eq!(artifact.backup_path, dir.path().join("golden.cfg"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deep").join("backups");
        let options = BackupOptions {
            filename: Some("cfg".to_string()),
            dir_path: Some(nested.to_string_lossy().into_owned()),
        };

        let artifact = write_backup("h", "contents", &options).unwrap();
        assert!(artifact.backup_path.exists());
    }

    #[test]
    fn test_read_src_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candidate.cfg");
        fs::write(&path, "ip dns primary 10.18.18.81\n").unwrap();

        let contents = read_src_file(&path.to_string_lossy()).unwrap();
        assert!(contents.contains("10.18.18.81"));
    }

    #[test]
    fn test_read_src_file_missing() {
        let err = read_src_file("/nonexistent/candidate.cfg").unwrap_err();
        assert!(err.to_string().contains("Unable to read src"));
    }
}
