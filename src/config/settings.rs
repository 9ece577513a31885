// src/config/settings.rs
use crate::error::{Result, RippleError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const BASE_DIR_VAR: &str = "SPYGLASS_BASE_DIR";

/// Data directories under the base directory and their default folder names.
pub const RELATIVE_DIRS: [(&str, &str); 8] = [
    ("raw", "raw"),
    ("analysis", "analysis"),
    ("recording", "recording"),
    ("sorting", "spikesorting"),
    ("waveforms", "waveforms"),
    ("temp", "tmp"),
    ("video", "video"),
    ("logs", "logs"),
];

/// Directory settings as written in the config file. Unset entries fall back
/// to `SPYGLASS_<NAME>_DIR` and then to `<base>/<default folder>`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SettingsConfig {
    pub base_dir: Option<PathBuf>,
    pub dirs: BTreeMap<String, PathBuf>,
}

/// Fully resolved directories. Every entry exists on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySettings {
    pub base_dir: PathBuf,
    dirs: BTreeMap<String, PathBuf>,
}

/// Environment variable holding the override for directory `name`.
pub fn dir_var(name: &str) -> String {
    format!("SPYGLASS_{}_DIR", name.to_uppercase())
}

impl DirectorySettings {
    /// Resolves directories from the process environment.
    pub fn resolve(supplied_base: Option<&Path>, config: &SettingsConfig) -> Result<Self> {
        Self::resolve_with_env(supplied_base, config, |var| std::env::var_os(var).map(PathBuf::from))
    }

    /// Resolves directories with `env` standing in for the environment.
    ///
    /// Base: supplied argument, then config, then `SPYGLASS_BASE_DIR`; it must
    /// exist. Other directories: config, then environment (skipped when the
    /// base was supplied), then the default folder under the base. Missing
    /// directories are created.
    pub fn resolve_with_env<E>(
        supplied_base: Option<&Path>,
        config: &SettingsConfig,
        env: E,
    ) -> Result<Self>
    where
        E: Fn(&str) -> Option<PathBuf>,
    {
        let base_dir = supplied_base
            .map(Path::to_path_buf)
            .or_else(|| config.base_dir.clone())
            .or_else(|| env(BASE_DIR_VAR))
            .filter(|path| !path.as_os_str().is_empty());

        let base_dir = match base_dir {
            Some(path) if path.exists() => path,
            other => return Err(RippleError::MissingBaseDir(other)),
        };

        let mut dirs = BTreeMap::new();
        for (name, folder) in RELATIVE_DIRS {
            // Ignore env vars if the base was passed explicitly
            let env_dir = if supplied_base.is_none() {
                env(&dir_var(name))
            } else {
                None
            };
            let dir = config
                .dirs
                .get(name)
                .cloned()
                .or(env_dir)
                .unwrap_or_else(|| base_dir.join(folder));

            fs::create_dir_all(&dir).map_err(|e| RippleError::io(&dir, e))?;
            dirs.insert(name.to_string(), dir);
        }

        Ok(Self { base_dir, dirs })
    }

    pub fn dir(&self, name: &str) -> Option<&Path> {
        self.dirs.get(name).map(PathBuf::as_path)
    }

    fn known_dir(&self, name: &str) -> PathBuf {
        self.dirs
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.base_dir.join(name))
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.known_dir("analysis")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.known_dir("video")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.known_dir("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<PathBuf> {
        None
    }

    #[test]
    fn defaults_are_created_under_base() {
        let base = tempdir().unwrap();
        let settings =
            DirectorySettings::resolve_with_env(Some(base.path()), &SettingsConfig::default(), no_env)
                .unwrap();
        assert_eq!(settings.dir("sorting"), Some(base.path().join("spikesorting").as_path()));
        assert_eq!(settings.dir("temp"), Some(base.path().join("tmp").as_path()));
        assert!(settings.analysis_dir().is_dir());
        assert!(settings.logs_dir().is_dir());
    }

    #[test]
    fn config_dirs_win_over_environment() {
        let base = tempdir().unwrap();
        let custom = base.path().join("elsewhere");
        let env_analysis = base.path().join("from_env");
        let mut config = SettingsConfig {
            base_dir: Some(base.path().to_path_buf()),
            ..Default::default()
        };
        config.dirs.insert("raw".to_string(), custom.clone());

        let env = |var: &str| match var {
            "SPYGLASS_RAW_DIR" => Some(PathBuf::from("/nonexistent/raw")),
            "SPYGLASS_ANALYSIS_DIR" => Some(env_analysis.clone()),
            _ => None,
        };
        let settings = DirectorySettings::resolve_with_env(None, &config, env).unwrap();
        assert_eq!(settings.dir("raw"), Some(custom.as_path()));
        assert_eq!(settings.analysis_dir(), env_analysis);
    }

    #[test]
    fn environment_is_ignored_when_base_is_supplied() {
        let base = tempdir().unwrap();
        let other = tempdir().unwrap();
        let env = |var: &str| (var == "SPYGLASS_VIDEO_DIR").then(|| other.path().join("video"));
        let settings =
            DirectorySettings::resolve_with_env(Some(base.path()), &SettingsConfig::default(), env)
                .unwrap();
        assert_eq!(settings.video_dir(), base.path().join("video"));
    }

    #[test]
    fn base_falls_back_to_environment_and_must_exist() {
        let missing = DirectorySettings::resolve_with_env(None, &SettingsConfig::default(), no_env);
        assert!(matches!(missing, Err(RippleError::MissingBaseDir(None))));

        let env = |var: &str| (var == BASE_DIR_VAR).then(|| PathBuf::from("/nonexistent/base"));
        let absent = DirectorySettings::resolve_with_env(None, &SettingsConfig::default(), env);
        assert!(matches!(absent, Err(RippleError::MissingBaseDir(Some(_)))));
    }

    #[test]
    fn env_names_follow_directory_names() {
        assert_eq!(dir_var("analysis"), "SPYGLASS_ANALYSIS_DIR");
    }
}
