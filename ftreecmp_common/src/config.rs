use crate::{AppConfig, FTreeCmpError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "ftreecmp.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: Option<PathBuf>,
    pub exists: bool,
}

/// Load the configuration file.
///
/// An explicit path must exist. Without one, the per-user config directory is
/// consulted and a missing file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, FTreeCmpError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(FTreeCmpError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let config = read_config(path)?;
        return Ok(LoadedConfig {
            config,
            path: Some(path.to_path_buf()),
            exists: true,
        });
    }

    let path = default_config_path();
    let exists = path.as_deref().map_or(false, Path::exists);

    let config = match &path {
        Some(path) if exists => read_config(path)?,
        _ => AppConfig::default(),
    };

    Ok(LoadedConfig {
        config,
        path,
        exists,
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ftreecmp").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<AppConfig, FTreeCmpError> {
    let data = fs::read_to_string(path)?;
    let config: AppConfig =
        toml::from_str(&data).map_err(|e| FTreeCmpError::Serialization(e.to_string()))?;

    if config.chunk_size == 0 {
        return Err(FTreeCmpError::Config(format!(
            "chunk_size must be positive in {}",
            path.display()
        )));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IgnoreRule;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "ignore = [\"elf-buildid\"]\npackage_name = \"coreutils\"\nchunk_size = 4096\n",
        )
        .unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert!(loaded.exists);
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(
            loaded.config,
            AppConfig {
                ignore: vec![IgnoreRule::ElfBuildId],
                package_name: Some("coreutils".to_string()),
                chunk_size: 4096,
            }
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "package_name = \"bash\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().config;
        assert_eq!(config.package_name.as_deref(), Some("bash"));
        assert!(config.ignore.is_empty());
        assert_eq!(config.chunk_size, crate::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, FTreeCmpError::Config(_)));
    }

    #[test]
    fn test_malformed_config_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "ignore = [\"no-such-rule\"]\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, FTreeCmpError::Serialization(_)));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "chunk_size = 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, FTreeCmpError::Config(_)));
    }
}
