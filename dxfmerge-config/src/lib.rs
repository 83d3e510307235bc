use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFMERGE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFMERGE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        match locate(env::var_os(CONFIG_ENV), &cwd) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// 按发现规则给出应读取的配置文件。环境变量指定的路径即使不存在也会被返回，
/// 以便调用方报告读取失败。
fn locate(env_override: Option<OsString>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = env_override {
        return Some(PathBuf::from(path));
    }
    let default_path = cwd.join("config").join("default.toml");
    default_path.exists().then_some(default_path)
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 合并行为的默认值，命令行参数可逐项覆盖。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MergeConfig {
    /// 扫描目录时匹配的扩展名（不区分大小写，可带前导点）。
    #[serde(default = "MergeConfig::default_extension")]
    pub extension: String,
    #[serde(default)]
    pub layer_per_source: bool,
    #[serde(default = "MergeConfig::default_layer")]
    pub default_layer: String,
}

impl MergeConfig {
    fn default_extension() -> String {
        "dxf".to_string()
    }

    fn default_layer() -> String {
        "0".to_string()
    }

    /// 去掉前导点后的扩展名。
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            extension: Self::default_extension(),
            layer_per_source: false,
            default_layer: Self::default_layer(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.merge.extension(), "dxf");
        assert!(!cfg.merge.layer_per_source);
        assert_eq!(cfg.merge.default_layer, "0");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [merge]
            extension = ".DXF"
            layer_per_source = true
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.merge.extension(), "DXF");
        assert!(cfg.merge.layer_per_source);
        assert_eq!(cfg.merge.default_layer, "0");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();
        let cfg = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.merge, MergeConfig::default());
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[merge]\nlayer_per_source = \"maybe\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == file.path()));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn locate_prefers_environment_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("config").join("default.toml"), "").unwrap();

        let chosen = locate(Some(OsString::from("/etc/dxfmerge.toml")), dir.path());
        assert_eq!(chosen, Some(PathBuf::from("/etc/dxfmerge.toml")));

        let fallback = locate(None, dir.path());
        assert_eq!(fallback, Some(dir.path().join("config").join("default.toml")));
    }

    #[test]
    fn locate_returns_none_without_candidates() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate(None, dir.path()), None);
    }
}
