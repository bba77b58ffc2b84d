// ==========================================
// 库存对账回填系统 - 运行配置
// ==========================================
// 加载顺序: 显式路径 → 用户配置目录下 config.json → 默认值
// 之后应用环境变量覆写
// 非法取值直接报错,不静默忽略
// ==========================================

use crate::domain::types::MetricLabel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_DIR_NAME: &str = "inventory-plan-reconciler";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 环境变量键
pub mod env_keys {
    pub const DEFAULT_METRIC: &str = "RECONCILER_DEFAULT_METRIC";
    pub const PROCESS_TIMEOUT: &str = "RECONCILER_PROCESS_TIMEOUT";
    pub const PDFTOTEXT: &str = "RECONCILER_PDFTOTEXT";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    ReadError { path: String, message: String },

    #[error("配置文件格式错误 ({path}): {message}")]
    ParseError { path: String, message: String },

    #[error("配置项非法 ({key}): {message}")]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 运行配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// 未指定指标时使用的口径
    #[serde(default = "default_metric")]
    pub default_metric: MetricLabel,

    /// 单次处理超时（秒）;None 表示不限时
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,

    /// pdftotext 可执行文件名或路径
    #[serde(default = "default_pdftotext")]
    pub pdftotext_bin: String,

    /// 默认工作表名称
    #[serde(default)]
    pub sheet: Option<String>,
}

fn default_metric() -> MetricLabel {
    MetricLabel::Physical
}

fn default_pdftotext() -> String {
    "pdftotext".to_string()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_metric: default_metric(),
            process_timeout_secs: None,
            pdftotext_bin: default_pdftotext(),
            sheet: None,
        }
    }
}

impl ReconcileConfig {
    /// 用户配置目录下的默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 加载配置并应用环境变量覆写
    ///
    /// # 参数
    /// - explicit: 显式指定的配置文件（必须存在）
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match explicit {
            Some(path) => {
                info!(path = %path.display(), "读取配置文件");
                Self::from_file(path)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!(path = %path.display(), "读取用户配置文件");
                    Self::from_file(&path)?
                }
                None => {
                    debug!("未找到配置文件,使用默认配置");
                    Self::default()
                }
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 应用覆写（lookup 通常为环境变量读取）
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value_of = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(raw) = value_of(env_keys::DEFAULT_METRIC) {
            self.default_metric =
                raw.parse::<MetricLabel>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: env_keys::DEFAULT_METRIC.to_string(),
                        message: e.to_string(),
                    })?;
        }
        if let Some(raw) = value_of(env_keys::PROCESS_TIMEOUT) {
            let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: env_keys::PROCESS_TIMEOUT.to_string(),
                message: e.to_string(),
            })?;
            self.process_timeout_secs = Some(secs);
        }
        if let Some(raw) = value_of(env_keys::PDFTOTEXT) {
            self.pdftotext_bin = raw;
        }
        self.validate()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.process_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "process_timeout_secs".to_string(),
                message: "超时时间必须大于 0".to_string(),
            });
        }
        if self.pdftotext_bin.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "pdftotext_bin".to_string(),
                message: "不能为空".to_string(),
            });
        }
        Ok(())
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_metric": "sellable", "sheet": "Plan"}}"#).unwrap();

        let config = ReconcileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_metric, MetricLabel::Sellable);
        assert_eq!(config.sheet.as_deref(), Some("Plan"));
        assert_eq!(config.pdftotext_bin, "pdftotext");
        assert_eq!(config.process_timeout(), None);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_metric": "weight"}}"#).unwrap();
        assert!(matches!(
            ReconcileConfig::from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (env_keys::DEFAULT_METRIC, "reserved"),
            (env_keys::PROCESS_TIMEOUT, " 30 "),
            (env_keys::PDFTOTEXT, "/opt/bin/pdftotext"),
        ]
        .into_iter()
        .collect();
        let mut config = ReconcileConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.default_metric, MetricLabel::Reserved);
        assert_eq!(config.process_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.pdftotext_bin, "/opt/bin/pdftotext");
    }

    #[test]
    fn test_invalid_override_is_error() {
        let mut config = ReconcileConfig::default();
        let result = config.apply_overrides(|key| {
            (key == env_keys::PROCESS_TIMEOUT).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = config.apply_overrides(|key| {
            (key == env_keys::PROCESS_TIMEOUT).then(|| "0".to_string())
        });
        assert!(result.is_err());
    }
}
