// ==========================================
// 库存对账回填系统 - 配置层
// ==========================================
// 职责: 运行配置加载,支持配置文件与环境变量覆写
// 存储: <用户配置目录>/inventory-plan-reconciler/config.json
// ==========================================

pub mod reconcile_config;

pub use reconcile_config::{env_keys, ConfigError, ConfigResult, ReconcileConfig};
