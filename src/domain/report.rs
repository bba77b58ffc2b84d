// ==========================================
// 库存对账回填系统 - 运行报告
// ==========================================
// 未匹配的计划行只在报告中体现,不作为错误抛出
// ==========================================

use crate::domain::types::{MatchOutcome, MetricLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 未获得更新的计划行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRow {
    pub row: usize,
    pub name: String,
    pub code: Option<u64>,
    pub reason: MatchOutcome,
}

/// 单次对账运行报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_path: PathBuf,
    pub metric: MetricLabel,
    /// 本次是否执行了表头引导建列
    pub bootstrapped: bool,
    pub entries_loaded: usize,
    pub rows_updated: usize,
    pub unmatched_rows: Vec<UnmatchedRow>,
}
