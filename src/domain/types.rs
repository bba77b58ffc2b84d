// ==========================================
// 库存对账回填系统 - 领域类型定义
// ==========================================
// 指标标签 / 列语义键 / 等级
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==========================================
// 指标标签 (Metric Label)
// ==========================================
// 三种库存口径,同时也是计划表派生列的括号标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricLabel {
    Physical, // 实物
    Sellable, // 可售
    Reserved, // 预留
}

impl MetricLabel {
    /// 引导建列时的标签顺序
    pub const ALL: [MetricLabel; 3] = [
        MetricLabel::Physical,
        MetricLabel::Sellable,
        MetricLabel::Reserved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricLabel::Physical => "physical",
            MetricLabel::Sellable => "sellable",
            MetricLabel::Reserved => "reserved",
        }
    }

    /// 写入表头的显示文本
    pub fn display_label(&self) -> &'static str {
        match self {
            MetricLabel::Physical => "فیزیکی",
            MetricLabel::Sellable => "قابل فروش",
            MetricLabel::Reserved => "رزرو",
        }
    }
}

impl fmt::Display for MetricLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 不支持的指标名
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("不支持的指标: {0}（仅支持 sellable/physical/reserved）")]
pub struct UnsupportedMetric(pub String);

impl FromStr for MetricLabel {
    type Err = UnsupportedMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "physical" => Ok(MetricLabel::Physical),
            "sellable" => Ok(MetricLabel::Sellable),
            "reserved" => Ok(MetricLabel::Reserved),
            _ => Err(UnsupportedMetric(s.to_string())),
        }
    }
}

// ==========================================
// 指标列的标签键
// ==========================================
// Default: 表头不带括号标签的指标列,按调用方请求的指标汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelKey {
    Default,
    Metric(MetricLabel),
}

impl LabelKey {
    /// 解析为实际汇总所用的指标
    pub fn resolve(&self, requested: MetricLabel) -> MetricLabel {
        match self {
            LabelKey::Default => requested,
            LabelKey::Metric(label) => *label,
        }
    }
}

// ==========================================
// 指标列的汇总口径
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricBase {
    A2Meter,
    C3Meter,
    TotalMeter,
    PerTonalityAvg,
}

impl MetricBase {
    /// 引导建列只包含前三种口径
    pub const BOOTSTRAP: [MetricBase; 3] =
        [MetricBase::A2Meter, MetricBase::C3Meter, MetricBase::TotalMeter];

    /// 引导建列时写入的表头文本
    pub fn bootstrap_header(&self) -> Option<&'static str> {
        match self {
            MetricBase::A2Meter => Some("A/2"),
            MetricBase::C3Meter => Some("C/3"),
            MetricBase::TotalMeter => Some("مجموع طرح"),
            MetricBase::PerTonalityAvg => None,
        }
    }
}

// ==========================================
// 计划表基础列
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseColumn {
    Code,
    Name,
    Size,
    PalletDivisor,
}

impl BaseColumn {
    /// 表头缺失时的默认列位置（0 起）,与计划行维护写入的布局一致
    pub const fn fallback_index(&self) -> usize {
        match self {
            BaseColumn::Code => 0,
            BaseColumn::Name => 1,
            BaseColumn::Size => 2,
            BaseColumn::PalletDivisor => 3,
        }
    }
}

// ==========================================
// 等级 (Degree)
// ==========================================
// 无法识别的等级原样保留,汇总时不进入 A/2、C/3 分桶
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Degree {
    A2,
    C3,
    Other(String),
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degree::A2 => write!(f, "A/2"),
            Degree::C3 => write!(f, "C/3"),
            Degree::Other(raw) => write!(f, "{}", raw),
        }
    }
}

// ==========================================
// 计划行匹配结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// 名称命中
    ByName,
    /// 名称未命中,编码唯一且命中
    ByCode,
    /// 计划行名称为空
    EmptyName,
    /// 名称未命中且计划行无编码
    NoCode,
    /// 编码在计划表中出现多次
    AmbiguousCode,
    /// 编码唯一但无库存明细含该编码
    NoEvidence,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::ByName | MatchOutcome::ByCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_label_from_str() {
        assert_eq!("physical".parse::<MetricLabel>(), Ok(MetricLabel::Physical));
        assert_eq!(" Sellable ".parse::<MetricLabel>(), Ok(MetricLabel::Sellable));
        assert!("weight".parse::<MetricLabel>().is_err());
    }

    #[test]
    fn test_label_key_resolve() {
        assert_eq!(LabelKey::Default.resolve(MetricLabel::Reserved), MetricLabel::Reserved);
        assert_eq!(
            LabelKey::Metric(MetricLabel::Physical).resolve(MetricLabel::Reserved),
            MetricLabel::Physical
        );
    }

    #[test]
    fn test_match_outcome_is_matched() {
        assert!(MatchOutcome::ByCode.is_matched());
        assert!(!MatchOutcome::AmbiguousCode.is_matched());
    }
}
