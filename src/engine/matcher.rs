// ==========================================
// 库存对账回填系统 - 计划行匹配
// ==========================================
// 策略: 名称优先 → 编码过滤名称命中 → 无名称证据时按唯一编码回退
// 红线: 证据冲突或编码重复时不匹配,绝不猜测
// ==========================================

use crate::domain::inventory::InventoryEntry;
use crate::domain::types::MatchOutcome;
use crate::importer::field_mapper::code_matches;
use crate::importer::text_normalizer::query_form;
use std::collections::HashMap;
use tracing::trace;

// ==========================================
// PlanCodeIndex - 全部计划行的编码及出现次数
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PlanCodeIndex {
    counts: HashMap<u64, usize>,
}

impl PlanCodeIndex {
    pub fn from_codes<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut counts = HashMap::new();
        for code in codes {
            *counts.entry(code).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn multiplicity(&self, code: u64) -> usize {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    pub fn contains(&self, code: u64) -> bool {
        self.counts.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// 单个计划行的匹配结果
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub entries: Vec<&'a InventoryEntry>,
    pub outcome: MatchOutcome,
}

impl<'a> MatchResult<'a> {
    fn none(outcome: MatchOutcome) -> Self {
        Self {
            entries: Vec::new(),
            outcome,
        }
    }
}

// ==========================================
// Matcher
// ==========================================
pub struct Matcher<'a> {
    entries: &'a [InventoryEntry],
    codes: &'a PlanCodeIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(entries: &'a [InventoryEntry], codes: &'a PlanCodeIndex) -> Self {
        Self { entries, codes }
    }

    /// 为一个计划行求出所属的库存明细
    pub fn find_matches(&self, plan_name: &str, plan_code: Option<u64>) -> MatchResult<'a> {
        let name_norm = query_form(plan_name);
        if name_norm.is_empty() {
            return MatchResult::none(MatchOutcome::EmptyName);
        }

        let entries: &'a [InventoryEntry] = self.entries;
        let mut by_name: Vec<&'a InventoryEntry> = entries
            .iter()
            .filter(|e| e.name_norm.contains(&name_norm))
            .collect();

        if let Some(code) = plan_code {
            if !by_name.is_empty() {
                by_name.retain(|e| self.keeps_name_match(e, code));
            }
        }
        if !by_name.is_empty() {
            trace!(name = %name_norm, matched = by_name.len(), "名称命中");
            return MatchResult {
                entries: by_name,
                outcome: MatchOutcome::ByName,
            };
        }

        let Some(code) = plan_code else {
            return MatchResult::none(MatchOutcome::NoCode);
        };
        if self.codes.multiplicity(code) > 1 {
            trace!(code, "编码在计划表中重复,拒绝匹配");
            return MatchResult::none(MatchOutcome::AmbiguousCode);
        }

        let by_code: Vec<&'a InventoryEntry> = entries
            .iter()
            .filter(|e| code_matches(code, &e.code_text))
            .collect();
        if by_code.is_empty() {
            return MatchResult::none(MatchOutcome::NoEvidence);
        }
        trace!(code, matched = by_code.len(), "编码命中");
        MatchResult {
            entries: by_code,
            outcome: MatchOutcome::ByCode,
        }
    }

    /// 名称命中的明细在计划行有编码时的保留条件
    fn keeps_name_match(&self, entry: &InventoryEntry, plan_code: u64) -> bool {
        if entry.code_text.trim().is_empty() || code_matches(plan_code, &entry.code_text) {
            return true;
        }
        match entry.code_any {
            None => true,
            // 明细编码属于另一个计划编码时剔除
            Some(code) => code == plan_code || !self.codes.contains(code),
        }
    }
}
