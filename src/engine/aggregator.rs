// ==========================================
// 库存对账回填系统 - 汇总计算
// ==========================================
// 按等级分桶 (A/2, C/3) 与按色号分组,精确十进制求和
// ==========================================

use crate::domain::inventory::InventoryEntry;
use crate::domain::plan::MetricSummary;
use crate::domain::types::{Degree, MetricLabel};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// 对匹配到的明细按指定口径汇总
pub fn summarize(matches: &[&InventoryEntry], metric: MetricLabel) -> MetricSummary {
    let bucket_sum = |degree: &Degree| -> Decimal {
        matches
            .iter()
            .filter(|e| &e.degree == degree)
            .map(|e| e.metrics.get(metric))
            .sum()
    };
    let a2_meter = bucket_sum(&Degree::A2);
    let c3_meter = bucket_sum(&Degree::C3);
    let total_meter = a2_meter + c3_meter;

    // 色号分组覆盖全部等级
    let mut per_tonality_map: BTreeMap<String, Decimal> = BTreeMap::new();
    for entry in matches.iter().filter(|e| !e.tonality.is_empty()) {
        *per_tonality_map
            .entry(entry.tonality.clone())
            .or_insert(Decimal::ZERO) += entry.metrics.get(metric);
    }

    let pallet_count = per_tonality_map
        .values()
        .filter(|sum| **sum > Decimal::ZERO)
        .count();
    let per_tonality_avg = if pallet_count > 0 {
        total_meter / Decimal::from(pallet_count)
    } else {
        Decimal::ZERO
    };

    MetricSummary {
        a2_meter,
        c3_meter,
        total_meter,
        per_tonality_avg,
        per_tonality_map,
        has_pallets: pallet_count > 0,
    }
}
