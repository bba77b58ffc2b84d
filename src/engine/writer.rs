// ==========================================
// 库存对账回填系统 - 汇总回填
// ==========================================
// 只写列映射指定的单元格,不新增行,不调整列顺序
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::plan::MetricSummary;
use crate::domain::types::MetricBase;
use crate::engine::formatter::{format_decimal, format_meter_with_pallets};
use crate::repository::plan_workbook::Sheet;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn rendered(value: Option<String>) -> CellValue {
    value.map(CellValue::Text).unwrap_or_default()
}

/// 单个汇总值的显示文本
pub fn render_base(base: MetricBase, summary: &MetricSummary, divisor: Decimal) -> Option<String> {
    match base {
        MetricBase::A2Meter => format_meter_with_pallets(summary.a2_meter, divisor),
        MetricBase::C3Meter => format_meter_with_pallets(summary.c3_meter, divisor),
        MetricBase::TotalMeter => format_meter_with_pallets(summary.total_meter, divisor),
        MetricBase::PerTonalityAvg if summary.has_pallets => {
            format_meter_with_pallets(summary.per_tonality_avg, divisor)
        }
        MetricBase::PerTonalityAvg => None,
    }
}

/// 把一行的汇总写入指标列与色号列（row 为 0 起行号）
pub fn write_summary(
    sheet: &mut Sheet,
    row: usize,
    metric_cols: &BTreeMap<MetricBase, usize>,
    tonality_cols: Option<&BTreeMap<String, usize>>,
    summary: &MetricSummary,
    divisor: Decimal,
) {
    for (base, col) in metric_cols {
        sheet.set_cell(row, *col, rendered(render_base(*base, summary, divisor)));
    }
    let Some(tonality_cols) = tonality_cols else {
        return;
    };
    for (tonality, col) in tonality_cols {
        let meter = summary
            .per_tonality_map
            .get(tonality)
            .copied()
            .unwrap_or(Decimal::ZERO);
        sheet.set_cell(row, *col, rendered(format_meter_with_pallets(meter, divisor)));
    }
}

/// 报告用的汇总摘要文本
pub fn describe(summary: &MetricSummary) -> String {
    format!(
        "A/2={} C/3={} total={} tonalities={}",
        format_decimal(summary.a2_meter),
        format_decimal(summary.c3_meter),
        format_decimal(summary.total_meter),
        summary.per_tonality_map.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> MetricSummary {
        let mut map = BTreeMap::new();
        map.insert("T1".to_string(), Decimal::from(15));
        MetricSummary {
            a2_meter: Decimal::from(15),
            c3_meter: Decimal::ZERO,
            total_meter: Decimal::from(15),
            per_tonality_avg: Decimal::from(15),
            per_tonality_map: map,
            has_pallets: true,
        }
    }

    #[test]
    fn test_write_summary_fills_and_clears_cells() {
        let mut sheet = Sheet::new(
            "plan",
            vec![
                vec![CellValue::from("A/2"), CellValue::from("C/3")],
                vec![CellValue::from("old"), CellValue::from("old")],
            ],
        );
        let mut cols = BTreeMap::new();
        cols.insert(MetricBase::A2Meter, 0);
        cols.insert(MetricBase::C3Meter, 1);
        let mut tonality_cols = BTreeMap::new();
        tonality_cols.insert("T1".to_string(), 2);
        tonality_cols.insert("T2".to_string(), 3);

        write_summary(&mut sheet, 1, &cols, Some(&tonality_cols), &summary(), Decimal::from(5));

        assert_eq!(sheet.cell(1, 0), &CellValue::from("(3) 15"));
        assert_eq!(sheet.cell(1, 1), &CellValue::Empty);
        assert_eq!(sheet.cell(1, 2), &CellValue::from("(3) 15"));
        assert_eq!(sheet.cell(1, 3), &CellValue::Empty);
    }

    #[test]
    fn test_average_blank_without_pallets() {
        let mut s = summary();
        s.has_pallets = false;
        assert_eq!(render_base(MetricBase::PerTonalityAvg, &s, Decimal::ZERO), None);
        assert_eq!(
            render_base(MetricBase::TotalMeter, &s, Decimal::ZERO),
            Some("15".to_string())
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&summary()), "A/2=15 C/3=0 total=15 tonalities=1");
    }
}
