// ==========================================
// 库存对账回填系统 - 数值格式化
// ==========================================
// "(<托盘数>) <数量>",两位小数四舍五入,去掉末尾 0 与小数点
// 数量 ≤ 0 不输出（空单元格）
// ==========================================

use rust_decimal::{Decimal, RoundingStrategy};

pub fn format_decimal(value: Decimal) -> String {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

/// 数量 + 托盘数文本;数量 ≤ 0 返回 None
pub fn format_meter_with_pallets(meter: Decimal, divisor: Decimal) -> Option<String> {
    if meter <= Decimal::ZERO {
        return None;
    }
    let meter_text = format_decimal(meter);
    if divisor <= Decimal::ZERO {
        return Some(meter_text);
    }
    match meter.checked_div(divisor) {
        Some(pallets) => Some(format!("({}) {}", format_decimal(pallets), meter_text)),
        None => Some(meter_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_format_decimal_strips_trailing_zeros() {
        assert_eq!(format_decimal(dec("100.00")), "100");
        assert_eq!(format_decimal(dec("2.50")), "2.5");
        assert_eq!(format_decimal(dec("2.345")), "2.35");
        assert_eq!(format_decimal(dec("2.344")), "2.34");
        assert_eq!(format_decimal(dec("0.001")), "0");
    }

    #[test]
    fn test_meter_with_pallets() {
        assert_eq!(
            format_meter_with_pallets(dec("15"), dec("5")),
            Some("(3) 15".to_string())
        );
        assert_eq!(
            format_meter_with_pallets(dec("10"), dec("3")),
            Some("(3.33) 10".to_string())
        );
        assert_eq!(
            format_meter_with_pallets(dec("12.5"), Decimal::ZERO),
            Some("12.5".to_string())
        );
        assert_eq!(
            format_meter_with_pallets(dec("12.5"), dec("-2")),
            Some("12.5".to_string())
        );
    }

    #[test]
    fn test_non_positive_meter_is_blank() {
        assert_eq!(format_meter_with_pallets(Decimal::ZERO, dec("5")), None);
        assert_eq!(format_meter_with_pallets(dec("-3"), dec("5")), None);
    }

    proptest! {
        #[test]
        fn prop_non_positive_meter_is_blank_for_any_divisor(
            meter in -1_000_000i64..=0,
            divisor in proptest::num::i64::ANY,
        ) {
            let result = format_meter_with_pallets(Decimal::from(meter), Decimal::from(divisor));
            prop_assert!(result.is_none());
        }
    }
}
