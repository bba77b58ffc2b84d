// ==========================================
// 计划行维护集成测试
// ==========================================
// 测试目标: 列表/查询/新增/修改/删除/输出明细
// ==========================================

mod test_helpers;

use inventory_plan_reconciler::api::{parse_divisor, ApiError};
use inventory_plan_reconciler::domain::PlanRowValues;
use rust_decimal::Decimal;
use std::str::FromStr;
use test_helpers::*;

fn values(code: &str, name: &str, size: &str, divisor: &str) -> PlanRowValues {
    PlanRowValues {
        code: code.to_string(),
        name: name.to_string(),
        size: size.to_string(),
        divisor: parse_divisor(divisor).unwrap(),
    }
}

fn fixture() -> Fixture {
    Fixture::new(
        inventory(vec![stock("Foo", "", "A/2", "T1", 12.0, 3.0)]),
        vec![
            plan_header(&[]),
            plan_row(Some(100.0), "Foo", 5.0),
            plan_row(Some(200.0), "Bar Stone", 1.44),
        ],
    )
}

#[test]
fn test_list_and_find_rows() {
    let fx = fixture();
    let api = api();

    let rows = api.list_rows(&fx.plan).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row, 2);
    assert_eq!(rows[0].code_display, "100");
    assert_eq!(rows[0].label(), "Foo (100)");
    assert_eq!(rows[1].divisor_display, "1.44");

    let found = api.find_rows(&fx.plan, "STONE").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name_display, "Bar Stone");
    assert_eq!(api.find_rows(&fx.plan, "20").unwrap().len(), 1);
    assert_eq!(api.find_rows(&fx.plan, "  ").unwrap().len(), 2);
}

#[test]
fn test_add_row_appends_after_last_row() {
    let fx = fixture();
    let api = api();

    let row = api
        .add_row(&fx.plan, &values("300", "Baz", "30x30", "2,5"))
        .unwrap();
    assert_eq!(row, 4);

    let added = api.row_at(&fx.plan, 4).unwrap();
    assert_eq!(added.code_display, "300");
    assert_eq!(added.size_display, "30x30");
    assert_eq!(added.divisor_display, "2.5");
}

#[test]
fn test_update_row_by_row_number() {
    let fx = fixture();
    let api = api();

    let original = api.row_at(&fx.plan, 2).unwrap();
    let updated = api
        .update_row(&fx.plan, &original, &values("100", "Foo Polished", "60x120", "6"))
        .unwrap();
    assert!(updated);

    let row = api.row_at(&fx.plan, 2).unwrap();
    assert_eq!(row.name_display, "Foo Polished");
    assert_eq!(row.divisor_display, "6");
    // 原身份已不存在
    assert!(!api
        .update_row(&fx.plan, &original, &values("1", "x", "", "1"))
        .unwrap());
}

#[test]
fn test_delete_shifts_rows_and_stale_records_are_located_by_scan() {
    let fx = fixture();
    let api = api();

    let foo = api.row_at(&fx.plan, 2).unwrap();
    let bar = api.row_at(&fx.plan, 3).unwrap();
    assert!(api.delete_row(&fx.plan, &foo).unwrap());

    let rows = api.list_rows(&fx.plan).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row, 2);
    assert_eq!(rows[0].name_display, "Bar Stone");

    // bar 记录的行号已过期,仍能按编码和名称找到
    assert!(api
        .update_row(&fx.plan, &bar, &values("200", "Bar Stone", "60x60", "2"))
        .unwrap());
    assert_eq!(api.row_at(&fx.plan, 2).unwrap().size_display, "60x60");
    assert!(matches!(api.row_at(&fx.plan, 3), Err(ApiError::NotFound(_))));
}

#[test]
fn test_row_details_from_output() {
    let fx = fixture();
    let api = api();
    api.process(&fx.request("physical")).unwrap();

    let target = api.row_at(&fx.plan, 2).unwrap();
    let details = api.row_details(&fx.plan, &target, &fx.output).unwrap();

    let total = details
        .iter()
        .find(|d| d.header == "مجموع طرح (فیزیکی)")
        .unwrap();
    assert_eq!(total.value, "(3) 15");
    assert_eq!(total.meter.as_deref(), Some("15"));
    assert_eq!(total.pallets.as_deref(), Some("3"));

    let name = details.iter().find(|d| d.header == "نام طرح").unwrap();
    assert_eq!(name.value, "Foo");
    assert_eq!(name.pallets, None);
    // 空单元格不出现
    assert!(!details.iter().any(|d| d.header == "C/3 (فیزیکی)"));
}

#[test]
fn test_missing_plan_is_not_found() {
    let fx = fixture();
    let missing = fx.dir.path().join("nope.xlsx");
    let api = api();
    assert!(matches!(api.list_rows(&missing), Err(ApiError::NotFound(_))));
    assert!(matches!(
        api.add_row(&missing, &values("1", "x", "", "1")),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_divisor_text() {
    assert_eq!(parse_divisor("1,5").unwrap(), Decimal::from_str("1.5").unwrap());
    assert!(matches!(parse_divisor("five"), Err(ApiError::InvalidInput(_))));
}
