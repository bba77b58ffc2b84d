// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 在临时目录中生成库存表/计划表 xlsx 夹具,读取输出表
// ==========================================

#![allow(dead_code)]

use inventory_plan_reconciler::domain::CellValue;
use inventory_plan_reconciler::{
    PlanDocumentStore, PlanWorkbook, ProcessRequest, ReconcileApi, ReconcileConfig,
};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub type Rows = Vec<Vec<CellValue>>;

pub fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

pub fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

/// 写出多工作表 xlsx
pub fn write_xlsx(path: &Path, sheets: &[(&str, Rows)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, cells) in rows.iter().enumerate() {
            for (c, cell) in cells.iter().enumerate() {
                let (row, col) = (r as u32, c as u16);
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(row, col, s.as_str()).unwrap();
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(row, col, *n).unwrap();
                    }
                    CellValue::Int(i) => {
                        worksheet.write_number(row, col, *i as f64).unwrap();
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row, col, *b).unwrap();
                    }
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

// ==========================================
// 库存表（按固定列位布局,同时带表头）
// ==========================================

pub fn inventory_header() -> Vec<CellValue> {
    [
        "موجودی قابل فروش",
        "موجودی رزرو",
        "موجودی فیزیکی",
        "",
        "",
        "نام کالا",
        "درجه",
        "تنالیته",
        "",
        "کد کالا",
    ]
    .iter()
    .map(|h| if h.is_empty() { CellValue::Empty } else { text(h) })
    .collect()
}

/// 一行库存明细（实物数量留空,取 可售 + 预留）
pub fn stock(
    name: &str,
    code: &str,
    degree: &str,
    tonality: &str,
    sellable: f64,
    reserved: f64,
) -> Vec<CellValue> {
    let opt = |s: &str| if s.is_empty() { CellValue::Empty } else { text(s) };
    vec![
        num(sellable),
        num(reserved),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Empty,
        opt(name),
        opt(degree),
        opt(tonality),
        CellValue::Empty,
        opt(code),
    ]
}

pub fn inventory(rows: Vec<Vec<CellValue>>) -> Rows {
    let mut all = vec![inventory_header()];
    all.extend(rows);
    all
}

// ==========================================
// 计划表
// ==========================================

pub const PLAN_BASE_HEADERS: [&str; 4] = ["کد محصول", "نام طرح", "سایز محصول", "مقدار تقسیم پالت"];

pub fn plan_header(extra: &[&str]) -> Vec<CellValue> {
    PLAN_BASE_HEADERS
        .iter()
        .chain(extra.iter())
        .map(|h| text(h))
        .collect()
}

pub fn plan_row(code: Option<f64>, name: &str, divisor: f64) -> Vec<CellValue> {
    vec![
        code.map(num).unwrap_or_default(),
        text(name),
        text("60x120"),
        num(divisor),
    ]
}

// ==========================================
// 夹具
// ==========================================

pub struct Fixture {
    pub dir: TempDir,
    pub input: PathBuf,
    pub plan: PathBuf,
    pub output: PathBuf,
}

impl Fixture {
    pub fn new(inventory_rows: Rows, plan_rows: Rows) -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.xlsx");
        let plan = dir.path().join("template.xlsx");
        let output = dir.path().join("output_from_template.xlsx");
        write_xlsx(&input, &[("Sheet1", inventory_rows)]);
        write_xlsx(&plan, &[("Sheet1", plan_rows)]);
        Self {
            dir,
            input,
            plan,
            output,
        }
    }

    pub fn request(&self, metric: &str) -> ProcessRequest {
        ProcessRequest {
            input_path: self.input.clone(),
            plan_path: self.plan.clone(),
            output_path: self.output.clone(),
            metric: Some(metric.to_string()),
            sheet: None,
            in_place: false,
        }
    }

    pub fn rewrite_inventory(&self, rows: Rows) {
        write_xlsx(&self.input, &[("Sheet1", rows)]);
    }
}

pub fn api() -> ReconcileApi {
    ReconcileApi::new(ReconcileConfig::default(), PlanDocumentStore::new("test-plan"))
}

// ==========================================
// 读取
// ==========================================

/// 第一个工作表的全部行（展示文本）
pub fn read_texts(path: &Path) -> Vec<Vec<String>> {
    read_sheet_texts(path, None)
}

pub fn read_sheet_texts(path: &Path, sheet: Option<&str>) -> Vec<Vec<String>> {
    let workbook = PlanWorkbook::load(path).unwrap();
    let sheet = workbook.sheet(sheet).unwrap();
    (0..sheet.row_count())
        .map(|r| sheet.row(r).iter().map(|c| c.to_string()).collect())
        .collect()
}

/// 单元格文本（行列均 0 起,越界为空串）
pub fn cell_text(path: &Path, row: usize, col: usize) -> String {
    let workbook = PlanWorkbook::load(path).unwrap();
    workbook.sheet(None).unwrap().cell(row, col).to_string()
}

/// 表头中某文本所在列
pub fn header_col(path: &Path, header: &str) -> usize {
    read_texts(path)[0]
        .iter()
        .position(|h| h == header)
        .unwrap_or_else(|| panic!("表头不存在: {}", header))
}
