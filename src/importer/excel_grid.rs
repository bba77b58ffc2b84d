// ==========================================
// 库存对账回填系统 - 工作表网格读取
// ==========================================
// 基于 calamine 读取工作表,统一为从 (0,0) 起的值网格
// 计划表仓储与库存表解析共用
// ==========================================

use crate::domain::cell::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;

/// 行优先的值网格（行尾空单元格已去除）
pub type Grid = Vec<Vec<CellValue>>;

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Int(*i),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

/// 将 calamine Range 展开为从 A1 开始的网格
pub fn range_to_grid(range: &Range<Data>) -> Grid {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let mut grid: Grid = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(CellValue::from));
        while matches!(cells.last(), Some(CellValue::Empty)) {
            cells.pop();
        }
        grid.push(cells);
    }
    while grid.last().is_some_and(|r| r.is_empty()) {
        grid.pop();
    }
    grid
}

/// 选择工作表: 指定名称,否则第一个工作表
pub fn select_sheet(names: &[String], wanted: Option<&str>) -> ImportResult<String> {
    match wanted {
        Some(name) => names
            .iter()
            .find(|n| n.as_str() == name)
            .cloned()
            .ok_or_else(|| ImportError::SheetNotFound(name.to_string())),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("工作簿无工作表".to_string())),
    }
}

/// 读取单个工作表
pub fn read_sheet_grid(path: &Path, sheet: Option<&str>) -> ImportResult<(String, Grid)> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = select_sheet(&workbook.sheet_names(), sheet)?;
    let range = workbook.worksheet_range(&sheet_name)?;
    Ok((sheet_name, range_to_grid(&range)))
}

/// 按顺序读取全部工作表
pub fn read_all_sheet_grids(path: &Path) -> ImportResult<Vec<(String, Grid)>> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        sheets.push((name, range_to_grid(&range)));
    }
    Ok(sheets)
}
