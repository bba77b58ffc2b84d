// ==========================================
// 库存对账回填系统 - 计划行维护
// ==========================================
// 职责: 计划表第一个工作表的行列表/查询/新增/修改/删除,
//       以及从输出表读取单行明细
// 布局: A=编码 B=名称 C=尺寸 D=托盘折算系数
// 约束: 所有计划表读写都需持有文档租约
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::plan::{PlanRowRecord, PlanRowValues, RowDetail};
use crate::domain::types::BaseColumn;
use crate::importer::text_normalizer::{
    clean_text, normalize_code_value, query_form, split_meter_pallet,
};
use crate::repository::document_lock::DocumentLease;
use crate::repository::error::RepositoryResult;
use crate::repository::plan_workbook::{PlanWorkbook, Sheet};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

const CODE_COL: usize = BaseColumn::Code.fallback_index();
const NAME_COL: usize = BaseColumn::Name.fallback_index();
const SIZE_COL: usize = BaseColumn::Size.fallback_index();
const DIVISOR_COL: usize = BaseColumn::PalletDivisor.fallback_index();

pub struct PlanRowRepository {
    plan_path: PathBuf,
}

impl PlanRowRepository {
    pub fn new(plan_path: impl Into<PathBuf>) -> Self {
        Self {
            plan_path: plan_path.into(),
        }
    }

    /// 列出全部计划行（编码与名称都为空的行跳过）
    pub fn list_rows(&self, _lease: &DocumentLease) -> RepositoryResult<Vec<PlanRowRecord>> {
        let workbook = PlanWorkbook::load(&self.plan_path)?;
        let sheet = workbook.sheet(None)?;
        Ok((1..sheet.row_count())
            .filter_map(|r| record_at(sheet, r))
            .collect())
    }

    /// 编码或名称包含查询词的计划行;空查询返回全部
    pub fn find_rows(
        &self,
        lease: &DocumentLease,
        query: &str,
    ) -> RepositoryResult<Vec<PlanRowRecord>> {
        let rows = self.list_rows(lease)?;
        let query_norm = query_form(query);
        if query_norm.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .filter(|row| {
                query_form(&row.code_display).contains(&query_norm)
                    || query_form(&row.name_display).contains(&query_norm)
            })
            .collect())
    }

    /// 在最后一个非空行之后追加计划行,返回新行号（1 起）
    #[instrument(skip(self, _lease, values), fields(code = %values.code))]
    pub fn append_row(
        &self,
        _lease: &DocumentLease,
        values: &PlanRowValues,
    ) -> RepositoryResult<usize> {
        let mut workbook = PlanWorkbook::load(&self.plan_path)?;
        let sheet = workbook.sheet_mut(None)?;

        let last_row = (1..sheet.row_count())
            .filter(|&r| (CODE_COL..=DIVISOR_COL).any(|c| !sheet.cell(r, c).is_blank()))
            .last()
            .unwrap_or(0);
        let next_row = last_row + 1;
        write_values(sheet, next_row, values);

        workbook.save(&self.plan_path)?;
        info!(row = next_row + 1, "计划行已追加");
        Ok(next_row + 1)
    }

    /// 修改计划行;找不到原行时返回 false
    #[instrument(skip(self, _lease, original, new_values), fields(row = original.row))]
    pub fn update_row(
        &self,
        _lease: &DocumentLease,
        original: &PlanRowRecord,
        new_values: &PlanRowValues,
    ) -> RepositoryResult<bool> {
        let mut workbook = PlanWorkbook::load(&self.plan_path)?;
        let sheet = workbook.sheet_mut(None)?;
        let Some(idx) = locate_row(sheet, original) else {
            return Ok(false);
        };
        write_values(sheet, idx, new_values);
        workbook.save(&self.plan_path)?;
        info!(row = idx + 1, "计划行已修改");
        Ok(true)
    }

    /// 删除计划行（下方各行上移）;找不到原行时返回 false
    #[instrument(skip(self, _lease, original), fields(row = original.row))]
    pub fn delete_row(
        &self,
        _lease: &DocumentLease,
        original: &PlanRowRecord,
    ) -> RepositoryResult<bool> {
        let mut workbook = PlanWorkbook::load(&self.plan_path)?;
        let sheet = workbook.sheet_mut(None)?;
        let Some(idx) = locate_row(sheet, original) else {
            return Ok(false);
        };
        sheet.delete_row(idx);
        workbook.save(&self.plan_path)?;
        info!(row = idx + 1, "计划行已删除");
        Ok(true)
    }

    /// 从输出表读取目标行的全部非空列（按编码与名称定位第一条匹配行）
    pub fn row_details(
        &self,
        target: &PlanRowRecord,
        output_path: &Path,
    ) -> RepositoryResult<Vec<RowDetail>> {
        let workbook = PlanWorkbook::load(output_path)?;
        let sheet = workbook.sheet(None)?;

        let target_code = normalize_code_value(&target.code_raw);
        let target_name = query_form(&target.name_raw.to_string());

        let found = (1..sheet.row_count()).find(|&r| {
            let code = normalize_code_value(sheet.cell(r, CODE_COL));
            let name = query_form(&sheet.cell(r, NAME_COL).to_string());
            (target_code.is_empty() || code == target_code)
                && (target_name.is_empty() || name == target_name)
        });
        let Some(r) = found else {
            return Ok(Vec::new());
        };

        let mut details = Vec::new();
        for (c, header_cell) in sheet.header_row().iter().enumerate() {
            let header = clean_text(&header_cell.to_string());
            if header.is_empty() {
                continue;
            }
            let value = sheet.cell(r, c);
            if value.is_blank() {
                continue;
            }
            let value = value.to_string();
            let (meter, pallets) = split_meter_pallet(&value);
            details.push(RowDetail {
                header,
                value,
                meter,
                pallets,
            });
        }
        Ok(details)
    }
}

fn record_at(sheet: &Sheet, r: usize) -> Option<PlanRowRecord> {
    let code_raw = sheet.cell(r, CODE_COL).clone();
    let name_raw = sheet.cell(r, NAME_COL).clone();
    let size_raw = sheet.cell(r, SIZE_COL).clone();
    let divisor_raw = sheet.cell(r, DIVISOR_COL).clone();

    let code_display = normalize_code_value(&code_raw);
    let name_display = clean_text(&name_raw.to_string());
    if code_display.is_empty() && name_display.is_empty() {
        return None;
    }
    Some(PlanRowRecord {
        row: r + 1,
        size_display: clean_text(&size_raw.to_string()),
        divisor_display: normalize_code_value(&divisor_raw),
        code_raw,
        name_raw,
        size_raw,
        divisor_raw,
        code_display,
        name_display,
    })
}

fn same_identity(sheet: &Sheet, r: usize, code_norm: &str, name_norm: &str) -> bool {
    normalize_code_value(sheet.cell(r, CODE_COL)) == code_norm
        && query_form(&sheet.cell(r, NAME_COL).to_string()) == name_norm
}

/// 定位原行: 原行号处编码名称仍一致则直接使用,否则逐行查找
fn locate_row(sheet: &Sheet, original: &PlanRowRecord) -> Option<usize> {
    let code_norm = normalize_code_value(&original.code_raw);
    let name_norm = query_form(&original.name_raw.to_string());

    let hinted = original.row.checked_sub(1).filter(|&idx| {
        idx >= 1 && idx < sheet.row_count() && same_identity(sheet, idx, &code_norm, &name_norm)
    });
    hinted.or_else(|| {
        (1..sheet.row_count()).find(|&r| same_identity(sheet, r, &code_norm, &name_norm))
    })
}

fn divisor_cell(divisor: Decimal) -> CellValue {
    match divisor.to_f64() {
        Some(n) => CellValue::Number(n),
        None => CellValue::Text(divisor.to_string()),
    }
}

fn text_cell(value: &str) -> CellValue {
    let text = value.trim();
    if text.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(text.to_string())
    }
}

fn write_values(sheet: &mut Sheet, row: usize, values: &PlanRowValues) {
    sheet.set_cell(row, CODE_COL, text_cell(&values.code));
    sheet.set_cell(row, NAME_COL, text_cell(&values.name));
    sheet.set_cell(row, SIZE_COL, text_cell(&values.size));
    sheet.set_cell(row, DIVISOR_COL, divisor_cell(values.divisor));
}
