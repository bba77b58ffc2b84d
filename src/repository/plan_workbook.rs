// ==========================================
// 库存对账回填系统 - 计划表工作簿
// ==========================================
// 读取: calamine 读取全部工作表的单元格值（供匹配与汇总使用）
// 写出: 在源 xlsx 包上只改写被寻址的单元格,写入同目录临时文件后改名替换
// 说明: 公式/日期/样式/合并区域等未被寻址的内容原样保留;一次运行只保存一次
// ==========================================

use crate::domain::cell::CellValue;
use crate::importer::excel_grid::{read_all_sheet_grids, Grid};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::xlsx_patch::{patch_package, SheetEdits};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// 可写回的工作簿扩展名
const WRITABLE_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// 是否为可原样写回的 xlsx 包
pub fn is_writable_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WRITABLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn ensure_writable(path: &Path) -> RepositoryResult<()> {
    if is_writable_workbook(path) {
        Ok(())
    } else {
        Err(RepositoryError::UnsupportedFormat(path.display().to_string()))
    }
}

/// 工作表（0 起行列索引）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    rows: Grid,
    edits: SheetEdits,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Grid) -> Self {
        Self {
            name: name.into(),
            rows,
            edits: SheetEdits::default(),
        }
    }

    /// 已使用的行数
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 已使用的最大列数
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 表头行（第 1 行）
    pub fn header_row(&self) -> &[CellValue] {
        self.row(0)
    }

    /// 是否有待写回的编辑
    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    /// 写入单元格,按需扩展网格;保存时只改写被写入过的单元格
    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            if value == CellValue::Empty {
                return;
            }
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            if value == CellValue::Empty {
                return;
            }
            cells.resize(col + 1, CellValue::Empty);
        }
        self.edits.set_cell(row, col, value.clone());
        cells[col] = value;
    }

    /// 删除一行,下方各行上移
    pub fn delete_row(&mut self, row: usize) {
        if row < self.rows.len() {
            self.rows.remove(row);
            self.edits.delete_row(row);
        }
    }
}

/// 计划表工作簿（记住来源包,保存时在其上打补丁）
#[derive(Debug, Clone, PartialEq)]
pub struct PlanWorkbook {
    source: PathBuf,
    sheets: Vec<Sheet>,
}

impl PlanWorkbook {
    /// 读取整个工作簿
    pub fn load(path: &Path) -> RepositoryResult<Self> {
        if !path.exists() {
            return Err(RepositoryError::NotFound(path.display().to_string()));
        }
        let sheets: Vec<Sheet> = read_all_sheet_grids(path)?
            .into_iter()
            .map(|(name, rows)| Sheet::new(name, rows))
            .collect();
        debug!(path = %path.display(), sheets = sheets.len(), "工作簿读取完成");
        Ok(Self {
            source: path.to_path_buf(),
            sheets,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    fn sheet_index(&self, selector: Option<&str>) -> RepositoryResult<usize> {
        match selector {
            Some(name) => self
                .sheets
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| RepositoryError::SheetNotFound(name.to_string())),
            None if self.sheets.is_empty() => {
                Err(RepositoryError::ReadError("工作簿无工作表".to_string()))
            }
            None => Ok(0),
        }
    }

    /// 选择工作表: 指定名称,否则第一个工作表
    pub fn sheet(&self, selector: Option<&str>) -> RepositoryResult<&Sheet> {
        let idx = self.sheet_index(selector)?;
        Ok(&self.sheets[idx])
    }

    pub fn sheet_mut(&mut self, selector: Option<&str>) -> RepositoryResult<&mut Sheet> {
        let idx = self.sheet_index(selector)?;
        Ok(&mut self.sheets[idx])
    }

    /// 保存到目标路径（源包补丁 → 临时文件 → 改名）
    pub fn save(&self, path: &Path) -> RepositoryResult<()> {
        ensure_writable(&self.source)?;
        ensure_writable(path)?;

        let edits: BTreeMap<String, SheetEdits> = self
            .sheets
            .iter()
            .filter(|s| s.is_dirty())
            .map(|s| (s.name.clone(), s.edits.clone()))
            .collect();

        let tmp_path = temp_sibling(path);
        if let Err(e) = patch_package(&self.source, &tmp_path, &edits) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, path) {
            warn!(error = %e, "临时文件改名失败");
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        info!(path = %path.display(), sheets_edited = edits.len(), "工作簿已保存");
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook".to_string());
    path.with_file_name(format!(".{}.{}.tmp.xlsx", file_name, Uuid::new_v4()))
}
