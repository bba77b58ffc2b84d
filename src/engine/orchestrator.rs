// ==========================================
// 库存对账回填系统 - 引擎编排器
// ==========================================
// 主流程: 加载库存明细 → 解析/引导表头 → 逐行匹配 → 汇总 → 回填 → 一次保存
// 约束: 保存前的任何失败都不会改动磁盘上的文档
// ==========================================

use crate::domain::inventory::InventoryEntry;
use crate::domain::plan::PlanRow;
use crate::domain::report::{ReconcileReport, UnmatchedRow};
use crate::domain::types::{BaseColumn, LabelKey, MetricLabel};
use crate::engine::aggregator::summarize;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::header_schema::{resolve_schema, ColumnSchema};
use crate::engine::matcher::{Matcher, PlanCodeIndex};
use crate::engine::writer::{describe, write_summary};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::inventory_loader::InventoryLoader;
use crate::importer::text_normalizer::{cell_code, cell_decimal, clean_text, query_form};
use crate::repository::document_lock::{DocumentLease, PlanDocumentStore};
use crate::repository::plan_workbook::{PlanWorkbook, Sheet};
use chrono::Utc;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==========================================
// ReconcileJob - 单次对账任务参数
// ==========================================
#[derive(Debug, Clone)]
pub struct ReconcileJob {
    pub input_path: PathBuf,
    pub plan_path: PathBuf,
    pub output_path: PathBuf,
    pub metric: MetricLabel,
    /// 工作表名称（库存表与计划表共用,缺省为第一个工作表）
    pub sheet: Option<String>,
    /// true: 覆盖计划表;false: 写到 output_path
    pub in_place: bool,
}

impl ReconcileJob {
    /// 实际写出的路径
    pub fn destination(&self) -> &Path {
        if self.in_place {
            &self.plan_path
        } else {
            &self.output_path
        }
    }
}

// ==========================================
// ReconcileEngine
// ==========================================
pub struct ReconcileEngine {
    loader: InventoryLoader,
}

impl ReconcileEngine {
    pub fn new(loader: InventoryLoader) -> Self {
        Self { loader }
    }

    /// 使用 pdftotext 提取文档表格
    pub fn with_pdftotext(pdftotext_bin: impl Into<String>) -> Self {
        Self::new(InventoryLoader::new(UniversalFileParser::new(pdftotext_bin)))
    }

    /// 执行一次对账回填
    ///
    /// # 参数
    /// - store: 计划表所属文档库
    /// - lease: 该文档库的租约,整个读-改-写期间持有
    /// - job: 任务参数
    #[instrument(skip(self, store, lease, job), fields(store = store.name(), metric = %job.metric, in_place = job.in_place))]
    pub fn process(
        &self,
        store: &PlanDocumentStore,
        lease: &DocumentLease,
        job: &ReconcileJob,
    ) -> EngineResult<ReconcileReport> {
        if !lease.belongs_to(store) {
            return Err(EngineError::LeaseMismatch(store.name().to_string()));
        }
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        for path in [&job.input_path, &job.plan_path] {
            if !path.exists() {
                return Err(EngineError::NotFound(path.display().to_string()));
            }
        }

        let sheet_name = job.sheet.as_deref();
        let entries = self.loader.load(&job.input_path, sheet_name)?;

        let mut workbook = PlanWorkbook::load(&job.plan_path)?;
        let sheet = workbook.sheet_mut(sheet_name)?;
        let (schema, bootstrapped) = resolve_schema(sheet, &entries);

        let (rows_updated, unmatched_rows) = reconcile_sheet(sheet, &schema, &entries, job.metric);

        let destination = job.destination().to_path_buf();
        workbook.save(&destination)?;

        let report = ReconcileReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            output_path: destination,
            metric: job.metric,
            bootstrapped,
            entries_loaded: entries.len(),
            rows_updated,
            unmatched_rows,
        };
        info!(
            run_id = %report.run_id,
            entries = report.entries_loaded,
            updated = report.rows_updated,
            unmatched = report.unmatched_rows.len(),
            bootstrapped,
            output = %report.output_path.display(),
            "对账回填完成"
        );
        Ok(report)
    }
}

/// 读取计划行（名称为空的行返回 None）
fn read_plan_row(
    sheet: &Sheet,
    r: usize,
    name_col: usize,
    code_col: usize,
    divisor_col: Option<usize>,
) -> Option<PlanRow> {
    let name = clean_text(&sheet.cell(r, name_col).to_string());
    if query_form(&name).is_empty() {
        return None;
    }
    Some(PlanRow {
        row: r + 1,
        name,
        code: cell_code(sheet.cell(r, code_col)),
        divisor: divisor_col
            .map(|c| cell_decimal(sheet.cell(r, c)))
            .unwrap_or(Decimal::ZERO),
    })
}

/// 逐行匹配、汇总并回填;返回 (更新行数, 未匹配行)
fn reconcile_sheet(
    sheet: &mut Sheet,
    schema: &ColumnSchema,
    entries: &[InventoryEntry],
    requested: MetricLabel,
) -> (usize, Vec<UnmatchedRow>) {
    let name_col = schema.base_column_or_fallback(BaseColumn::Name);
    let code_col = schema.base_column_or_fallback(BaseColumn::Code);
    let divisor_col = schema.base_column(BaseColumn::PalletDivisor);

    // 编码重复度统计覆盖所有数据行（无论是否有名称）
    let codes = PlanCodeIndex::from_codes(
        (1..sheet.row_count()).filter_map(|r| cell_code(sheet.cell(r, code_col))),
    );
    debug!(distinct_codes = codes.len(), "计划编码索引完成");

    let plan_rows: Vec<PlanRow> = (1..sheet.row_count())
        .filter_map(|r| read_plan_row(sheet, r, name_col, code_col, divisor_col))
        .collect();

    let matcher = Matcher::new(entries, &codes);
    let mut rows_updated = 0;
    let mut unmatched = Vec::new();

    for plan_row in &plan_rows {
        let result = matcher.find_matches(&plan_row.name, plan_row.code);
        if result.entries.is_empty() {
            debug!(row = plan_row.row, outcome = ?result.outcome, "计划行未匹配");
            unmatched.push(UnmatchedRow {
                row: plan_row.row,
                name: plan_row.name.clone(),
                code: plan_row.code,
                reason: result.outcome,
            });
            continue;
        }

        let idx = plan_row.row - 1;
        for (label_key, metric_cols) in schema.metric_columns() {
            let metric = label_key.resolve(requested);
            let summary = summarize(&result.entries, metric);
            let tonality_cols = match label_key {
                LabelKey::Metric(label) => schema.tonality_columns(*label),
                LabelKey::Default => None,
            };
            write_summary(sheet, idx, metric_cols, tonality_cols, &summary, plan_row.divisor);
            debug!(
                row = plan_row.row,
                label = ?label_key,
                matched = result.entries.len(),
                summary = %describe(&summary),
                "计划行回填"
            );
        }
        rows_updated += 1;
    }

    (rows_updated, unmatched)
}
