// ==========================================
// 库存对账回填系统 - 对账 API
// ==========================================
// 职责: 调用契约 process(...) 与计划行维护
// 约束:
// - 指标名在任何 I/O 之前校验
// - 每次读-改-写都在同一文档库的租约下进行
// - 超时只放弃结果,不代表文档未被写入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ReconcileConfig;
use crate::domain::plan::{PlanRowRecord, PlanRowValues, RowDetail};
use crate::domain::report::ReconcileReport;
use crate::domain::types::MetricLabel;
use crate::engine::orchestrator::{ReconcileEngine, ReconcileJob};
use crate::importer::text_normalizer::try_parse_decimal;
use crate::repository::document_lock::PlanDocumentStore;
use crate::repository::plan_rows::PlanRowRepository;
use crate::repository::plan_workbook::is_writable_workbook;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

pub const DEFAULT_INPUT: &str = "input.xlsx";
pub const DEFAULT_PLAN: &str = "template.xlsx";
pub const DEFAULT_OUTPUT: &str = "output_from_template.xlsx";

// ==========================================
// ProcessRequest - 对账请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub input_path: PathBuf,
    pub plan_path: PathBuf,
    pub output_path: PathBuf,
    /// sellable / physical / reserved;缺省取配置中的默认指标
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub in_place: bool,
}

impl Default for ProcessRequest {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT),
            plan_path: PathBuf::from(DEFAULT_PLAN),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            metric: None,
            sheet: None,
            in_place: false,
        }
    }
}

// ==========================================
// ReconcileApi
// ==========================================
#[derive(Clone)]
pub struct ReconcileApi {
    engine: Arc<ReconcileEngine>,
    store: PlanDocumentStore,
    config: ReconcileConfig,
}

impl ReconcileApi {
    pub fn new(config: ReconcileConfig, store: PlanDocumentStore) -> Self {
        let engine = ReconcileEngine::with_pdftotext(config.pdftotext_bin.clone());
        Self::with_engine(engine, config, store)
    }

    /// 注入自定义引擎（测试中替换文档提取器）
    pub fn with_engine(
        engine: ReconcileEngine,
        config: ReconcileConfig,
        store: PlanDocumentStore,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            config,
        }
    }

    pub fn store(&self) -> &PlanDocumentStore {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// 校验请求并转为引擎任务（不做任何 I/O）
    pub fn validate_request(&self, request: &ProcessRequest) -> ApiResult<ReconcileJob> {
        let metric = match request.metric.as_deref() {
            Some(raw) => raw
                .parse::<MetricLabel>()
                .map_err(|e| ApiError::InvalidInput(e.to_string()))?,
            None => self.config.default_metric,
        };
        for (field, path) in [
            ("input_path", &request.input_path),
            ("plan_path", &request.plan_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
            }
        }
        if !request.in_place && request.output_path.as_os_str().is_empty() {
            return Err(ApiError::InvalidInput("output_path不能为空".to_string()));
        }
        let mut written = vec![&request.plan_path];
        if !request.in_place {
            written.push(&request.output_path);
        }
        if let Some(path) = written.into_iter().find(|p| !is_writable_workbook(p)) {
            return Err(ApiError::InvalidInput(format!(
                "计划表与输出表必须是 xlsx/xlsm 工作簿: {}",
                path.display()
            )));
        }

        Ok(ReconcileJob {
            input_path: request.input_path.clone(),
            plan_path: request.plan_path.clone(),
            output_path: request.output_path.clone(),
            metric,
            sheet: request.sheet.clone().or_else(|| self.config.sheet.clone()),
            in_place: request.in_place,
        })
    }

    /// 同步执行对账（阻塞等待文档锁,不可在异步上下文中调用）
    #[instrument(skip(self, request))]
    pub fn process(&self, request: &ProcessRequest) -> ApiResult<ReconcileReport> {
        let job = self.validate_request(request)?;
        let lease = self.store.acquire();
        Ok(self.engine.process(&self.store, &lease, &job)?)
    }

    /// 在后台线程执行对账,可选超时
    ///
    /// 超时覆盖等待文档锁与执行两个阶段:
    /// - 等锁超时: LockError,文档未被触碰
    /// - 执行超时: Timeout,后台任务继续持有租约直至结束,文档最终状态未知
    #[instrument(skip(self, request))]
    pub async fn process_with_timeout(
        &self,
        request: ProcessRequest,
        timeout: Option<Duration>,
    ) -> ApiResult<ReconcileReport> {
        let job = self.validate_request(&request)?;
        let deadline = timeout.map(|limit| Instant::now() + limit);

        let lease = match deadline {
            Some(at) => tokio::time::timeout_at(at, self.store.acquire_async())
                .await
                .map_err(|_| ApiError::LockError(format!("等待文档库{}超时", self.store.name())))?,
            None => self.store.acquire_async().await,
        };

        let engine = Arc::clone(&self.engine);
        let store = self.store.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let result = engine.process(&store, &lease, &job);
            drop(lease);
            result
        });

        let joined = match (deadline, timeout) {
            (Some(at), Some(limit)) => match tokio::time::timeout_at(at, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis(), "对账处理超时,结果已放弃");
                    return Err(ApiError::Timeout {
                        millis: limit.as_millis(),
                    });
                }
            },
            _ => handle.await,
        };
        let result =
            joined.map_err(|e| ApiError::InternalError(format!("后台任务异常终止: {}", e)))?;
        Ok(result?)
    }

    // ==========================================
    // 计划行维护（阻塞等待文档锁）
    // ==========================================

    pub fn list_rows(&self, plan_path: &Path) -> ApiResult<Vec<PlanRowRecord>> {
        let lease = self.store.acquire();
        Ok(PlanRowRepository::new(plan_path).list_rows(&lease)?)
    }

    pub fn find_rows(&self, plan_path: &Path, query: &str) -> ApiResult<Vec<PlanRowRecord>> {
        let lease = self.store.acquire();
        Ok(PlanRowRepository::new(plan_path).find_rows(&lease, query)?)
    }

    /// 按行号取计划行（1 起）
    pub fn row_at(&self, plan_path: &Path, row: usize) -> ApiResult<PlanRowRecord> {
        self.list_rows(plan_path)?
            .into_iter()
            .find(|r| r.row == row)
            .ok_or_else(|| ApiError::NotFound(format!("计划行{}不存在", row)))
    }

    pub fn add_row(&self, plan_path: &Path, values: &PlanRowValues) -> ApiResult<usize> {
        validate_values(values)?;
        let lease = self.store.acquire();
        let row = PlanRowRepository::new(plan_path).append_row(&lease, values)?;
        info!(row, "新增计划行");
        Ok(row)
    }

    pub fn update_row(
        &self,
        plan_path: &Path,
        original: &PlanRowRecord,
        values: &PlanRowValues,
    ) -> ApiResult<bool> {
        validate_values(values)?;
        let lease = self.store.acquire();
        Ok(PlanRowRepository::new(plan_path).update_row(&lease, original, values)?)
    }

    pub fn delete_row(&self, plan_path: &Path, original: &PlanRowRecord) -> ApiResult<bool> {
        let lease = self.store.acquire();
        Ok(PlanRowRepository::new(plan_path).delete_row(&lease, original)?)
    }

    /// 输出表中目标行的明细（只读,不需要租约）
    pub fn row_details(
        &self,
        plan_path: &Path,
        target: &PlanRowRecord,
        output_path: &Path,
    ) -> ApiResult<Vec<RowDetail>> {
        Ok(PlanRowRepository::new(plan_path).row_details(target, output_path)?)
    }
}

fn validate_values(values: &PlanRowValues) -> ApiResult<()> {
    if values.code.trim().is_empty() && values.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("编码与名称不能同时为空".to_string()));
    }
    Ok(())
}

/// 解析托盘折算系数文本（允许逗号作小数点）
pub fn parse_divisor(text: &str) -> ApiResult<Decimal> {
    try_parse_decimal(text)
        .ok_or_else(|| ApiError::InvalidInput(format!("托盘折算系数非法: {}", text.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn api() -> ReconcileApi {
        ReconcileApi::new(ReconcileConfig::default(), PlanDocumentStore::new("test"))
    }

    #[test]
    fn test_unsupported_metric_rejected_before_io() {
        let request = ProcessRequest {
            input_path: PathBuf::from("/definitely/missing/in.xlsx"),
            metric: Some("weight".to_string()),
            ..ProcessRequest::default()
        };
        let err = api().process(&request).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_metric_defaults_from_config() {
        let mut config = ReconcileConfig::default();
        config.default_metric = MetricLabel::Reserved;
        config.sheet = Some("Plan".to_string());
        let api = ReconcileApi::new(config, PlanDocumentStore::new("test"));

        let job = api.validate_request(&ProcessRequest::default()).unwrap();
        assert_eq!(job.metric, MetricLabel::Reserved);
        assert_eq!(job.sheet.as_deref(), Some("Plan"));
        assert_eq!(job.output_path, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn test_non_xlsx_plan_or_output_rejected_before_io() {
        let request = ProcessRequest {
            plan_path: PathBuf::from("/definitely/missing/template.ods"),
            in_place: true,
            ..ProcessRequest::default()
        };
        assert!(matches!(
            api().validate_request(&request),
            Err(ApiError::InvalidInput(_))
        ));

        let request = ProcessRequest {
            output_path: PathBuf::from("out.csv"),
            ..ProcessRequest::default()
        };
        assert!(matches!(
            api().validate_request(&request),
            Err(ApiError::InvalidInput(_))
        ));

        // 原地写回时输出路径不参与校验
        let request = ProcessRequest {
            output_path: PathBuf::from("out.csv"),
            in_place: true,
            ..ProcessRequest::default()
        };
        assert!(api().validate_request(&request).is_ok());
    }

    #[test]
    fn test_parse_divisor() {
        assert_eq!(parse_divisor("1,44").unwrap(), Decimal::from_str("1.44").unwrap());
        assert_eq!(parse_divisor("۵").unwrap(), Decimal::from(5));
        assert!(matches!(parse_divisor("abc"), Err(ApiError::InvalidInput(_))));
        assert!(parse_divisor("  ").is_err());
    }

    #[test]
    fn test_add_row_requires_identity() {
        let values = PlanRowValues {
            code: " ".to_string(),
            name: String::new(),
            size: "60x60".to_string(),
            divisor: Decimal::ONE,
        };
        let err = api()
            .add_row(Path::new("/definitely/missing/plan.xlsx"), &values)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
