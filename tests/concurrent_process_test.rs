// ==========================================
// 并发控制与超时测试
// ==========================================
// 测试目标: 文档锁串行化、后台执行、超时语义
// ==========================================

mod test_helpers;

use inventory_plan_reconciler::api::ApiError;
use inventory_plan_reconciler::domain::CellValue;
use inventory_plan_reconciler::importer::{
    FileParser, ImportResult, InventoryLoader, RawTable, UniversalFileParser,
};
use inventory_plan_reconciler::{
    PlanDocumentStore, ReconcileApi, ReconcileConfig, ReconcileEngine,
};
use std::path::Path;
use std::time::Duration;
use test_helpers::*;

/// 模拟耗时的文档提取
struct SlowDocumentParser {
    delay: Duration,
}

impl FileParser for SlowDocumentParser {
    fn parse_tables(&self, _file_path: &Path, _sheet: Option<&str>) -> ImportResult<Vec<RawTable>> {
        std::thread::sleep(self.delay);
        Ok(vec![RawTable {
            headers: vec!["نام کالا".to_string(), "درجه".to_string(), "موجودی قابل فروش".to_string()],
            rows: vec![vec![
                CellValue::from("Foo"),
                CellValue::from("A/2"),
                CellValue::from("7"),
            ]],
        }])
    }
}

fn slow_api(delay: Duration) -> ReconcileApi {
    let parser = UniversalFileParser::with_document_parser(Box::new(SlowDocumentParser { delay }));
    let engine = ReconcileEngine::new(InventoryLoader::new(parser));
    ReconcileApi::with_engine(engine, ReconcileConfig::default(), PlanDocumentStore::new("slow"))
}

fn fixture_with_pdf() -> (Fixture, std::path::PathBuf) {
    let fx = Fixture::new(
        Vec::new(),
        vec![
            plan_header(&["مجموع طرح (قابل فروش)"]),
            plan_row(None, "Foo", 0.0),
        ],
    );
    let pdf = fx.dir.path().join("stock.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();
    (fx, pdf)
}

#[tokio::test]
async fn test_process_on_worker_without_timeout() {
    let fx = Fixture::new(
        inventory(vec![stock("Foo", "", "A/2", "", 12.0, 3.0)]),
        vec![plan_header(&[]), plan_row(Some(100.0), "Foo", 5.0)],
    );
    let report = api()
        .process_with_timeout(fx.request("physical"), None)
        .await
        .unwrap();
    assert_eq!(report.rows_updated, 1);
    assert!(fx.output.exists());
}

#[tokio::test]
async fn test_unsupported_metric_is_rejected_before_lock() {
    let api = api();
    let _held = api.store().acquire_async().await;
    let fx = Fixture::new(Vec::new(), Vec::new());
    // 锁被占用也立即返回
    let err = api
        .process_with_timeout(fx.request("weight"), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_waiting_for_held_lock_times_out_without_touching_documents() {
    let fx = Fixture::new(
        inventory(vec![stock("Foo", "", "A/2", "", 1.0, 0.0)]),
        vec![plan_header(&[]), plan_row(None, "Foo", 0.0)],
    );
    let api = api();
    let held = api.store().acquire_async().await;

    let err = api
        .process_with_timeout(fx.request("physical"), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::LockError(_)));
    assert!(!fx.output.exists());

    drop(held);
    api.process_with_timeout(fx.request("physical"), Some(Duration::from_secs(30)))
        .await
        .unwrap();
    assert!(fx.output.exists());
}

#[tokio::test]
async fn test_timeout_reports_unknown_state_and_worker_keeps_lease() {
    let (fx, pdf) = fixture_with_pdf();
    let api = slow_api(Duration::from_millis(400));
    let mut request = fx.request("sellable");
    request.input_path = pdf;

    let err = api
        .process_with_timeout(request, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Timeout { millis: 50 }));

    // 后台任务仍持有租约,结束后才释放;结果已写出
    assert!(api.store().try_acquire().is_none());
    let lease = tokio::time::timeout(Duration::from_secs(10), api.store().acquire_async())
        .await
        .expect("后台任务应释放文档锁");
    drop(lease);
    assert_eq!(cell_text(&fx.output, 1, 4), "7");
}

#[tokio::test]
async fn test_runs_against_one_store_are_serialized() {
    let (fx, pdf) = fixture_with_pdf();
    let api = slow_api(Duration::from_millis(100));
    let mut request = fx.request("sellable");
    request.input_path = pdf;

    let first = api.process_with_timeout(request.clone(), None);
    let second = api.process_with_timeout(request, None);
    let (a, b) = tokio::join!(first, second);
    let (a, b) = (a.unwrap(), b.unwrap());

    // 两次运行不重叠
    assert!(a.finished_at <= b.started_at || b.finished_at <= a.started_at);
}
