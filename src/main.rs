// ==========================================
// 库存对账回填系统 - 命令行入口
// ==========================================
// 子命令:
// - process: 库存明细与计划表对账并回填
// - rows:    计划行列表/查询/新增/修改/删除/明细
// ==========================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inventory_plan_reconciler::api::{
    parse_divisor, ProcessRequest, ReconcileApi, DEFAULT_INPUT, DEFAULT_OUTPUT, DEFAULT_PLAN,
};
use inventory_plan_reconciler::domain::{PlanRowRecord, PlanRowValues};
use inventory_plan_reconciler::importer::text_normalizer::cell_decimal;
use inventory_plan_reconciler::{logging, PlanDocumentStore, ReconcileConfig, APP_NAME, VERSION};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "inventory-plan-reconciler")]
#[command(about = "Reconcile an inventory extract against a plan workbook")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match inventory rows to plan rows and write the aggregates
    #[command(after_help = "\
Examples:
  inventory-plan-reconciler process --input stock.xlsx --plan template.xlsx --metric sellable
  inventory-plan-reconciler process --input stock.pdf --in-place --timeout 60 --report run.json")]
    Process(ProcessArgs),

    /// Manage plan rows (code, name, size, pallet divisor)
    #[command(subcommand)]
    Rows(RowsCommand),
}

#[derive(Args)]
struct ProcessArgs {
    /// Inventory extract (.xlsx/.xls/.ods/.csv/.pdf)
    #[arg(long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Plan workbook
    #[arg(long, default_value = DEFAULT_PLAN)]
    plan: PathBuf,

    /// Output workbook (ignored with --in-place)
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// sellable, physical or reserved (default from config)
    #[arg(long)]
    metric: Option<String>,

    /// Sheet name used for both documents
    #[arg(long)]
    sheet: Option<String>,

    /// Overwrite the plan workbook
    #[arg(long)]
    in_place: bool,

    /// Timeout in seconds (default from config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct PlanArg {
    /// Plan workbook
    #[arg(long, default_value = DEFAULT_PLAN)]
    plan: PathBuf,
}

#[derive(Subcommand)]
enum RowsCommand {
    /// List every plan row
    List {
        #[command(flatten)]
        plan: PlanArg,
    },
    /// Rows whose code or name contains the query
    Find {
        query: String,
        #[command(flatten)]
        plan: PlanArg,
    },
    /// Append a plan row
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        size: String,
        /// Pallet divisor (comma decimal point accepted)
        #[arg(long)]
        divisor: String,
        #[command(flatten)]
        plan: PlanArg,
    },
    /// Update a plan row by row number
    Update {
        row: usize,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        divisor: Option<String>,
        #[command(flatten)]
        plan: PlanArg,
    },
    /// Delete a plan row by row number
    Delete {
        row: usize,
        #[command(flatten)]
        plan: PlanArg,
    },
    /// Show the written values of a plan row in an output workbook
    Show {
        row: usize,
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        #[command(flatten)]
        plan: PlanArg,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);
    info!("{} v{}", APP_NAME, VERSION);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "执行失败");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ReconcileConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    let api = ReconcileApi::new(config, PlanDocumentStore::new("plan"));

    match cli.command {
        Commands::Process(args) => run_process(&api, args).await,
        Commands::Rows(command) => {
            // 计划行维护阻塞等待文档锁,放到阻塞线程执行
            tokio::task::spawn_blocking(move || run_rows(&api, command))
                .await
                .context("计划行任务异常终止")?
        }
    }
}

async fn run_process(api: &ReconcileApi, args: ProcessArgs) -> Result<()> {
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .or_else(|| api.config().process_timeout());
    let request = ProcessRequest {
        input_path: args.input,
        plan_path: args.plan,
        output_path: args.output,
        metric: args.metric,
        sheet: args.sheet,
        in_place: args.in_place,
    };

    let report = api.process_with_timeout(request, timeout).await?;

    println!("{}", report.output_path.display());
    println!(
        "metric={} entries={} updated={} unmatched={}{}",
        report.metric,
        report.entries_loaded,
        report.rows_updated,
        report.unmatched_rows.len(),
        if report.bootstrapped { " (columns bootstrapped)" } else { "" }
    );
    for row in &report.unmatched_rows {
        let code = row.code.map(|c| c.to_string()).unwrap_or_default();
        println!("  no update: row {} {} {} ({:?})", row.row, row.name, code, row.reason);
    }

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("写入运行报告失败: {}", path.display()))?;
    }
    Ok(())
}

fn print_rows(rows: &[PlanRowRecord]) {
    for row in rows {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            row.row, row.code_display, row.name_display, row.size_display, row.divisor_display
        );
    }
}

fn run_rows(api: &ReconcileApi, command: RowsCommand) -> Result<()> {
    match command {
        RowsCommand::List { plan } => print_rows(&api.list_rows(&plan.plan)?),
        RowsCommand::Find { query, plan } => print_rows(&api.find_rows(&plan.plan, &query)?),
        RowsCommand::Add {
            code,
            name,
            size,
            divisor,
            plan,
        } => {
            let values = PlanRowValues {
                code,
                name,
                size,
                divisor: parse_divisor(&divisor)?,
            };
            let row = api.add_row(&plan.plan, &values)?;
            println!("added row {}", row);
        }
        RowsCommand::Update {
            row,
            code,
            name,
            size,
            divisor,
            plan,
        } => {
            let original = api.row_at(&plan.plan, row)?;
            let divisor = match divisor {
                Some(text) => parse_divisor(&text)?,
                None => cell_decimal(&original.divisor_raw),
            };
            let values = PlanRowValues {
                code: code.unwrap_or_else(|| original.code_display.clone()),
                name: name.unwrap_or_else(|| original.name_display.clone()),
                size: size.unwrap_or_else(|| original.size_display.clone()),
                divisor,
            };
            if api.update_row(&plan.plan, &original, &values)? {
                println!("updated row {}", row);
            } else {
                anyhow::bail!("row {} changed concurrently; nothing updated", row);
            }
        }
        RowsCommand::Delete { row, plan } => {
            let original = api.row_at(&plan.plan, row)?;
            if api.delete_row(&plan.plan, &original)? {
                println!("deleted row {} ({})", row, original.label());
            } else {
                anyhow::bail!("row {} changed concurrently; nothing deleted", row);
            }
        }
        RowsCommand::Show { row, output, plan } => {
            let target = api.row_at(&plan.plan, row)?;
            println!("{}", target.label());
            for detail in api.row_details(&plan.plan, &target, &output)? {
                match (detail.pallets, detail.meter) {
                    (Some(pallets), Some(meter)) => {
                        println!("  {}: {} (pallets {})", detail.header, meter, pallets)
                    }
                    _ => println!("  {}: {}", detail.header, detail.value),
                }
            }
        }
    }
    Ok(())
}
