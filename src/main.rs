//! 週批次規劃命令列工具
//!
//! 用法：
//!   yard-planner <request.json>
//!
//! 請求檔示例：
//! ```json
//! {
//!   "data_dir": "instancias",
//!   "weeks": { "year": 2022 },
//!   "participation": 68,
//!   "criterion": "criterio_ii",
//!   "config": { "yard": { "time_limit_secs": 120 } }
//! }
//! ```
//!
//! 結果以 JSON 輸出到標準輸出：`report` 為可行/不可行週與各週狀態，
//! `results` 為各週的載入報告、堆場彙總、吊機班次彙總與不可行診斷。

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;
use yard_core::PlannerConfig;
use yard_optimizer::GoodLpEngine;
use yard_weekly::{logging, BatchRequest, JsonDirectoryRepository, Orchestrator};

#[derive(Debug, Deserialize)]
struct CliRequest {
    data_dir: PathBuf,
    #[serde(flatten)]
    batch: BatchRequest,
    #[serde(default)]
    config: PlannerConfig,
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("用法: yard-planner <request.json>");
    };

    let content =
        std::fs::read_to_string(&path).with_context(|| format!("無法讀取請求檔 {}", path))?;
    let request: CliRequest =
        serde_json::from_str(&content).with_context(|| format!("請求檔格式錯誤 {}", path))?;

    let orchestrator = Orchestrator::new(
        GoodLpEngine::new(),
        JsonDirectoryRepository::new(&request.data_dir),
        request.config,
    )
    .context("配置無效")?;

    let output = orchestrator
        .run_collected(&request.batch)
        .context("批次執行失敗")?;

    tracing::info!(
        "可行 {} 週，不可行 {} 週，診斷 {} 筆",
        output.report.feasible.len(),
        output.report.infeasible.len(),
        output.results.diagnoses.len()
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
