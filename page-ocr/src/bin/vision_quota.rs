use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use page_ocr::quota::{DEFAULT_FREE_TIER, DEFAULT_WINDOW_DAYS, MonitoringClient, QuotaWindow};
use page_ocr::settings::load_env;

/// 命令行参数：凭据、项目与统计窗口。
#[derive(Parser, Debug)]
#[command(
    name = "vision-quota",
    version,
    about = "统计 Cloud Vision 近期请求数与配额用量"
)]
struct Args {
    /// 服务账号 JSON 凭据
    #[arg(long, env = "GOOGLE_CRED_PATH")]
    cred_path: PathBuf,

    /// Google Cloud 项目 ID
    #[arg(long, env = "PROJECT_ID")]
    project_id: String,

    /// 统计最近多少天
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
    days: i64,

    /// 免费额度（单位）
    #[arg(long, default_value_t = DEFAULT_FREE_TIER)]
    free_tier: i64,
}

fn main() -> Result<()> {
    page_ocr::init_tracing();
    load_env()?;
    let args = Args::parse();

    let client = MonitoringClient::connect(&args.cred_path, &args.project_id)?;
    let window = QuotaWindow::last_days(args.days);
    let report = client.report(&window, args.free_tier)?;

    println!("最近 {} 天的 API 请求总数：{}", args.days, report.total_requests);
    println!("最近 {} 天的配额用量：{} 单位", args.days, report.total_quota_used);
    println!("{}", report.verdict());
    Ok(())
}
