use clap::Parser;
use nutriscan::adapters::wedge::shared_lines;
use nutriscan::core::app::CycleOutcome;
use nutriscan::utils::error::{AppError, ErrorSeverity};
use nutriscan::utils::logger;
use nutriscan::{config, CliArgs, LookupClient, ScanApp, TerminalPrompt, TerminalView, WedgeScanner};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

fn exit_code(e: &AppError) -> i32 {
    if e.is_recoverable() {
        return 2;
    }
    match e.severity() {
        ErrorSeverity::Critical => 3,
        _ => 1,
    }
}

fn fail(e: AppError) -> ! {
    tracing::error!(
        "❌ nutriscan failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting nutriscan");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 設定錯誤在啟動時即為致命錯誤
    let config = config::load(&args.config).unwrap_or_else(|e| fail(e));
    let lookup = LookupClient::new(&config).unwrap_or_else(|e| fail(e));
    tracing::info!("✅ Configuration loaded and validated successfully");

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, closing scanner");
            ctrl_c.cancel();
        }
    });

    let input = shared_lines(BufReader::new(tokio::io::stdin()));
    let scanner = WedgeScanner::new(input.clone());
    let view = TerminalView::new(std::io::stdout());
    let mut app = ScanApp::with_shutdown(config, scanner, lookup, view, shutdown);
    if let Some(symbologies) = args.symbologies {
        app = app.with_symbologies(symbologies);
    }

    if let Some(code) = args.code {
        match app.lookup_code(&code).await {
            Ok(CycleOutcome::Presented { outcome, .. }) => {
                tracing::debug!("Lookup outcome: {}", outcome.kind());
            }
            Ok(_) => tracing::info!("Lookup cancelled"),
            Err(e) => fail(e),
        }
        return Ok(());
    }

    let mut prompt = TerminalPrompt::new(input, std::io::stdout());
    if let Err(e) = app.run(&mut prompt).await {
        fail(e);
    }
    drop(app);

    // stdin 的讀取在阻塞執行緒上，無法取消；不等 EOF 直接結束
    std::process::exit(0)
}
