use anyhow::Context;
use clap::Parser;
use rootfix::app::report;
use rootfix::utils::error::ErrorSeverity;
use rootfix::utils::logger;
use rootfix::{BatchOrchestrator, CliConfig, LogFormat, RootfixError};

fn exit_code(e: &RootfixError) -> i32 {
    match e {
        RootfixError::CorpusUnavailable { .. } => 1,
        e if e.is_fatal() => 2,
        e => match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::Medium => 0,
            ErrorSeverity::High => 2,
            ErrorSeverity::Critical => 1,
        },
    }
}

fn fail(e: &RootfixError) -> ! {
    tracing::error!("❌ {} ({:?})", e, e.severity());
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Text => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    tracing::debug!("Run config: {:?}", config);

    let rewriter = match config.rewriter() {
        Ok(rewriter) => rewriter,
        Err(e) => fail(&e),
    };
    let orchestrator =
        BatchOrchestrator::new(config.store(), rewriter, config.batch_options());

    let run = match orchestrator.run().await {
        Ok(run) => run,
        Err(e) => fail(&e),
    };

    print!("{}", report::render_summary(&run));

    if let Some(path) = &config.report_json {
        report::write_json(&run, path)
            .await
            .with_context(|| format!("writing the JSON report to {}", path.display()))?;
    }
    if let Some(path) = &config.log_file {
        report::append_log(&run, path)
            .await
            .with_context(|| format!("appending to the run log {}", path.display()))?;
    }

    if run.has_failures() {
        tracing::warn!("⚠️ {} documents failed", run.failed.len());
    } else {
        tracing::info!("✅ Done");
    }
    Ok(())
}
