use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sigsync::api::{Api360Client, MailAdminApi};
use sigsync::cli::Args;
use sigsync::input::read_rows_from_path;
use sigsync::pipeline::{Orchestrator, RunOutcome, RunReport};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Missing .env is fine; flags and the real environment still apply.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref())?;

    let run_config = args.run_config()?;
    let api_config = args.api_config()?;

    let rows = read_rows_from_path(&args.csv)
        .with_context(|| format!("reading {}", args.csv.display()))?;

    eprintln!("✉️  sigsync v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   CSV: {} ({} rows)", args.csv.display(), rows.len());
    eprintln!("   Org: {}", api_config.org_id);
    eprintln!(
        "   Mode: {}{}",
        run_config.mode,
        if run_config.dry_run { " (dry run)" } else { "" }
    );
    eprintln!(
        "   Email check: {}",
        if run_config.strict_email { "strict" } else { "lenient" }
    );
    eprintln!("   Rate: {} req/s, {} user(s) at a time\n", run_config.rps, run_config.concurrency);

    let api: Arc<dyn MailAdminApi> = Arc::new(Api360Client::new(&api_config)?);
    let orchestrator = Orchestrator::new(api, run_config);
    let report = orchestrator.run(&rows).await;

    print_summary(&report);

    if let Some(path) = &args.report_json {
        report
            .write_json(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        eprintln!("   Report: {}", path.display());
    }
    if let Some(path) = &args.failed_csv {
        let written = report
            .write_failed_rows(path, &rows)
            .with_context(|| format!("writing failed rows to {}", path.display()))?;
        eprintln!("   Failed rows: {} written to {}", written, path.display());
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// stderr logging filtered by `RUST_LOG` (default `info`), plus an optional
/// daily log file. The returned guard must live until exit to flush the file.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "sigsync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

fn print_summary(report: &RunReport) {
    let counts = &report.counts;
    eprintln!();
    eprintln!("   Rows: {}", report.total_rows);
    eprintln!("   Applied: {}", counts.applied);
    eprintln!("   Skipped (dry run): {}", counts.skipped_dry_run);
    eprintln!("   Skipped (email mismatch): {}", counts.skipped_email_mismatch);
    eprintln!("   Failed: {}", counts.failed);

    for user in report.by_user().iter().filter(|u| u.counts.failed > 0) {
        for outcome in &user.rows {
            if let RunOutcome::Failed { reason } = outcome.outcome {
                eprintln!("     row {} user {}: {}", outcome.row, user.user_id, reason);
            }
        }
    }
}
