use anyhow::Context;
use clap::{Parser, Subcommand};
use kbu_menu::app;
use kbu_menu::config::{Settings, DEFAULT_CONFIG_PATH};
use kbu_menu::domain::model::Cafeteria;
use kbu_menu::utils::error::{ErrorCategory, MenuError};
use kbu_menu::utils::{logger, validation::Validate};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "kbu-menu")]
#[command(about = "Daily cafeteria menus: scrape, describe, cache and notify")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily refresh scheduler until Ctrl-C
    Serve,
    /// Print today's menu
    Show {
        /// Only this cafeteria (peony or azilea)
        #[arg(long)]
        cafeteria: Option<Cafeteria>,
    },
    /// Send today's menu to the configured recipients
    Notify,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.json_logs);

    if let Err(e) = run(args).await {
        std::process::exit(report_failure(&e));
    }
}

/// Logs the failure once and picks the exit code.
fn report_failure(error: &anyhow::Error) -> i32 {
    tracing::error!("❌ {:#}", error);
    exit_code(error)
}

async fn run(args: Args) -> anyhow::Result<()> {
    tracing::info!("📁 Loading configuration from: {}", args.config);
    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;
    settings.validate().context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Shutdown requested");
            ctrl_c.cancel();
        }
    });

    let clock = app::build_clock(&settings);
    let orchestrator = app::build_orchestrator(&settings, clock.clone()).await?;

    match args.command {
        Command::Serve => {
            if !settings.scheduler.enabled {
                tracing::warn!("Scheduler disabled in configuration, nothing to serve");
                return Ok(());
            }
            let scheduler = app::build_scheduler(&settings, orchestrator, clock);
            scheduler.start();
            cancel.cancelled().await;
            scheduler.stop().await;
        }
        Command::Show { cafeteria: Some(cafeteria) } => {
            let menu = orchestrator.get_menu(cafeteria, &cancel).await?;
            println!("{}:\n{}", cafeteria.title(), menu);
        }
        Command::Show { cafeteria: None } => {
            let text = app::build_board(orchestrator).compose(&cancel).await?;
            println!("{}", text);
        }
        Command::Notify => {
            let (dispatcher, recipients) = app::build_dispatcher(&settings)?;
            let text = app::build_board(orchestrator).compose(&cancel).await?;
            let report = dispatcher.dispatch(&recipients, &text, &cancel).await;

            println!("📨 Sent to {} of {} recipients", report.sent, recipients.len());
            if !report.is_complete() {
                anyhow::bail!("{} notification(s) were not delivered", report.failed.len());
            }
        }
    }

    Ok(())
}

// 根據錯誤類型決定退出碼
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<MenuError>().map(MenuError::category) {
        Some(ErrorCategory::Configuration) => 2,
        Some(ErrorCategory::Transient) => 3,
        Some(ErrorCategory::Structural) => 4,
        Some(ErrorCategory::Enrichment) => 5,
        Some(ErrorCategory::Storage) => 6,
        Some(ErrorCategory::Cancelled) => 130,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbu_menu::utils::error::Stage;

    #[test]
    fn test_exit_code_follows_category_through_context() {
        let err = anyhow::Error::new(MenuError::MissingConfigError {
            field: "sources.peony_url".to_string(),
        })
        .context("invalid configuration");
        assert_eq!(report_failure(&err), 2);
    }

    #[test]
    fn test_exit_code_for_staged_and_foreign_errors() {
        let staged = MenuError::Cancelled.at(Cafeteria::Peony, Stage::Fetch);
        assert_eq!(exit_code(&anyhow::Error::new(staged)), 130);

        let persist = MenuError::IoError(std::io::Error::other("disk full"))
            .at(Cafeteria::Azilea, Stage::Persist);
        assert_eq!(exit_code(&anyhow::Error::new(persist)), 6);

        assert_eq!(exit_code(&anyhow::anyhow!("2 notification(s) were not delivered")), 1);
    }
}
