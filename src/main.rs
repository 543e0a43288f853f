use clap::Parser;
use health_store::config::{AppConfig, Cli, Command};
use health_store::core::csv_io::{export_csv, import_csv};
use health_store::core::snapshot::{self, Snapshot};
use health_store::utils::error::{ErrorSeverity, Result, StoreError};
use health_store::utils::{logger, validation};
use health_store::utils::validation::Validate;
use health_store::{connect, Adapter, Store, Table};
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 載入 TOML 配置；未指定時使用記憶體儲存
    let config = match &cli.config {
        Some(path) => match AppConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    // 初始化日誌
    if config.logging.json {
        logger::init_json_logger(config.logging.level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, config.logging.level.as_deref());
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli.command, &config).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            command_name(&cli.command),
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 4,      // 請求本身有誤
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 資料錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(command: &Command, config: &AppConfig) -> Result<()> {
    let store = connect(config).await?;

    match command {
        Command::Request {
            method,
            path,
            body,
            timeout_ms,
        } => {
            let adapter =
                Adapter::new(store.clone()).with_default_limit(config.store.default_page_limit);
            let response = match timeout_ms {
                Some(ms) => {
                    adapter
                        .fetch_with_timeout(path, method, body.as_deref(), Duration::from_millis(*ms))
                        .await?
                }
                None => adapter.fetch(path, method, body.as_deref()).await?,
            };

            println!("{} {}", response.status, response.status_text);
            let body = response.json().await?;
            if !body.is_null() {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            if !response.ok {
                std::process::exit(1);
            }
        }
        Command::ImportCsv { table, file } => {
            let table: Table = table.parse()?;
            let text = read_input(file, &["csv"]).await?;
            let summary = import_csv(&*store, table, &text, config.store.batch_chunk_size).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.batch.is_complete_success() {
                println!("✅ {} records registered", summary.batch.success_count);
            } else {
                println!(
                    "⚠️ {}/{} registered, {} failed, {} rows skipped",
                    summary.batch.success_count,
                    summary.batch.total(),
                    summary.batch.failed_count,
                    summary.skipped
                );
            }
        }
        Command::ExportCsv { kind, output } => {
            let csv = export_csv(&*store, *kind).await?;
            write_output(output.as_deref(), &csv).await?;
        }
        Command::ExportJson { output } => {
            let snapshot = snapshot::export_snapshot(&*store).await?;
            write_output(output.as_deref(), &serde_json::to_string_pretty(&snapshot)?).await?;
        }
        Command::ImportJson { file } => {
            let text = read_input(file, &["json"]).await?;
            let restored = snapshot::restore_snapshot(&*store, Snapshot::from_json_str(&text)?).await?;
            for (table, count) in restored {
                println!("📥 {}: {} records", table, count);
            }
        }
        Command::Migrate { to_config } => {
            let target_config = AppConfig::from_file(to_config)?;
            target_config.validate()?;
            let target = connect(&target_config).await?;

            let report = snapshot::migrate(&*store, &*target).await;
            println!("{}", serde_json::to_string_pretty(&report.counts())?);
            if !report.is_complete() {
                return Err(StoreError::backend(format!(
                    "Migration incomplete, {} records copied",
                    report.total_migrated()
                )));
            }
        }
        Command::Ping => {
            store.health_check().await?;
            println!("✅ {} store is reachable", store.name());
        }
        Command::Reset => {
            snapshot::reset_store(&*store).await?;
            println!("🧹 {} store reset to sample data", store.name());
        }
    }

    Ok(())
}

async fn read_input(file: &Path, extensions: &[&str]) -> Result<String> {
    let name = file.to_string_lossy();
    validation::validate_file_extension("file", &name, extensions)?;
    Ok(tokio::fs::read_to_string(file).await?)
}

async fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, content).await?;
            tracing::info!("📁 Output saved to: {}", path.display());
            println!("📁 Output saved to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Request { .. } => "request",
        Command::ImportCsv { .. } => "import-csv",
        Command::ExportCsv { .. } => "export-csv",
        Command::ExportJson { .. } => "export-json",
        Command::ImportJson { .. } => "import-json",
        Command::Migrate { .. } => "migrate",
        Command::Ping => "ping",
        Command::Reset => "reset",
    }
}
