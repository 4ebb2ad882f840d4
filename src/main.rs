//! # API Key Tester 主程序
//!
//! 批量校验 LLM 服务商 API 密钥的命令行入口

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use api_key_tester::{
    AdapterRegistry, BatchRunner, DatabaseStorage, ProviderType, TesterContext, TesterError,
    ValidationRequest,
    config::ConfigManager,
    database,
    error::ErrorCategory,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    report::{self, OutputFormat},
    tester::{ResultQuery, ResultStatus},
};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "api-key-tester", version)]
#[command(about = "Batch validation engine for LLM provider API keys")]
struct Cli {
    /// 配置文件路径，缺省按 KEY_TESTER_CONFIG_PATH / config/config.{RUST_ENV}.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a batch of keys against one provider
    Test {
        #[arg(long, value_parser = parse_provider)]
        provider: ProviderType,
        #[arg(long)]
        model: String,
        /// One key per line; `-` reads stdin
        #[arg(long)]
        keys_file: PathBuf,
        /// Replaces the provider's default base URL
        #[arg(long)]
        proxy_url: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        retry_count: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Page through the stored results of a batch
    Results {
        test_id: String,
        #[arg(long, value_parser = parse_status)]
        status: Option<ResultStatus>,
        #[arg(long, value_parser = parse_provider)]
        provider: Option<ProviderType>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        page_size: Option<u64>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List supported providers and their default base URLs
    Providers,
}

fn parse_provider(value: &str) -> Result<ProviderType, String> {
    ProviderType::parse(value).map_err(|e| e.to_string())
}

fn parse_status(value: &str) -> Result<ResultStatus, String> {
    ResultStatus::parse(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(Some(&cli.log_level));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}

/// 参数类错误返回 2，其余返回 1
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let category = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<TesterError>())
        .map(TesterError::category);
    match category {
        Some(ErrorCategory::Client) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Providers => {
            for provider in ProviderType::ALL {
                println!("{:<14}{}", provider.as_str(), provider.default_base_url());
            }
            Ok(())
        }
        Command::Test {
            provider,
            model,
            keys_file,
            proxy_url,
            concurrency,
            retry_count,
            format,
        } => {
            let keys = read_keys(&keys_file).await?;
            let mut request = ValidationRequest::new(provider.as_str(), model, keys);
            if let Some(url) = proxy_url {
                request = request.with_proxy_base_url(url);
            }
            if let Some(concurrency) = concurrency {
                request = request.with_concurrency(concurrency);
            }
            if let Some(retry_count) = retry_count {
                request = request.with_retry_count(retry_count);
            }

            let runner = build_runner(cli.config.as_deref()).await?;
            let cancel = CancellationToken::new();
            spawn_ctrl_c_handler(cancel.clone());

            let batch = runner.run_batch_with_cancel(request, cancel).await?;
            print!("{}", report::render_batch(&batch, format)?);
            Ok(())
        }
        Command::Results {
            test_id,
            status,
            provider,
            page,
            page_size,
            format,
        } => {
            let runner = build_runner(cli.config.as_deref()).await?;
            let query = ResultQuery {
                status,
                provider,
                page,
                page_size,
            };
            let results = runner.results(&test_id, query).await?;
            print!("{}", report::render_results(&results, format)?);
            Ok(())
        }
    }
}

/// 加载配置、初始化数据库并组装批次协调器
async fn build_runner(config_path: Option<&Path>) -> anyhow::Result<BatchRunner> {
    let manager = match config_path {
        Some(path) => ConfigManager::from_file(path),
        None => ConfigManager::new(),
    }
    .context("配置管理器初始化失败")?;
    let config = Arc::new(manager.into_config());

    let db = database::init_database(&config.database)
        .await
        .context("数据库连接失败")?;
    database::run_migrations(&db)
        .await
        .context("数据库迁移失败")?;

    let registry = AdapterRegistry::new(&config).context("适配器注册表初始化失败")?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "runner_ready",
        "批次协调器就绪",
        providers = registry.providers().len()
    );

    Ok(BatchRunner::new(TesterContext::new(
        config,
        Arc::new(DatabaseStorage::new(db)),
        Arc::new(registry),
    )))
}

/// Ctrl-C 时取消批次，已开始的密钥在当前请求结束后停止
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    lerror!(
                        "system",
                        LogStage::Shutdown,
                        LogComponent::Main,
                        "signal_listen_failed",
                        &format!("监听 Ctrl-C 失败: {e}")
                    );
                    return;
                }
                linfo!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::Main,
                    "batch_cancel_requested",
                    "收到 Ctrl-C，取消剩余密钥"
                );
                cancel.cancel();
            }
        }
    });
}

/// 读取密钥文件：每行一个，去除首尾空白，忽略空行
async fn read_keys(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("读取标准输入失败")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取密钥文件失败: {}", path.display()))?
    };

    Ok(parse_keys(&content))
}

fn parse_keys(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys_skips_blank_lines() {
        let keys = parse_keys("  sk-one \n\n\tsk-two\r\n   \n");
        assert_eq!(keys, vec!["sk-one".to_string(), "sk-two".to_string()]);
    }

    #[test]
    fn cli_parses_test_command() {
        let cli = Cli::try_parse_from([
            "api-key-tester",
            "test",
            "--provider",
            "gemini",
            "--model",
            "gemini-1.5-flash",
            "--keys-file",
            "-",
            "--concurrency",
            "3",
            "--format",
            "csv",
        ])
        .unwrap();
        match cli.command {
            Command::Test {
                provider,
                concurrency,
                format,
                ..
            } => {
                assert_eq!(provider, ProviderType::Gemini);
                assert_eq!(concurrency, Some(3));
                assert_eq!(format, OutputFormat::Csv);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn configuration_errors_exit_with_two() {
        let err = anyhow::Error::new(TesterError::not_found("test session", "test_1"));
        assert_eq!(exit_code(&err), ExitCode::from(2));

        let err = anyhow::Error::new(TesterError::internal("boom")).context("batch failed");
        assert_eq!(exit_code(&err), ExitCode::FAILURE);
    }

    #[test]
    fn cli_rejects_provider_case_variants() {
        assert!(
            Cli::try_parse_from(["api-key-tester", "results", "test_1", "--provider", "OpenAI"])
                .is_err()
        );
    }

    #[test]
    fn cli_rejects_unknown_status() {
        assert!(
            Cli::try_parse_from(["api-key-tester", "results", "test_1", "--status", "maybe"])
                .is_err()
        );
    }
}
