//! 命令行入口

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use page_translator::env::{self as app_env, EnvVar};
use page_translator::parsers::{DomPort, RcDomPort};
use page_translator::translation::backend::{HostCapabilities, HttpCapability, TokioWorkerSpawner};
use page_translator::translation::config::load_translation_config;
use page_translator::translation::error::helpers;
use page_translator::translation::pipeline::restore;
use page_translator::translation::{
    ConfigManager, FileSettingsStore, SegmentStrategy, TracingSurface, TranslationConfig,
    TranslationEngine, TranslationError, TranslationResult,
};

#[derive(Parser)]
#[command(name = "page-translator")]
#[command(about = "就地、可逆地翻译 HTML 页面中的可见文本")]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 翻译 HTML 文档
    Translate {
        /// 输入文件，`-` 表示标准输入
        input: String,

        /// 输出文件，默认写到标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 源语言，`auto` 表示自动检测
        #[arg(short, long)]
        source: Option<String>,

        /// 目标语言
        #[arg(short, long)]
        target: Option<String>,

        /// 分段策略：text 或 container
        #[arg(long)]
        strategy: Option<SegmentStrategy>,

        /// 翻译接口地址
        #[arg(long)]
        api_url: Option<String>,

        /// 基础并发数
        #[arg(long)]
        concurrency: Option<usize>,

        /// 只保留译文
        #[arg(long)]
        no_keep_original: bool,

        /// 使用工作者池分发翻译调用
        #[arg(long)]
        workers: bool,

        /// 输入编码，默认按文档声明检测
        #[arg(short, long)]
        encoding: Option<String>,

        /// 设置文件（JSON）
        #[arg(long)]
        settings: Option<PathBuf>,

        /// 站点主机名，用于站点级设置
        #[arg(long, default_value = "localhost")]
        host: String,
    },

    /// 还原已翻译的 HTML 文档
    Restore {
        input: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 生成示例配置文件
    InitConfig {
        #[arg(default_value = "page-translator.toml")]
        path: PathBuf,
    },

    /// 列出支持的环境变量
    EnvDocs,
}

fn init_logging() {
    let level = app_env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn read_input(input: &str) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    if input == "-" {
        io::stdin().read_to_end(&mut data)?;
    } else {
        data = fs::read(input)?;
    }
    Ok(data)
}

fn write_output(output: Option<&Path>, data: &[u8]) -> io::Result<()> {
    match output {
        Some(path) => fs::write(path, data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()
        }
    }
}

fn load_config(path: Option<&Path>) -> TranslationResult<TranslationConfig> {
    match path {
        Some(path) => Ok(ConfigManager::from_file(&path.to_string_lossy())?.into_config()),
        None => Ok(load_translation_config(None, None)),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_translate(
    config_path: Option<&Path>,
    input: &str,
    output: Option<&Path>,
    source: Option<String>,
    target: Option<String>,
    strategy: Option<SegmentStrategy>,
    api_url: Option<String>,
    concurrency: Option<usize>,
    no_keep_original: bool,
    workers: bool,
    encoding: Option<String>,
    settings: Option<PathBuf>,
    host: &str,
) -> TranslationResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(source) = source {
        config.source_lang = source;
    }
    if let Some(target) = target {
        config.target_lang = target;
    }
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(url) = api_url {
        config.api_url = url;
    }
    if let Some(limit) = concurrency {
        config.max_concurrency = limit;
    }
    if no_keep_original {
        config.keep_original = false;
    }
    config.use_workers = workers;
    config.validate()?;

    let data = read_input(input)?;
    let (port, document_encoding) = RcDomPort::parse_detecting(&data, encoding.as_deref())?;
    let port = Rc::new(port);

    let capability = Arc::new(HttpCapability::new(&config.api_url)?);
    let mut capabilities = HostCapabilities::new(capability.clone());
    if workers {
        capabilities = capabilities.with_workers(Arc::new(TokioWorkerSpawner::new(capability)));
    }

    let engine = TranslationEngine::new(port.clone(), config, capabilities, Rc::new(TracingSurface));
    let engine = match settings {
        Some(path) => {
            let store = Rc::new(FileSettingsStore::new(path));
            match engine.with_settings(store, host) {
                Some(engine) => engine,
                None => {
                    tracing::warn!("{} 已禁用翻译，原样输出", host);
                    return Ok(write_output(output, &data)?);
                }
            }
        }
        None => engine,
    };

    let report = engine.translate_page(false).await?;
    engine.adapter().teardown().await;
    tracing::info!("{}", report);

    let html = port.to_html(&document_encoding)?;
    write_output(output, &html)?;
    Ok(())
}

fn run_restore(input: &str, output: Option<&Path>) -> TranslationResult<()> {
    let data = read_input(input)?;
    let (port, document_encoding) = RcDomPort::parse_detecting(&data, None)?;

    let restored = restore(&port, &port.body());
    let html = port.to_html(&document_encoding)?;
    tracing::info!("已还原 {} 个翻译元素", restored);
    write_output(output, &html)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Translate {
            input,
            output,
            source,
            target,
            strategy,
            api_url,
            concurrency,
            no_keep_original,
            workers,
            encoding,
            settings,
            host,
        } => {
            run_translate(
                cli.config.as_deref(),
                &input,
                output.as_deref(),
                source,
                target,
                strategy,
                api_url,
                concurrency,
                no_keep_original,
                workers,
                encoding,
                settings,
                &host,
            )
            .await
        }
        Commands::Restore { input, output } => run_restore(&input, output.as_deref()),
        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(&path.to_string_lossy()).map(|_| {
                eprintln!("已生成配置文件: {}", path.display());
            })
        }
        Commands::EnvDocs => {
            print!("{}", app_env::generate_env_docs());
            Ok(())
        }
    };

    if let Err(e) = result {
        helpers::log_error(&e);
        let code = match e {
            TranslationError::CapabilityAbsent | TranslationError::PairUnsupported { .. } => 2,
            _ => 1,
        };
        process::exit(code);
    }
}
