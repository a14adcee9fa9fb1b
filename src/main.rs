use clap::Parser;
use tracing_subscriber::EnvFilter;

use bench_dashboard::benchmark::start_health_check_task;
use bench_dashboard::model::config::Config;
use bench_dashboard::{build_app, build_state};

/// LLM 压测面板后端
#[derive(Parser, Debug)]
#[command(name = "bench-dashboard", version, about)]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 覆盖监听地址
    #[arg(long)]
    host: Option<String>,

    /// 覆盖监听端口
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let (state, engine) = build_state(&config)?;
    if config.health_check_interval_secs > 0 {
        start_health_check_task(
            state.health.clone(),
            engine,
            config.health_check_interval_secs,
        );
    } else {
        tracing::info!("压测引擎健康检查已禁用");
    }

    let app = build_app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("压测面板后端已启动: http://{}", addr);
    tracing::info!("API 端点:");
    tracing::info!("  POST   /api/benchmarks");
    tracing::info!("  GET    /api/benchmarks");
    tracing::info!("  GET    /api/benchmarks/grouped");
    tracing::info!("  GET    /api/benchmarks/{{id}}");
    tracing::info!("  GET    /api/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听退出信号失败: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号，正在关闭服务");
}
