//! LLM 压测面板后端
//!
//! 接收压测配置，调用外部压测引擎，校验并保存结果，
//! 对外提供历史记录、按模型分组、评分、图表与导出接口。

pub mod benchmark;
pub mod common;
pub mod http_client;
pub mod model;

use std::sync::Arc;

use axum::Router;

use benchmark::{
    BenchmarkEngine, BenchmarkState, EngineHealth, HistorySource, HttpEngine, Orchestrator,
    RecordStore, SqliteStore, create_benchmark_router,
};
use model::config::{Config, HistorySourceKind, StorageBackend};

/// 根据配置组装存储、引擎与历史来源
pub fn build_state(config: &Config) -> anyhow::Result<(BenchmarkState, Arc<dyn BenchmarkEngine>)> {
    let engine: Arc<dyn BenchmarkEngine> = Arc::new(HttpEngine::from_config(config)?);
    tracing::info!(engine_url = %config.engine_url, "压测引擎地址");

    let (orchestrator, history) = match config.history_source {
        HistorySourceKind::Local => {
            let store = match config.storage {
                StorageBackend::Memory => {
                    tracing::info!("使用内存存储压测记录");
                    RecordStore::in_memory()
                }
                StorageBackend::Sqlite => RecordStore::new(SqliteStore::new(&config.db_path)?),
            };
            (
                Orchestrator::new(engine.clone(), store.clone()),
                HistorySource::Local(store),
            )
        }
        HistorySourceKind::Remote => {
            // 引擎负责保存记录，本地不再写入，提交返回的 id 可直接用于读接口
            tracing::info!("历史记录由压测引擎保存与提供（只读）");
            (
                Orchestrator::engine_backed(engine.clone()),
                HistorySource::Remote(engine.clone()),
            )
        }
    };

    let state = BenchmarkState {
        orchestrator,
        history,
        health: Arc::new(EngineHealth::new()),
    };
    Ok((state, engine))
}

/// 构建完整应用路由（`/api` 前缀 + CORS）
pub fn build_app(state: BenchmarkState) -> Router {
    Router::new()
        .nest("/api", create_benchmark_router(state))
        .layer(cors_layer())
}

/// CORS 中间件层
///
/// 面板前端可能与后端不同源部署，允许任意来源、方法与请求头
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
