//! Benchmark API 路由配置

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use super::{
    handlers::{
        create_benchmark, delete_benchmark, export_csv, export_json, get_benchmark,
        get_chart_series, get_health, get_latest_for_model, get_performance_scores,
        list_benchmarks, list_grouped_benchmarks, update_benchmark,
    },
    health::EngineHealth,
    history::HistorySource,
    orchestrator::Orchestrator,
};

/// Benchmark API 状态
#[derive(Clone)]
pub struct BenchmarkState {
    pub orchestrator: Orchestrator,
    pub history: HistorySource,
    pub health: Arc<EngineHealth>,
}

/// 创建 Benchmark API 路由
///
/// # 端点
/// - `POST /benchmarks` - 提交压测
/// - `GET /benchmarks` - 分页列表
/// - `GET /benchmarks/grouped` - 按模型分组
/// - `GET /benchmarks/:id` - 获取记录
/// - `PATCH /benchmarks/:id` - 修改备注/收藏
/// - `DELETE /benchmarks/:id` - 删除记录
/// - `GET /benchmarks/:id/export.json` - 导出 JSON
/// - `GET /benchmarks/:id/export.csv` - 导出 CSV
/// - `GET /benchmarks/:id/charts/:metric` - 图表序列
/// - `GET /benchmarks/:id/scores` - 性能评分
/// - `GET /models/:model/latest` - 模型最新记录
/// - `GET /health` - 引擎连通性
pub fn create_benchmark_router(state: BenchmarkState) -> Router {
    Router::new()
        .route("/benchmarks", post(create_benchmark).get(list_benchmarks))
        .route("/benchmarks/grouped", get(list_grouped_benchmarks))
        .route(
            "/benchmarks/{id}",
            get(get_benchmark)
                .patch(update_benchmark)
                .delete(delete_benchmark),
        )
        .route("/benchmarks/{id}/export.json", get(export_json))
        .route("/benchmarks/{id}/export.csv", get(export_csv))
        .route("/benchmarks/{id}/charts/{metric}", get(get_chart_series))
        .route("/benchmarks/{id}/scores", get(get_performance_scores))
        .route("/models/{model}/latest", get(get_latest_for_model))
        .route("/health", get(get_health))
        .with_state(state)
}
