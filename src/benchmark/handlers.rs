//! Benchmark API HTTP 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::grouping::{
    filter_by_favorite, filter_by_search_term, group_by_model, latest_for_model, paginate,
    sort_by_recency,
};
use super::model::RecordPatch;
use super::projection::{chart_series, performance_overview, to_csv, to_json};
use super::router::BenchmarkState;
use super::types::{
    ApiErrorResponse, BenchmarkListResponse, GroupedListResponse, GroupedQuery, ListQuery,
    SuccessResponse, UpdateBenchmarkRequest,
};

/// POST /api/benchmarks
/// 提交压测配置，引擎返回后持久化
pub async fn create_benchmark(
    State(state): State<BenchmarkState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match state.orchestrator.submit(&payload).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks
/// 按创建时间降序分页列出
pub async fn list_benchmarks(
    State(state): State<BenchmarkState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (page, limit) = query.normalized();
    match state.history.list().await {
        Ok(mut records) => {
            sort_by_recency(&mut records);
            Json(BenchmarkListResponse {
                total: records.len(),
                results: paginate(&records, page, limit),
                page,
                limit,
            })
            .into_response()
        }
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks/grouped
/// 按模型分组，支持模型名搜索与收藏过滤
pub async fn list_grouped_benchmarks(
    State(state): State<BenchmarkState>,
    Query(query): Query<GroupedQuery>,
) -> impl IntoResponse {
    let (page, limit) = query.pagination().normalized();
    match state.history.list().await {
        Ok(records) => {
            let groups = group_by_model(records);
            let groups = filter_by_search_term(groups, query.search.as_deref().unwrap_or(""));
            let groups = filter_by_favorite(groups, query.favorites);
            Json(GroupedListResponse {
                total: groups.len(),
                results: paginate(&groups, page, limit),
                page,
                limit,
            })
            .into_response()
        }
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks/:id
pub async fn get_benchmark(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.history.get(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// PATCH /api/benchmarks/:id
/// 修改备注或收藏状态
pub async fn update_benchmark(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdateBenchmarkRequest>,
) -> impl IntoResponse {
    let patch = RecordPatch {
        notes: payload.notes,
        favorite: payload.favorite,
    };
    match state.history.update(id, patch).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// DELETE /api/benchmarks/:id
pub async fn delete_benchmark(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.history.delete(id).await {
        Ok(()) => Json(SuccessResponse::new(format!("Benchmark #{} deleted", id))).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks/:id/export.json
pub async fn export_json(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let record = match state.history.get(id).await {
        Ok(record) => record,
        Err(e) => return (e.status_code(), Json(e.into_response())).into_response(),
    };
    match to_json(&record) {
        Ok(body) => attachment("application/json", &format!("benchmark-{}.json", id), body),
        Err(e) => {
            tracing::error!(id, "导出 JSON 失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::internal_error(format!(
                    "Failed to export benchmark: {}",
                    e
                ))),
            )
                .into_response()
        }
    }
}

/// GET /api/benchmarks/:id/export.csv
pub async fn export_csv(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.history.get(id).await {
        Ok(record) => attachment(
            "text/csv; charset=utf-8",
            &format!("benchmark-{}.csv", id),
            to_csv(&record),
        ),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks/:id/charts/:metric
/// 未知指标返回空序列
pub async fn get_chart_series(
    State(state): State<BenchmarkState>,
    Path((id, metric)): Path<(u64, String)>,
) -> impl IntoResponse {
    match state.history.get(id).await {
        Ok(record) => Json(chart_series(&record.results, &metric)).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/benchmarks/:id/scores
pub async fn get_performance_scores(
    State(state): State<BenchmarkState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.history.get(id).await {
        Ok(record) => Json(performance_overview(&record.results)).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// GET /api/models/:model/latest
/// 指定模型的最新记录
pub async fn get_latest_for_model(
    State(state): State<BenchmarkState>,
    Path(model): Path<String>,
) -> impl IntoResponse {
    let records = match state.history.list().await {
        Ok(records) => records,
        Err(e) => return (e.status_code(), Json(e.into_response())).into_response(),
    };
    match latest_for_model(&records, &model) {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(
                ApiErrorResponse::not_found(format!("No benchmark found for model {}", model))
                    .with_code("not_found"),
            ),
        )
            .into_response(),
    }
}

/// GET /api/health
/// 引擎连通性状态
pub async fn get_health(State(state): State<BenchmarkState>) -> impl IntoResponse {
    Json(state.health.snapshot())
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}
