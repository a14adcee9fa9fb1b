//! Benchmark API 请求/响应类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::grouping::GroupedModel;
use super::health::EngineStatus;
use super::model::BenchmarkRecord;

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// 每页条数上限（前端会一次拉取 1000 条做客户端分组）
pub const MAX_PAGE_SIZE: u32 = 1000;

// ============ 查询参数 ============

/// 列表分页参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    /// 归一化分页参数，返回 (page, limit)
    pub fn normalized(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

/// 分组视图查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedQuery {
    /// 模型名子串（不区分大小写）
    pub search: Option<String>,
    /// 仅显示收藏
    #[serde(default)]
    pub favorites: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl GroupedQuery {
    pub fn pagination(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ============ 操作请求 ============

/// 更新备注/收藏请求
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBenchmarkRequest {
    pub notes: Option<String>,
    pub favorite: Option<bool>,
}

// ============ 响应 ============

/// 分页记录列表
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkListResponse {
    pub results: Vec<BenchmarkRecord>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// 分页分组列表
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedListResponse {
    pub results: Vec<GroupedModel>,
    /// 过滤后的分组总数
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// 引擎健康状态响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 操作成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// 错误响应
///
/// 顶层 `message` 供前端直接展示，`error` 携带机器可读分类
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub message: String,
    pub error: ApiError,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationError>>,
}

impl ApiErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: message.clone(),
            error: ApiError {
                error_type: error_type.into(),
                message,
                code: None,
                details: None,
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Vec<ValidationError>) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}
