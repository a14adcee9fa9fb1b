//! Benchmark 错误类型
//!
//! 每类错误都能映射到 HTTP 状态码和统一的错误响应体

use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use super::types::ApiErrorResponse;

/// 单个字段的校验失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// 字段路径，例如 `metrics.token_speed.median`；根对象为空字符串
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} at \"{}\"", self.message, self.field_path)
        }
    }
}

/// 全部校验失败项（不止第一个）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    /// 为所有字段路径加上前缀
    pub fn prefixed(self, prefix: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|e| ValidationError {
                    field_path: if e.field_path.is_empty() {
                        prefix.to_string()
                    } else {
                        format!("{}.{}", prefix, e.field_path)
                    },
                    message: e.message,
                })
                .collect(),
        )
    }

    /// 合并后的单行消息，用于 HTTP 错误响应
    pub fn summary(&self) -> String {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        format!("Validation error: {}", joined)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Benchmark test not found: #{0}")]
    NotFound(u64),

    /// 当前历史来源不支持该操作（例如远程引擎模式下的修改/删除）
    #[error("{0}")]
    NotSupported(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::NotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> ApiErrorResponse {
        match &self {
            StoreError::NotFound(_) => {
                ApiErrorResponse::not_found("Benchmark test not found").with_code("not_found")
            }
            StoreError::NotSupported(msg) => {
                ApiErrorResponse::new("not_supported", msg.clone()).with_code("not_supported")
            }
            StoreError::Backend(e) => {
                ApiErrorResponse::internal_error(format!("Storage error: {}", e))
            }
        }
    }
}

/// 压测引擎调用错误（传输层分类）
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("无法连接压测引擎: {0}")]
    Unreachable(String),

    #[error("压测引擎请求超时: {0}")]
    Timeout(String),

    #[error("压测引擎返回 HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("压测引擎响应无法解析: {0}")]
    InvalidResponse(String),

    #[error("压测引擎中不存在记录 #{0}")]
    NotFound(u64),

    #[error("压测引擎传输错误: {0}")]
    Transport(String),
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Unreachable(_) | EngineError::Transport(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Rejected { status, .. } => rejected_status(*status),
            EngineError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn into_response(self) -> ApiErrorResponse {
        match self {
            EngineError::Unreachable(_) | EngineError::Transport(_) => unreachable_response(),
            EngineError::Timeout(_) => timeout_response(),
            EngineError::Rejected { status, message } => rejected_response(status, &message),
            EngineError::InvalidResponse(detail) => invalid_response(&detail),
            EngineError::NotFound(_) => {
                ApiErrorResponse::not_found("Benchmark test not found").with_code("not_found")
            }
        }
    }
}

/// 提交压测的失败分类
#[derive(Debug, Error)]
pub enum SubmitError {
    /// 客户端输入错误，不会调用引擎
    #[error("{0}")]
    ConfigInvalid(ValidationErrors),

    #[error("无法连接压测引擎: {0}")]
    EngineUnreachable(String),

    #[error("压测引擎请求超时: {0}")]
    EngineTimeout(String),

    #[error("压测引擎拒绝请求 HTTP {status}: {message}")]
    EngineRejected { status: u16, message: String },

    /// 引擎响应违反契约，不会持久化
    #[error("压测引擎响应不符合结果契约: {0}")]
    EngineResponseInvalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<EngineError> for SubmitError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Unreachable(msg) | EngineError::Transport(msg) => {
                SubmitError::EngineUnreachable(msg)
            }
            EngineError::Timeout(msg) => SubmitError::EngineTimeout(msg),
            EngineError::Rejected { status, message } => {
                SubmitError::EngineRejected { status, message }
            }
            EngineError::NotFound(id) => SubmitError::EngineRejected {
                status: 404,
                message: format!("benchmark #{} not found", id),
            },
            EngineError::InvalidResponse(detail) => SubmitError::EngineResponseInvalid(detail),
        }
    }
}

impl SubmitError {
    /// 是否属于连接类错误（前端展示"稍后重试"提示）
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SubmitError::EngineUnreachable(_) | SubmitError::EngineTimeout(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmitError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
            SubmitError::EngineUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SubmitError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SubmitError::EngineRejected { status, .. } => rejected_status(*status),
            SubmitError::EngineResponseInvalid(_) => StatusCode::BAD_GATEWAY,
            SubmitError::Store(e) => e.status_code(),
        }
    }

    pub fn into_response(self) -> ApiErrorResponse {
        match self {
            SubmitError::ConfigInvalid(errors) => {
                ApiErrorResponse::invalid_request(errors.summary())
                    .with_code("config_invalid")
                    .with_details(errors.into_vec())
            }
            SubmitError::EngineUnreachable(_) => unreachable_response(),
            SubmitError::EngineTimeout(_) => timeout_response(),
            SubmitError::EngineRejected { status, message } => rejected_response(status, &message),
            SubmitError::EngineResponseInvalid(detail) => invalid_response(&detail),
            SubmitError::Store(e) => e.into_response(),
        }
    }
}

/// 历史查询错误（本地存储或远程引擎）
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("压测引擎返回的历史记录无效: {0}")]
    InvalidRecords(ValidationErrors),
}

impl HistoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HistoryError::Store(e) => e.status_code(),
            HistoryError::Engine(e) => e.status_code(),
            HistoryError::InvalidRecords(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn into_response(self) -> ApiErrorResponse {
        match self {
            HistoryError::Store(e) => e.into_response(),
            HistoryError::Engine(e) => e.into_response(),
            HistoryError::InvalidRecords(errors) => invalid_response(&errors.summary()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HistoryError::Store(StoreError::NotFound(_)) | HistoryError::Engine(EngineError::NotFound(_))
        )
    }
}

fn rejected_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

fn unreachable_response() -> ApiErrorResponse {
    ApiErrorResponse::new(
        "connectivity_error",
        "Cannot connect to the benchmark API server. The server may be down or the API URL might be incorrect.",
    )
    .with_code("engine_unreachable")
}

fn timeout_response() -> ApiErrorResponse {
    ApiErrorResponse::new(
        "connectivity_error",
        "The benchmark API request timed out. The load test might be taking too long to complete.",
    )
    .with_code("engine_timeout")
}

fn rejected_response(status: u16, message: &str) -> ApiErrorResponse {
    let user_message = match status {
        401 => "Authentication failed. API access requires valid credentials.".to_string(),
        400 => format!("Bad request. Please check the test parameters: {}", message),
        _ => format!("Benchmark API Error: {}", message),
    };
    ApiErrorResponse::new("engine_error", user_message).with_code("engine_rejected")
}

fn invalid_response(detail: &str) -> ApiErrorResponse {
    ApiErrorResponse::new(
        "engine_error",
        format!("Benchmark API returned an invalid response: {}", detail),
    )
    .with_code("engine_response_invalid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_every_error() {
        let errors = ValidationErrors::from(vec![
            ValidationError::new("user", "Number of users must be positive"),
            ValidationError::new("url", "Please enter a valid URL"),
        ]);
        assert_eq!(
            errors.summary(),
            "Validation error: Number of users must be positive at \"user\"; Please enter a valid URL at \"url\""
        );
    }

    #[test]
    fn test_prefixed_paths() {
        let errors = ValidationErrors::from(vec![
            ValidationError::new("status", "Required"),
            ValidationError::new("", "Expected object, received null"),
        ])
        .prefixed("results");
        assert_eq!(errors.errors()[0].field_path, "results.status");
        assert_eq!(errors.errors()[1].field_path, "results");
    }

    #[test]
    fn test_submit_error_classification() {
        let e: SubmitError = EngineError::Timeout("deadline".into()).into();
        assert!(e.is_connectivity());
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let e: SubmitError = EngineError::Unreachable("refused".into()).into();
        assert!(e.is_connectivity());
        assert_eq!(e.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let e: SubmitError = EngineError::Rejected {
            status: 400,
            message: "bad user".into(),
        }
        .into();
        assert!(!e.is_connectivity());
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        let body = e.into_response();
        assert_eq!(
            body.message,
            "Bad request. Please check the test parameters: bad user"
        );
    }

    #[test]
    fn test_rejected_with_success_status_maps_to_bad_gateway() {
        let e = SubmitError::EngineRejected {
            status: 204,
            message: String::new(),
        };
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_config_invalid_response_carries_details() {
        let errors = ValidationErrors::from(vec![ValidationError::new(
            "duration",
            "Duration must be positive",
        )]);
        let e = SubmitError::ConfigInvalid(errors);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        let body = e.into_response();
        assert_eq!(body.error.code.as_deref(), Some("config_invalid"));
        assert_eq!(body.error.details.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_store_not_found() {
        let e = StoreError::NotFound(3);
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(e.into_response().message, "Benchmark test not found");
    }
}
