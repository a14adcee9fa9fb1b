//! 外部压测引擎客户端
//!
//! 引擎只暴露三个端点：
//! - `POST /run-load-test?user&spawnrate&url&duration&dataset[&model][&tokenizer]`
//! - `GET /benchmarks`
//! - `GET /benchmarks/{id}`
//!
//! 这里只负责传输与错误分类，响应体的契约校验由 `schema` 完成。

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::common::{mask_secret, truncate_with_ellipsis};
use crate::http_client::build_client;
use crate::model::config::Config;

use super::error::EngineError;
use super::model::BenchmarkConfig;

/// 日志与错误中保留的响应体最大字节数
const BODY_PREVIEW_BYTES: usize = 512;

/// 压测引擎接口
#[async_trait]
pub trait BenchmarkEngine: Send + Sync {
    /// 执行一次压测，返回原始响应体
    async fn run_load_test(&self, config: &BenchmarkConfig) -> Result<Value, EngineError>;

    /// 引擎侧的历史记录列表
    async fn list_benchmarks(&self) -> Result<Value, EngineError>;

    /// 引擎侧的单条记录
    async fn get_benchmark(&self, id: u64) -> Result<Value, EngineError>;

    /// 连通性探测
    async fn probe(&self) -> Result<(), EngineError> {
        self.list_benchmarks().await.map(|_| ())
    }
}

/// 基于 HTTP 的引擎客户端
///
/// 压测请求与历史查询使用不同超时的两个 Client
pub struct HttpEngine {
    base_url: String,
    run_client: Client,
    history_client: Client,
}

impl HttpEngine {
    pub fn new(
        base_url: impl Into<String>,
        proxy_url: Option<&str>,
        run_timeout_secs: u64,
        history_timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            run_client: build_client(proxy_url, run_timeout_secs)?,
            history_client: build_client(proxy_url, history_timeout_secs)?,
            base_url,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.engine_url.clone(),
            config.proxy_url.as_deref(),
            config.run_timeout_secs,
            config.history_timeout_secs,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, url: &str) -> Result<(StatusCode, String), EngineError> {
        let response = self
            .history_client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(classify_transport)?;
        read_body(response).await
    }
}

#[async_trait]
impl BenchmarkEngine for HttpEngine {
    async fn run_load_test(&self, config: &BenchmarkConfig) -> Result<Value, EngineError> {
        let url = build_run_url(&self.base_url, config);
        tracing::info!(
            url = %url,
            api_key = ?config.api_key.as_deref().map(mask_secret),
            "向压测引擎发起压测请求"
        );

        let mut request = self
            .run_client
            .post(&url)
            .header("accept", "application/json");
        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        tracing::info!(status = status.as_u16(), bytes = body.len(), "压测引擎已返回结果");
        #[cfg(feature = "sensitive-logs")]
        tracing::debug!(body = %body, "压测引擎响应体");
        parse_json(&body)
    }

    async fn list_benchmarks(&self) -> Result<Value, EngineError> {
        let url = format!("{}/benchmarks", self.base_url);
        let (status, body) = self.get_json(&url).await?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        parse_json(&body)
    }

    async fn get_benchmark(&self, id: u64) -> Result<Value, EngineError> {
        let url = format!("{}/benchmarks/{}", self.base_url, id);
        let (status, body) = self.get_json(&url).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(id));
        }
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        parse_json(&body)
    }
}

/// 构造压测请求 URL，所有字符串参数都做百分号编码
pub fn build_run_url(base_url: &str, config: &BenchmarkConfig) -> String {
    let mut url = format!(
        "{}/run-load-test?user={}&spawnrate={}&url={}&duration={}&dataset={}",
        base_url.trim_end_matches('/'),
        config.user,
        config.spawnrate,
        urlencoding::encode(&config.url),
        config.duration,
        urlencoding::encode(&config.dataset),
    );
    if let Some(model) = config.model.as_deref().filter(|s| !s.is_empty()) {
        url.push_str("&model=");
        url.push_str(&urlencoding::encode(model));
    }
    if let Some(tokenizer) = config.tokenizer.as_deref().filter(|s| !s.is_empty()) {
        url.push_str("&tokenizer=");
        url.push_str(&urlencoding::encode(tokenizer));
    }
    url
}

fn classify_transport(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        tracing::warn!("压测引擎请求超时: {}", e);
        EngineError::Timeout(e.to_string())
    } else if e.is_connect() {
        tracing::warn!("无法连接压测引擎: {}", e);
        EngineError::Unreachable(e.to_string())
    } else {
        tracing::warn!("压测引擎请求失败: {}", e);
        EngineError::Transport(e.to_string())
    }
}

async fn read_body(response: Response) -> Result<(StatusCode, String), EngineError> {
    let status = response.status();
    let body = response.text().await.map_err(classify_transport)?;
    Ok((status, body))
}

fn parse_json(body: &str) -> Result<Value, EngineError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            body = %truncate_with_ellipsis(body, BODY_PREVIEW_BYTES),
            "压测引擎响应不是合法 JSON: {}",
            e
        );
        EngineError::InvalidResponse(format!(
            "{} (body: {})",
            e,
            truncate_with_ellipsis(body, BODY_PREVIEW_BYTES)
        ))
    })
}

/// 非 2xx 响应：优先取响应体中的 `message`，其次原始文本，最后状态码原因短语
fn rejected(status: StatusCode, body: &str) -> EngineError {
    let message = error_message(status, body);
    tracing::warn!(
        status = status.as_u16(),
        body = %truncate_with_ellipsis(body, BODY_PREVIEW_BYTES),
        "压测引擎返回错误状态"
    );
    EngineError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    if let Some(message) = from_json.filter(|m| !m.is_empty()) {
        return message;
    }
    let text = body.trim();
    if !text.is_empty() {
        return truncate_with_ellipsis(text, BODY_PREVIEW_BYTES);
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::model::fixtures::config;

    #[test]
    fn test_build_run_url_required_params() {
        let url = build_run_url("http://engine:8000/", &config());
        assert_eq!(
            url,
            "http://engine:8000/run-load-test?user=10&spawnrate=5&url=http%3A%2F%2Fx&duration=30&dataset=d"
        );
    }

    #[test]
    fn test_build_run_url_optional_params_encoded() {
        let mut cfg = config();
        cfg.dataset = "mteb/banking77".to_string();
        cfg.model = Some("meta llama/3".to_string());
        cfg.tokenizer = Some("hf&tok".to_string());
        let url = build_run_url("http://engine", &cfg);
        assert!(url.contains("dataset=mteb%2Fbanking77"));
        assert!(url.ends_with("&model=meta%20llama%2F3&tokenizer=hf%26tok"));
    }

    #[test]
    fn test_build_run_url_skips_empty_optionals() {
        let mut cfg = config();
        cfg.model = Some(String::new());
        let url = build_run_url("http://engine", &cfg);
        assert!(!url.contains("model="));
        assert!(!url.contains("tokenizer="));
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"user too large"}"#),
            "user too large"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "boom"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_parse_json_invalid_body() {
        let err = parse_json("<html>oops</html>").unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(ref d) if d.contains("<html>")));
    }

    #[test]
    fn test_http_engine_trims_base_url() {
        let engine = HttpEngine::new("http://engine:8000///", None, 600, 10).unwrap();
        assert_eq!(engine.base_url(), "http://engine:8000");
    }
}
