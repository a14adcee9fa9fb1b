//! 压测提交编排
//!
//! 状态流转：`Validating -> Dispatching -> AwaitingResponse -> {Completed | Failed}`
//!
//! 引擎调用发生在任何存储写入之前，调用期间不持有存储锁。
//! 若客户端断开，handler future 被丢弃，进行中的引擎请求随之放弃，
//! 但引擎侧可能仍在继续执行压测。

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::engine::BenchmarkEngine;
use super::error::SubmitError;
use super::model::{BenchmarkConfig, BenchmarkRecord, NewBenchmarkRecord};
use super::schema::{validate_config, validate_engine_payload, validate_record};
use super::store::RecordStore;
use crate::common::truncate_with_ellipsis;

/// 单次提交的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Validating,
    Dispatching,
    AwaitingResponse,
    Completed,
    Failed,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionState::Validating => "validating",
            SubmissionState::Dispatching => "dispatching",
            SubmissionState::AwaitingResponse => "awaiting_response",
            SubmissionState::Completed => "completed",
            SubmissionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 成功结果的落地位置
#[derive(Clone)]
enum Persistence {
    /// 写入本地存储，返回本地分配的 id
    Local(RecordStore),
    /// 引擎自行保存记录，直接返回引擎响应中的记录
    Engine,
}

/// 提交编排器
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn BenchmarkEngine>,
    persistence: Persistence,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn BenchmarkEngine>, store: RecordStore) -> Self {
        Self {
            engine,
            persistence: Persistence::Local(store),
        }
    }

    /// 由引擎保存记录的编排器（历史记录来自引擎时使用）
    ///
    /// 引擎响应必须是完整记录 `{id, ..., createdAt, results}`，返回的 id 与引擎读接口一致
    pub fn engine_backed(engine: Arc<dyn BenchmarkEngine>) -> Self {
        Self {
            engine,
            persistence: Persistence::Engine,
        }
    }

    /// 校验配置、调用引擎、校验结果并持久化
    ///
    /// 引擎失败不会自动重试，由调用方决定是否重新提交
    pub async fn submit(&self, payload: &Value) -> Result<BenchmarkRecord, SubmitError> {
        let mut tracker = Tracker::new();

        let config = match validate_config(payload) {
            Ok(config) => config,
            Err(errors) => {
                tracing::warn!(errors = %errors, "压测配置校验失败");
                return Err(tracker.fail(SubmitError::ConfigInvalid(errors)));
            }
        };

        tracker.advance(SubmissionState::Dispatching);
        let body = self.dispatch(&config, &mut tracker).await.map_err(|e| tracker.fail(e))?;

        let results = match validate_engine_payload(&body) {
            Ok(results) => results,
            Err(errors) => {
                tracing::error!(
                    errors = %errors,
                    body = %truncate_with_ellipsis(&body.to_string(), 1024),
                    "压测引擎响应不符合结果契约，已丢弃"
                );
                return Err(tracker.fail(SubmitError::EngineResponseInvalid(errors.summary())));
            }
        };

        let record = match &self.persistence {
            Persistence::Local(store) => store
                .create(NewBenchmarkRecord::from_run(&config, results))
                .await
                .map_err(|e| tracker.fail(e.into()))?,
            Persistence::Engine => match validate_record(&body) {
                Ok(record) => record,
                Err(errors) => {
                    tracing::error!(
                        errors = %errors,
                        body = %truncate_with_ellipsis(&body.to_string(), 1024),
                        "压测引擎未返回完整记录，无法定位已保存的结果"
                    );
                    return Err(
                        tracker.fail(SubmitError::EngineResponseInvalid(errors.summary()))
                    );
                }
            },
        };
        tracker.advance(SubmissionState::Completed);
        Ok(record)
    }

    async fn dispatch(
        &self,
        config: &BenchmarkConfig,
        tracker: &mut Tracker,
    ) -> Result<Value, SubmitError> {
        tracing::debug!(config = ?config, "提交压测配置");
        tracker.advance(SubmissionState::AwaitingResponse);
        Ok(self.engine.run_load_test(config).await?)
    }
}

/// 记录状态流转
struct Tracker {
    state: SubmissionState,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: SubmissionState::Validating,
        }
    }

    fn advance(&mut self, next: SubmissionState) {
        tracing::debug!(from = %self.state, to = %next, "提交状态变更");
        self.state = next;
    }

    fn fail(&mut self, error: SubmitError) -> SubmitError {
        tracing::warn!(state = %self.state, "压测提交失败: {}", error);
        self.state = SubmissionState::Failed;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::error::{EngineError, StoreError};
    use crate::benchmark::model::RecordPatch;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 模拟引擎（用于测试）
    struct MockEngine {
        response: Mutex<Option<Result<Value, EngineError>>>,
        calls: AtomicUsize,
        last_config: Mutex<Option<BenchmarkConfig>>,
    }

    impl MockEngine {
        fn returning(response: Result<Value, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                calls: AtomicUsize::new(0),
                last_config: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl BenchmarkEngine for MockEngine {
        async fn run_load_test(&self, config: &BenchmarkConfig) -> Result<Value, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_config.lock() = Some(config.clone());
            self.response
                .lock()
                .take()
                .unwrap_or_else(|| Err(EngineError::Transport("已无预设响应".into())))
        }

        async fn list_benchmarks(&self) -> Result<Value, EngineError> {
            Ok(json!([]))
        }

        async fn get_benchmark(&self, id: u64) -> Result<Value, EngineError> {
            Err(EngineError::NotFound(id))
        }
    }

    fn engine_results(model: &str) -> Value {
        json!({
            "status": "completed",
            "metrics": {
                "time_to_first_token": {"average": 120.0, "median": 110.0, "minimum": 80.0, "maximum": 300.0},
                "end_to_end_latency": {"average": 2500.0, "median": 2400.0, "minimum": 1800.0, "maximum": 4000.0},
                "inter_token_latency": {"average": 25.0, "median": 24.0, "minimum": 20.0, "maximum": 40.0},
                "token_speed": {"average": 18.0, "median": 17.5, "minimum": 10.0, "maximum": 30.0},
                "throughput": {"input_tokens_per_second": 500.0, "output_tokens_per_second": 60.0}
            },
            "configuration": {
                "user": 10, "spawnrate": 5, "model": model, "tokenizer": "tok",
                "url": "http://x", "duration": 30, "dataset": "d"
            }
        })
    }

    fn submission() -> Value {
        json!({"url": "http://x", "user": 10, "spawnrate": 5, "duration": 30, "dataset": "d"})
    }

    #[tokio::test]
    async fn test_submit_persists_record() {
        let engine = MockEngine::returning(Ok(json!({"results": engine_results("llama-3")})));
        let store = RecordStore::in_memory();
        let orchestrator = Orchestrator::new(engine.clone(), store.clone());

        let record = orchestrator.submit(&submission()).await.unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.model.as_deref(), Some("llama-3"));
        assert!(!record.favorite);
        assert_eq!(record.notes, None);
        assert_eq!(record.status, "completed");
        assert_eq!(engine.calls(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_accepts_flat_payload() {
        let engine = MockEngine::returning(Ok(engine_results("mistral")));
        let orchestrator = Orchestrator::new(engine, RecordStore::in_memory());

        let record = orchestrator.submit(&submission()).await.unwrap();
        assert_eq!(record.model.as_deref(), Some("mistral"));
    }

    #[tokio::test]
    async fn test_invalid_config_never_calls_engine() {
        let engine = MockEngine::returning(Ok(engine_results("llama-3")));
        let orchestrator = Orchestrator::new(engine.clone(), RecordStore::in_memory());

        let err = orchestrator
            .submit(&json!({"url": "not a url", "user": 0}))
            .await
            .unwrap_err();
        match err {
            SubmitError::ConfigInvalid(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_engine_body_is_not_persisted() {
        let mut body = engine_results("llama-3");
        body["metrics"]["token_speed"]["median"] = json!("fast");
        let engine = MockEngine::returning(Ok(json!({ "results": body })));
        let store = RecordStore::in_memory();
        let orchestrator = Orchestrator::new(engine, store.clone());

        let err = orchestrator.submit(&submission()).await.unwrap_err();
        match err {
            SubmitError::EngineResponseInvalid(detail) => {
                assert!(detail.contains("results.metrics.token_speed.median"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_engine_failures_are_classified() {
        let cases = vec![
            (EngineError::Unreachable("refused".into()), true),
            (EngineError::Timeout("deadline".into()), true),
            (
                EngineError::Rejected {
                    status: 400,
                    message: "bad user".into(),
                },
                false,
            ),
        ];
        for (engine_error, connectivity) in cases {
            let engine = MockEngine::returning(Err(engine_error));
            let store = RecordStore::in_memory();
            let orchestrator = Orchestrator::new(engine.clone(), store.clone());

            let err = orchestrator.submit(&submission()).await.unwrap_err();
            assert_eq!(err.is_connectivity(), connectivity);
            assert_eq!(engine.calls(), 1);
            assert_eq!(store.count().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_submitted_model_and_defaults_reach_engine() {
        let engine = MockEngine::returning(Ok(engine_results("echo")));
        let orchestrator = Orchestrator::new(engine.clone(), RecordStore::in_memory());

        let record = orchestrator
            .submit(&json!({"model": "mine", "api_key": "sk-secret-value-123"}))
            .await
            .unwrap();
        assert_eq!(record.model.as_deref(), Some("mine"));
        assert_eq!(record.user, 100);

        let sent = engine.last_config.lock().clone().unwrap();
        assert_eq!(sent.dataset, "mteb/banking77");
        assert_eq!(sent.api_key.as_deref(), Some("sk-secret-value-123"));
    }

    #[tokio::test]
    async fn test_record_lifecycle_after_submit() {
        let store = RecordStore::in_memory();
        let engine = MockEngine::returning(Ok(engine_results("llama-3")));
        let orchestrator = Orchestrator::new(engine, store.clone());
        let record = orchestrator.submit(&submission()).await.unwrap();

        let toggled = store
            .update(
                record.id,
                RecordPatch {
                    notes: None,
                    favorite: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(toggled.favorite);
        assert_eq!(toggled.created_at, record.created_at);

        store.delete(1).await.unwrap();
        assert!(matches!(store.get(1).await, Err(StoreError::NotFound(1))));

        let engine = MockEngine::returning(Ok(engine_results("llama-3")));
        let next = Orchestrator::new(engine, store)
            .submit(&submission())
            .await
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_engine_backed_returns_engine_record() {
        let engine = MockEngine::returning(Ok(json!({
            "id": 42,
            "url": "http://x",
            "user": 10,
            "spawnrate": 5,
            "duration": 30,
            "model": "llama-3",
            "dataset": "d",
            "status": "completed",
            "createdAt": "2024-05-01T12:00:00Z",
            "results": engine_results("llama-3")
        })));
        let orchestrator = Orchestrator::engine_backed(engine.clone());

        let record = orchestrator.submit(&submission()).await.unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.model.as_deref(), Some("llama-3"));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_engine_backed_requires_record_fields() {
        // 只有结果没有记录字段时无法得知引擎分配的 id
        let engine = MockEngine::returning(Ok(json!({"results": engine_results("llama-3")})));
        let orchestrator = Orchestrator::engine_backed(engine);

        let err = orchestrator.submit(&submission()).await.unwrap_err();
        match err {
            SubmitError::EngineResponseInvalid(detail) => {
                assert!(detail.contains("id"), "detail: {}", detail);
                assert!(detail.contains("createdAt"), "detail: {}", detail);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
