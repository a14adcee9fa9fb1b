//! 压测引擎连通性检查
//!
//! 后台任务定期探测引擎，仅用于展示，不会触发任何重试。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::engine::BenchmarkEngine;
use super::types::HealthResponse;

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

#[derive(Debug, Default)]
struct HealthSnapshot {
    status: EngineStatus,
    last_checked_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<String>,
}

/// 最近一次探测结果
#[derive(Debug, Default)]
pub struct EngineHealth {
    inner: RwLock<HealthSnapshot>,
}

impl EngineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.read().status
    }

    /// 执行一次探测并更新状态
    pub async fn check_once(&self, engine: &dyn BenchmarkEngine) -> EngineStatus {
        let result = engine.probe().await;
        let mut inner = self.inner.write();
        inner.last_checked_at = Some(Utc::now());
        match result {
            Ok(()) => {
                if inner.status != EngineStatus::Available {
                    tracing::info!("压测引擎可用");
                }
                inner.status = EngineStatus::Available;
                inner.consecutive_failures = 0;
                inner.last_error = None;
            }
            Err(e) => {
                if inner.status != EngineStatus::Unavailable {
                    tracing::warn!("压测引擎不可用: {}", e);
                }
                inner.status = EngineStatus::Unavailable;
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.last_error = Some(e.to_string());
            }
        }
        inner.status
    }

    pub fn snapshot(&self) -> HealthResponse {
        let inner = self.inner.read();
        HealthResponse {
            status: match inner.status {
                EngineStatus::Unavailable => "degraded",
                _ => "ok",
            },
            engine: inner.status,
            last_checked_at: inner.last_checked_at,
            consecutive_failures: inner.consecutive_failures,
            message: inner.last_error.clone(),
        }
    }
}

/// 启动后台探测任务
pub fn start_health_check_task(
    health: Arc<EngineHealth>,
    engine: Arc<dyn BenchmarkEngine>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            let status = health.check_once(engine.as_ref()).await;
            tracing::debug!(status = ?status, "压测引擎健康检查完成");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::error::EngineError;
    use crate::benchmark::model::BenchmarkConfig;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyEngine {
        up: AtomicBool,
    }

    #[async_trait::async_trait]
    impl BenchmarkEngine for FlakyEngine {
        async fn run_load_test(&self, _config: &BenchmarkConfig) -> Result<Value, EngineError> {
            Err(EngineError::Transport("unused".into()))
        }

        async fn list_benchmarks(&self) -> Result<Value, EngineError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(Value::Array(vec![]))
            } else {
                Err(EngineError::Unreachable("connection refused".into()))
            }
        }

        async fn get_benchmark(&self, id: u64) -> Result<Value, EngineError> {
            Err(EngineError::NotFound(id))
        }
    }

    #[test]
    fn test_initial_status_unknown() {
        let health = EngineHealth::new();
        let snapshot = health.snapshot();
        assert_eq!(snapshot.engine, EngineStatus::Unknown);
        assert_eq!(snapshot.status, "ok");
        assert!(snapshot.last_checked_at.is_none());
    }

    #[tokio::test]
    async fn test_check_once_transitions() {
        let engine = FlakyEngine {
            up: AtomicBool::new(false),
        };
        let health = EngineHealth::new();

        assert_eq!(health.check_once(&engine).await, EngineStatus::Unavailable);
        assert_eq!(health.check_once(&engine).await, EngineStatus::Unavailable);
        let snapshot = health.snapshot();
        assert_eq!(snapshot.status, "degraded");
        assert_eq!(snapshot.consecutive_failures, 2);
        assert!(snapshot.message.unwrap().contains("connection refused"));

        engine.up.store(true, Ordering::SeqCst);
        assert_eq!(health.check_once(&engine).await, EngineStatus::Available);
        let snapshot = health.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.message.is_none());
        assert!(snapshot.last_checked_at.is_some());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(EngineStatus::Unavailable).unwrap(),
            "unavailable"
        );
    }

    #[tokio::test]
    async fn test_background_task_probes_immediately() {
        let health = Arc::new(EngineHealth::new());
        let engine: Arc<dyn BenchmarkEngine> = Arc::new(FlakyEngine {
            up: AtomicBool::new(true),
        });
        let handle = start_health_check_task(health.clone(), engine, 3600);

        for _ in 0..50 {
            if health.status() != EngineStatus::Unknown {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(health.status(), EngineStatus::Available);
        handle.abort();
    }
}
