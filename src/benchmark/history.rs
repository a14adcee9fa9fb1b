//! 历史记录来源
//!
//! 本地模式读写 `RecordStore`；远程模式从压测引擎读取，只读。

use std::sync::Arc;

use serde_json::Value;

use super::engine::BenchmarkEngine;
use super::error::{HistoryError, StoreError, ValidationError, ValidationErrors};
use super::model::{BenchmarkRecord, RecordPatch};
use super::schema::{type_name, validate_record};
use super::store::RecordStore;

/// 历史记录来源
#[derive(Clone)]
pub enum HistorySource {
    Local(RecordStore),
    Remote(Arc<dyn BenchmarkEngine>),
}

impl HistorySource {
    /// 全部记录，顺序不保证
    pub async fn list(&self) -> Result<Vec<BenchmarkRecord>, HistoryError> {
        match self {
            HistorySource::Local(store) => Ok(store.list().await?),
            HistorySource::Remote(engine) => {
                let body = engine.list_benchmarks().await?;
                parse_record_list(&body)
            }
        }
    }

    pub async fn get(&self, id: u64) -> Result<BenchmarkRecord, HistoryError> {
        match self {
            HistorySource::Local(store) => Ok(store.get(id).await?),
            HistorySource::Remote(engine) => {
                let body = engine.get_benchmark(id).await?;
                validate_record(&body).map_err(|errors| {
                    tracing::error!(id, errors = %errors, "压测引擎返回的记录无效");
                    HistoryError::InvalidRecords(errors)
                })
            }
        }
    }

    pub async fn update(&self, id: u64, patch: RecordPatch) -> Result<BenchmarkRecord, HistoryError> {
        match self {
            HistorySource::Local(store) => Ok(store.update(id, patch).await?),
            HistorySource::Remote(_) => Err(read_only().into()),
        }
    }

    pub async fn delete(&self, id: u64) -> Result<(), HistoryError> {
        match self {
            HistorySource::Local(store) => Ok(store.delete(id).await?),
            HistorySource::Remote(_) => Err(read_only().into()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, HistorySource::Remote(_))
    }
}

fn read_only() -> StoreError {
    StoreError::NotSupported(
        "Benchmark history is served by the benchmark engine and is read-only".to_string(),
    )
}

/// 解析引擎历史列表：裸数组或 `{results: [...]}`
fn parse_record_list(body: &Value) -> Result<Vec<BenchmarkRecord>, HistoryError> {
    let (items, prefix) = match body {
        Value::Array(items) => (items, ""),
        Value::Object(obj) => match obj.get("results") {
            Some(Value::Array(items)) => (items, "results"),
            _ => {
                return Err(HistoryError::InvalidRecords(
                    vec![ValidationError::new(
                        "results",
                        "Expected array of benchmark records",
                    )]
                    .into(),
                ));
            }
        },
        other => {
            return Err(HistoryError::InvalidRecords(
                vec![ValidationError::new(
                    "",
                    format!("Expected array, received {}", type_name(other)),
                )]
                .into(),
            ));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    let mut errors = ValidationErrors::new();
    for (i, item) in items.iter().enumerate() {
        let path = if prefix.is_empty() {
            format!("[{}]", i)
        } else {
            format!("{}[{}]", prefix, i)
        };
        match validate_record(item) {
            Ok(record) => records.push(record),
            Err(e) => errors.extend(e.prefixed(&path)),
        }
    }

    if !errors.is_empty() {
        tracing::error!(errors = %errors, "压测引擎返回的历史记录无效");
        return Err(HistoryError::InvalidRecords(errors));
    }
    Ok(records)
}
