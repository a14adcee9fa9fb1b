//! 压测配置与结果数据模型

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::mask_secret;

/// 默认压测目标地址
pub const DEFAULT_TARGET_URL: &str = "https://dekallm.cloudeka.ai";
/// 默认并发虚拟用户数
pub const DEFAULT_USERS: u32 = 100;
/// 默认每秒孵化用户数
pub const DEFAULT_SPAWN_RATE: u32 = 100;
/// 默认压测时长（秒）
pub const DEFAULT_DURATION_SECS: u32 = 60;
/// 默认数据集
pub const DEFAULT_DATASET: &str = "mteb/banking77";

/// 压测提交配置（已通过校验）
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub url: String,
    pub user: u32,
    pub spawnrate: u32,
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// api_key 不得以明文出现在日志中
impl fmt::Debug for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("spawnrate", &self.spawnrate)
            .field("duration", &self.duration)
            .field("model", &self.model)
            .field("tokenizer", &self.tokenizer)
            .field("dataset", &self.dataset)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("notes", &self.notes)
            .finish()
    }
}

/// 单个指标的分布摘要
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStat {
    pub average: f64,
    pub median: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// 输入/输出 token 吞吐
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub input_tokens_per_second: f64,
    pub output_tokens_per_second: f64,
}

/// 指标集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub time_to_first_token: MetricStat,
    pub end_to_end_latency: MetricStat,
    pub inter_token_latency: MetricStat,
    pub token_speed: MetricStat,
    pub throughput: Throughput,
}

/// 引擎回显的实际运行参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub user: u64,
    pub spawnrate: u64,
    pub model: String,
    pub tokenizer: String,
    pub url: String,
    pub duration: u64,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 引擎返回的压测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub status: String,
    pub metrics: MetricsBundle,
    pub configuration: RunConfiguration,
}

/// 持久化的压测记录
///
/// 创建后只有 `notes` 和 `favorite` 可以修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRecord {
    pub id: u64,
    pub url: String,
    pub user: u32,
    pub spawnrate: u32,
    pub duration: u32,
    pub model: Option<String>,
    pub tokenizer: Option<String>,
    pub dataset: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub status: String,
    pub results: BenchmarkResults,
    pub created_at: DateTime<Utc>,
}

impl BenchmarkRecord {
    /// 分组使用的模型名（缺失时为空字符串）
    pub fn model_key(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }
}

/// 创建记录所需的字段（id 与 createdAt 由存储分配）
#[derive(Debug, Clone, PartialEq)]
pub struct NewBenchmarkRecord {
    pub url: String,
    pub user: u32,
    pub spawnrate: u32,
    pub duration: u32,
    pub model: Option<String>,
    pub tokenizer: Option<String>,
    pub dataset: String,
    pub notes: Option<String>,
    pub status: String,
    pub results: BenchmarkResults,
}

impl NewBenchmarkRecord {
    /// 由提交配置与引擎结果合并出待持久化的记录
    ///
    /// model/tokenizer 优先使用提交值，未提交时使用引擎回显值
    pub fn from_run(config: &BenchmarkConfig, results: BenchmarkResults) -> Self {
        let pick = |submitted: &Option<String>, echoed: &str| {
            submitted
                .clone()
                .filter(|s| !s.trim().is_empty())
                .or_else(|| Some(echoed.to_string()).filter(|s| !s.trim().is_empty()))
        };

        Self {
            url: config.url.clone(),
            user: config.user,
            spawnrate: config.spawnrate,
            duration: config.duration,
            model: pick(&config.model, &results.configuration.model),
            tokenizer: pick(&config.tokenizer, &results.configuration.tokenizer),
            dataset: config.dataset.clone(),
            notes: config.notes.clone(),
            status: results.status.clone(),
            results,
        }
    }

    /// 赋予 id 与创建时间，生成完整记录
    pub fn into_record(self, id: u64, created_at: DateTime<Utc>) -> BenchmarkRecord {
        BenchmarkRecord {
            id,
            url: self.url,
            user: self.user,
            spawnrate: self.spawnrate,
            duration: self.duration,
            model: self.model,
            tokenizer: self.tokenizer,
            dataset: self.dataset,
            notes: self.notes,
            favorite: false,
            status: self.status,
            results: self.results,
            created_at,
        }
    }
}

/// 记录的部分更新（未提供的字段保持不变）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub favorite: Option<bool>,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut BenchmarkRecord) {
        if let Some(notes) = &self.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(favorite) = self.favorite {
            record.favorite = favorite;
        }
    }
}

/// 测试辅助构造
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn stat(average: f64, median: f64, minimum: f64, maximum: f64) -> MetricStat {
        MetricStat {
            average,
            median,
            minimum,
            maximum,
        }
    }

    pub fn results(model: &str) -> BenchmarkResults {
        BenchmarkResults {
            status: "completed".to_string(),
            metrics: MetricsBundle {
                time_to_first_token: stat(120.5, 110.0, 80.25, 300.0),
                end_to_end_latency: stat(2500.0, 2400.0, 1800.0, 4000.0),
                inter_token_latency: stat(25.0, 24.0, 20.0, 40.0),
                token_speed: stat(18.0, 17.5, 10.0, 30.0),
                throughput: Throughput {
                    input_tokens_per_second: 512.75,
                    output_tokens_per_second: 64.125,
                },
            },
            configuration: RunConfiguration {
                user: 10,
                spawnrate: 5,
                model: model.to_string(),
                tokenizer: "hf-internal/tokenizer".to_string(),
                url: "http://x".to_string(),
                duration: 30,
                dataset: Some("d".to_string()),
                notes: None,
            },
        }
    }

    pub fn record(id: u64, model: &str, created_at: DateTime<Utc>) -> BenchmarkRecord {
        BenchmarkRecord {
            id,
            url: "http://x".to_string(),
            user: 10,
            spawnrate: 5,
            duration: 30,
            model: Some(model.to_string()).filter(|m| !m.is_empty()),
            tokenizer: None,
            dataset: "d".to_string(),
            notes: None,
            favorite: false,
            status: "completed".to_string(),
            results: results(model),
            created_at,
        }
    }

    pub fn config() -> BenchmarkConfig {
        BenchmarkConfig {
            url: "http://x".to_string(),
            user: 10,
            spawnrate: 5,
            duration: 30,
            model: None,
            tokenizer: None,
            dataset: "d".to_string(),
            api_key: None,
            notes: None,
        }
    }

    pub fn new_record(model: &str) -> NewBenchmarkRecord {
        NewBenchmarkRecord::from_run(&config(), results(model))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_from_run_prefers_submitted_model() {
        let mut cfg = config();
        cfg.model = Some("submitted".to_string());
        let new = NewBenchmarkRecord::from_run(&cfg, results("echoed"));
        assert_eq!(new.model.as_deref(), Some("submitted"));
        assert_eq!(new.tokenizer.as_deref(), Some("hf-internal/tokenizer"));
    }

    #[test]
    fn test_from_run_falls_back_to_echo() {
        let new = NewBenchmarkRecord::from_run(&config(), results("llama-3"));
        assert_eq!(new.model.as_deref(), Some("llama-3"));
        assert_eq!(new.status, "completed");
        assert_eq!(new.notes, None);
    }

    #[test]
    fn test_from_run_empty_echo_is_none() {
        let new = NewBenchmarkRecord::from_run(&config(), results(""));
        assert_eq!(new.model, None);
    }

    #[test]
    fn test_patch_leaves_unspecified_fields() {
        let mut record = record(1, "A", Utc::now());
        record.notes = Some("keep".to_string());

        RecordPatch {
            notes: None,
            favorite: Some(true),
        }
        .apply(&mut record);

        assert!(record.favorite);
        assert_eq!(record.notes.as_deref(), Some("keep"));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut cfg = config();
        cfg.api_key = Some("sk-live-0123456789abcdef".to_string());
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("0123456789"));
        assert!(debug.contains("sk-l***cdef"));
    }

    #[test]
    fn test_record_serializes_camel_case_created_at() {
        let record = record(7, "A", Utc::now());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
        assert_eq!(value["favorite"], false);
        assert!(value["notes"].is_null());
        assert!(value["results"]["metrics"]["time_to_first_token"]["average"].is_number());
    }
}
