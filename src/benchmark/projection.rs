//! 派生指标：性能评分、图表序列与导出
//!
//! 所有函数都是纯函数，输入为单条结果或记录。

use std::str::FromStr;

use serde::Serialize;

use super::model::{BenchmarkRecord, BenchmarkResults, MetricStat, MetricsBundle, Throughput};

/// 端到端延迟评分的最佳值（毫秒）
pub const LATENCY_BEST_MS: f64 = 1000.0;
/// 端到端延迟评分的最差值（毫秒）
pub const LATENCY_WORST_MS: f64 = 10000.0;
/// 输出吞吐评分上限（tokens/s）
pub const THROUGHPUT_CEILING: f64 = 100.0;
/// Token 速度评分上限（tokens/s）
pub const TOKEN_SPEED_CEILING: f64 = 30.0;

/// 指标键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TimeToFirstToken,
    EndToEndLatency,
    InterTokenLatency,
    TokenSpeed,
    Throughput,
}

impl MetricKey {
    pub const ALL: [MetricKey; 5] = [
        MetricKey::TimeToFirstToken,
        MetricKey::EndToEndLatency,
        MetricKey::InterTokenLatency,
        MetricKey::TokenSpeed,
        MetricKey::Throughput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TimeToFirstToken => "time_to_first_token",
            MetricKey::EndToEndLatency => "end_to_end_latency",
            MetricKey::InterTokenLatency => "inter_token_latency",
            MetricKey::TokenSpeed => "token_speed",
            MetricKey::Throughput => "throughput",
        }
    }

    /// 导出与图表使用的标题
    pub fn title(&self) -> &'static str {
        match self {
            MetricKey::TimeToFirstToken => "Time to First Token (ms)",
            MetricKey::EndToEndLatency => "End-to-End Latency (ms)",
            MetricKey::InterTokenLatency => "Inter-Token Latency (ms)",
            MetricKey::TokenSpeed => "Token Speed (tokens/s)",
            MetricKey::Throughput => "Throughput (tokens/s)",
        }
    }
}

impl FromStr for MetricKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}

/// 指标形态：四项统计或吞吐对
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind<'a> {
    FourStat(&'a MetricStat),
    Throughput(&'a Throughput),
}

impl MetricsBundle {
    pub fn metric(&self, key: MetricKey) -> MetricKind<'_> {
        match key {
            MetricKey::TimeToFirstToken => MetricKind::FourStat(&self.time_to_first_token),
            MetricKey::EndToEndLatency => MetricKind::FourStat(&self.end_to_end_latency),
            MetricKey::InterTokenLatency => MetricKind::FourStat(&self.inter_token_latency),
            MetricKey::TokenSpeed => MetricKind::FourStat(&self.token_speed),
            MetricKey::Throughput => MetricKind::Throughput(&self.throughput),
        }
    }
}

/// 图表数据
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub data: Vec<f64>,
    pub labels: Vec<String>,
}

impl From<MetricKind<'_>> for ChartSeries {
    fn from(kind: MetricKind<'_>) -> Self {
        match kind {
            MetricKind::FourStat(stat) => Self {
                data: vec![stat.average, stat.median, stat.minimum, stat.maximum],
                labels: ["Average", "Median", "Min", "Max"].map(String::from).to_vec(),
            },
            MetricKind::Throughput(tp) => Self {
                data: vec![tp.input_tokens_per_second, tp.output_tokens_per_second],
                labels: ["Input Tokens/s", "Output Tokens/s"].map(String::from).to_vec(),
            },
        }
    }
}

/// 指定指标的图表序列；未知指标返回空序列
pub fn chart_series(results: &BenchmarkResults, metric_key: &str) -> ChartSeries {
    match metric_key.parse::<MetricKey>() {
        Ok(key) => results.metrics.metric(key).into(),
        Err(()) => ChartSeries::default(),
    }
}

/// "越低越好"指标的线性评分，结果限制在 [0, 100]
///
/// `worst_case == best_case` 时返回 0
pub fn performance_score(value: f64, worst_case: f64, best_case: f64) -> f64 {
    if worst_case == best_case {
        return 0.0;
    }
    let score = (worst_case - value) / (worst_case - best_case) * 100.0;
    clamp_score(score)
}

/// "越高越好"指标相对上限的评分，结果限制在 [0, 100]
pub fn ratio_score(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        return 0.0;
    }
    clamp_score(value / ceiling * 100.0)
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// 面板展示的三项综合评分
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceOverview {
    pub latency_score: f64,
    pub throughput_score: f64,
    pub token_speed_score: f64,
}

pub fn performance_overview(results: &BenchmarkResults) -> PerformanceOverview {
    let metrics = &results.metrics;
    PerformanceOverview {
        latency_score: performance_score(
            metrics.end_to_end_latency.average,
            LATENCY_WORST_MS,
            LATENCY_BEST_MS,
        ),
        throughput_score: ratio_score(
            metrics.throughput.output_tokens_per_second,
            THROUGHPUT_CEILING,
        ),
        token_speed_score: ratio_score(metrics.token_speed.average, TOKEN_SPEED_CEILING),
    }
}

/// CSV 字段转义：包含逗号、引号或换行时加引号
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 导出为 CSV 文本
///
/// 块顺序固定：标题、配置、四项统计指标（TTFT、E2E、ITL、Token 速度）、吞吐。
/// 日期取记录的 createdAt，相同记录总是得到相同输出。
pub fn to_csv(record: &BenchmarkRecord) -> String {
    let not_specified = |v: &Option<String>| {
        v.as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Not specified")
            .to_string()
    };

    let mut lines = vec![
        "Benchmark Results".to_string(),
        format!("Id,{}", record.id),
        format!("Created At,{}", record.created_at.to_rfc3339()),
        String::new(),
        "Test Configuration".to_string(),
        "Parameter,Value".to_string(),
    ];
    let rows: [(&str, String); 9] = [
        ("Model", not_specified(&record.model)),
        ("URL", record.url.clone()),
        ("Concurrent Users", record.user.to_string()),
        ("Spawn Rate", record.spawnrate.to_string()),
        ("Duration (seconds)", record.duration.to_string()),
        ("Dataset", record.dataset.clone()),
        ("Tokenizer", not_specified(&record.tokenizer)),
        ("Status", record.status.clone()),
        ("Notes", record.notes.clone().unwrap_or_default()),
    ];
    lines.extend(
        rows.iter()
            .map(|(name, value)| format!("{},{}", name, csv_field(value))),
    );

    for key in MetricKey::ALL {
        lines.push(String::new());
        lines.push(key.title().to_string());
        match record.results.metrics.metric(key) {
            MetricKind::FourStat(stat) => {
                lines.push("Average,Median,Min,Max".to_string());
                lines.push(format!(
                    "{},{},{},{}",
                    stat.average, stat.median, stat.minimum, stat.maximum
                ));
            }
            MetricKind::Throughput(tp) => {
                lines.push("Input,Output".to_string());
                lines.push(format!(
                    "{},{}",
                    tp.input_tokens_per_second, tp.output_tokens_per_second
                ));
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// 导出为格式化 JSON（可无损解析回记录）
pub fn to_json(record: &BenchmarkRecord) -> serde_json::Result<String> {
    serde_json::to_string_pretty(record)
}
