//! 压测配置与结果的结构校验
//!
//! 输入为未定型的 JSON，输出为满足约束的强类型值，或包含全部失败字段的错误列表。
//! 引擎响应同时接受嵌套结构 `{ "results": {...} }` 与旧版扁平结构。

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use serde_json::{Map, Value};

use super::error::{ValidationError, ValidationErrors};
use super::model::{
    BenchmarkConfig, BenchmarkRecord, BenchmarkResults, DEFAULT_DATASET, DEFAULT_DURATION_SECS,
    DEFAULT_SPAWN_RATE, DEFAULT_TARGET_URL, DEFAULT_USERS, MetricStat, MetricsBundle,
    RunConfiguration, Throughput,
};

/// 四项统计指标的字段名
pub const FOUR_STAT_METRICS: [&str; 4] = [
    "time_to_first_token",
    "end_to_end_latency",
    "inter_token_latency",
    "token_speed",
];

/// 校验提交配置，为缺省字段填充默认值
pub fn validate_config(input: &Value) -> Result<BenchmarkConfig, ValidationErrors> {
    let mut v = Validator::new();
    let Some(obj) = v.object(input, "") else {
        return Err(v.errors);
    };

    let url = v.url(obj, "url", Some(DEFAULT_TARGET_URL));
    let user = v.positive_int(
        obj,
        "user",
        Some(DEFAULT_USERS),
        "Number of users must be positive",
    );
    let spawnrate = v.positive_int(
        obj,
        "spawnrate",
        Some(DEFAULT_SPAWN_RATE),
        "Spawn rate must be positive",
    );
    let duration = v.positive_int(
        obj,
        "duration",
        Some(DEFAULT_DURATION_SECS),
        "Duration must be positive",
    );
    let model = v.optional_string(obj, "model", "");
    let tokenizer = v.optional_string(obj, "tokenizer", "");
    let dataset = v
        .optional_string(obj, "dataset", "")
        .unwrap_or_else(|| DEFAULT_DATASET.to_string());
    let api_key = v.optional_string(obj, "api_key", "");
    let notes = v.optional_string(obj, "notes", "");

    v.finish(BenchmarkConfig {
        url,
        user,
        spawnrate,
        duration,
        model,
        tokenizer,
        dataset,
        api_key,
        notes,
    })
}

/// 校验引擎返回的结果结构
pub fn validate_results(input: &Value) -> Result<BenchmarkResults, ValidationErrors> {
    let mut v = Validator::new();
    let results = v.results(input, "");
    match results {
        Some(results) => v.finish(results),
        None => Err(v.errors),
    }
}

/// 校验引擎响应体
///
/// 存在 `results` 对象时按嵌套结构校验（字段路径带 `results.` 前缀），
/// 否则按旧版扁平结构校验整个响应体
pub fn validate_engine_payload(input: &Value) -> Result<BenchmarkResults, ValidationErrors> {
    match input.get("results") {
        Some(nested) if nested.is_object() => {
            validate_results(nested).map_err(|e| e.prefixed("results"))
        }
        _ => validate_results(input),
    }
}

/// 校验单条持久化记录（远程历史来源使用）
pub fn validate_record(input: &Value) -> Result<BenchmarkRecord, ValidationErrors> {
    let mut v = Validator::new();
    let Some(obj) = v.object(input, "") else {
        return Err(v.errors);
    };

    let id = v.positive_int(obj, "id", None, "Id must be positive") as u64;
    let url = v.required_string(obj, "url", "");
    let user = v.positive_int(obj, "user", None, "Number of users must be positive");
    let spawnrate = v.positive_int(obj, "spawnrate", None, "Spawn rate must be positive");
    let duration = v.positive_int(obj, "duration", None, "Duration must be positive");
    let model = v.optional_string(obj, "model", "");
    let tokenizer = v.optional_string(obj, "tokenizer", "");
    let dataset = v.optional_string(obj, "dataset", "").unwrap_or_default();
    let notes = v.nullable_string(obj, "notes", "");
    let favorite = v.optional_bool(obj, "favorite", "").unwrap_or(false);
    let status = v.required_string(obj, "status", "");
    let created_at = v.timestamp(obj, "createdAt", "");
    let results = match obj.get("results") {
        Some(value) => v.results(value, "results"),
        None => {
            v.push("results", "Required");
            None
        }
    };

    match (results, created_at) {
        (Some(results), Some(created_at)) => v.finish(BenchmarkRecord {
            id,
            url,
            user,
            spawnrate,
            duration,
            model,
            tokenizer,
            dataset,
            notes,
            favorite,
            status,
            results,
            created_at,
        }),
        _ => Err(v.errors),
    }
}

/// JSON 值的类型名（用于错误消息）
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// 错误收集器：所有检查都会执行，失败项累积到 `errors`
struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    fn new() -> Self {
        Self {
            errors: ValidationErrors::new(),
        }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(path, message));
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.push(path, format!("Expected object, received {}", type_name(value)));
                None
            }
        }
    }

    /// 正整数（接受数字字符串），缺失时使用默认值；失败返回 0
    fn positive_int(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        default: Option<u32>,
        message: &str,
    ) -> u32 {
        let raw = match obj.get(key) {
            None | Some(Value::Null) => {
                return match default {
                    Some(d) => d,
                    None => {
                        self.push(key, "Required");
                        0
                    }
                };
            }
            Some(value) => value,
        };

        let number = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(number) = number.filter(|n| n.is_finite()) else {
            self.push(key, format!("Expected number, received {}", type_name(raw)));
            return 0;
        };
        if number.fract() != 0.0 {
            self.push(key, "Expected integer, received float");
            return 0;
        }
        if number <= 0.0 {
            self.push(key, message);
            return 0;
        }
        if number > u32::MAX as f64 {
            self.push(key, format!("Number must be less than or equal to {}", u32::MAX));
            return 0;
        }
        number as u32
    }

    /// 非负整数（引擎回显的运行参数）
    fn non_negative_int(&mut self, obj: &Map<String, Value>, key: &str, prefix: &str) -> u64 {
        let path = join_path(prefix, key);
        match obj.get(key) {
            None => {
                self.push(path, "Required");
                0
            }
            Some(Value::Number(n)) => match n.as_u64() {
                Some(value) => value,
                None => match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => f as u64,
                    _ => {
                        self.push(path, "Expected non-negative integer");
                        0
                    }
                },
            },
            Some(other) => {
                self.push(path, format!("Expected number, received {}", type_name(other)));
                0
            }
        }
    }

    /// 绝对 URL，缺失时使用默认值
    fn url(&mut self, obj: &Map<String, Value>, key: &str, default: Option<&str>) -> String {
        let raw = match obj.get(key) {
            None | Some(Value::Null) => match default {
                Some(d) => return d.to_string(),
                None => {
                    self.push(key, "Required");
                    return String::new();
                }
            },
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                self.push(key, format!("Expected string, received {}", type_name(other)));
                return String::new();
            }
        };

        match Url::parse(raw) {
            Ok(url) if !url.cannot_be_a_base() => raw.to_string(),
            _ => {
                self.push(key, "Please enter a valid URL");
                String::new()
            }
        }
    }

    fn required_string(&mut self, obj: &Map<String, Value>, key: &str, prefix: &str) -> String {
        let path = join_path(prefix, key);
        match obj.get(key) {
            Some(Value::String(s)) => s.clone(),
            None => {
                self.push(path, "Required");
                String::new()
            }
            Some(other) => {
                self.push(path, format!("Expected string, received {}", type_name(other)));
                String::new()
            }
        }
    }

    /// 可选字符串，空白视为未提供
    fn optional_string(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        prefix: &str,
    ) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.push(
                    join_path(prefix, key),
                    format!("Expected string, received {}", type_name(other)),
                );
                None
            }
        }
    }

    /// 可空字符串，保留空字符串原值
    fn nullable_string(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        prefix: &str,
    ) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.push(
                    join_path(prefix, key),
                    format!("Expected string, received {}", type_name(other)),
                );
                None
            }
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, key: &str, prefix: &str) -> Option<bool> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                self.push(
                    join_path(prefix, key),
                    format!("Expected boolean, received {}", type_name(other)),
                );
                None
            }
        }
    }

    /// RFC3339 时间戳；无时区的时间按 UTC 处理
    fn timestamp(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        prefix: &str,
    ) -> Option<DateTime<Utc>> {
        let path = join_path(prefix, key);
        let raw = match obj.get(key) {
            Some(Value::String(s)) => s.trim(),
            None => {
                self.push(path, "Required");
                return None;
            }
            Some(other) => {
                self.push(path, format!("Expected string, received {}", type_name(other)));
                return None;
            }
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(naive) => Some(naive.and_utc()),
            Err(_) => {
                self.push(path, "Invalid date");
                None
            }
        }
    }

    /// 非负有限浮点数
    fn non_negative_number(&mut self, obj: &Map<String, Value>, key: &str, prefix: &str) -> f64 {
        let path = join_path(prefix, key);
        match obj.get(key) {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => f,
                Some(_) => {
                    self.push(path, "Number must be greater than or equal to 0");
                    0.0
                }
                None => {
                    self.push(path, "Expected number");
                    0.0
                }
            },
            None => {
                self.push(path, "Required");
                0.0
            }
            Some(other) => {
                self.push(path, format!("Expected number, received {}", type_name(other)));
                0.0
            }
        }
    }

    fn metric_stat(&mut self, value: Option<&Value>, path: &str) -> Option<MetricStat> {
        let Some(value) = value else {
            self.push(path, "Required");
            return None;
        };
        let obj = self.object(value, path)?;
        let before = self.errors.len();

        let stat = MetricStat {
            average: self.non_negative_number(obj, "average", path),
            median: self.non_negative_number(obj, "median", path),
            minimum: self.non_negative_number(obj, "minimum", path),
            maximum: self.non_negative_number(obj, "maximum", path),
        };
        if self.errors.len() != before {
            return None;
        }

        // 只有四个数值本身合法时才检查大小关系
        if stat.minimum > stat.median {
            self.push(join_path(path, "median"), "Median must not be less than minimum");
        }
        if stat.median > stat.maximum {
            self.push(join_path(path, "median"), "Median must not exceed maximum");
        }
        if stat.minimum > stat.average {
            self.push(join_path(path, "average"), "Average must not be less than minimum");
        }
        if stat.average > stat.maximum {
            self.push(join_path(path, "average"), "Average must not exceed maximum");
        }
        (self.errors.len() == before).then_some(stat)
    }

    fn throughput(&mut self, value: Option<&Value>, path: &str) -> Option<Throughput> {
        let Some(value) = value else {
            self.push(path, "Required");
            return None;
        };
        let obj = self.object(value, path)?;
        Some(Throughput {
            input_tokens_per_second: self.non_negative_number(obj, "input_tokens_per_second", path),
            output_tokens_per_second: self.non_negative_number(
                obj,
                "output_tokens_per_second",
                path,
            ),
        })
    }

    fn metrics(&mut self, value: Option<&Value>, path: &str) -> Option<MetricsBundle> {
        let Some(value) = value else {
            self.push(path, "Required");
            return None;
        };
        let obj = self.object(value, path)?;

        let [ttft, e2e, itl, speed] =
            FOUR_STAT_METRICS.map(|key| self.metric_stat(obj.get(key), &join_path(path, key)));
        let throughput = self.throughput(obj.get("throughput"), &join_path(path, "throughput"));

        Some(MetricsBundle {
            time_to_first_token: ttft?,
            end_to_end_latency: e2e?,
            inter_token_latency: itl?,
            token_speed: speed?,
            throughput: throughput?,
        })
    }

    fn configuration(&mut self, value: Option<&Value>, path: &str) -> Option<RunConfiguration> {
        let Some(value) = value else {
            self.push(path, "Required");
            return None;
        };
        let obj = self.object(value, path)?;
        Some(RunConfiguration {
            user: self.non_negative_int(obj, "user", path),
            spawnrate: self.non_negative_int(obj, "spawnrate", path),
            model: self.required_string(obj, "model", path),
            tokenizer: self.required_string(obj, "tokenizer", path),
            url: self.required_string(obj, "url", path),
            duration: self.non_negative_int(obj, "duration", path),
            dataset: self.nullable_string(obj, "dataset", path),
            notes: self.nullable_string(obj, "notes", path),
        })
    }

    fn results(&mut self, value: &Value, path: &str) -> Option<BenchmarkResults> {
        let obj = self.object(value, path)?;
        let status = self.required_string(obj, "status", path);
        let metrics = self.metrics(obj.get("metrics"), &join_path(path, "metrics"));
        let configuration =
            self.configuration(obj.get("configuration"), &join_path(path, "configuration"));

        Some(BenchmarkResults {
            status,
            metrics: metrics?,
            configuration: configuration?,
        })
    }
}
