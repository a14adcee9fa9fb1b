use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 压测引擎地址的环境变量名
pub const ENGINE_URL_ENV: &str = "BENCHMARK_API_URL";

/// 压测记录存储后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// 进程内内存存储（重启后丢失）
    #[default]
    Memory,
    /// SQLite 文件存储
    Sqlite,
}

/// 历史记录来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HistorySourceKind {
    /// 由本地存储提供列表/详情
    #[default]
    Local,
    /// 由压测引擎的 `GET /benchmarks` 提供列表/详情
    Remote,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 压测引擎基础地址，可被 `BENCHMARK_API_URL` 覆盖
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// 单次压测请求超时（秒）
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// 历史查询请求超时（秒）
    #[serde(default = "default_history_timeout_secs")]
    pub history_timeout_secs: u64,

    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub storage: StorageBackend,

    /// SQLite 数据库路径（storage = sqlite 时生效）
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub history_source: HistorySourceKind,

    /// 引擎健康检查间隔（秒），0 表示禁用
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_engine_url() -> String {
    "http://localhost".to_string()
}

fn default_run_timeout_secs() -> u64 {
    10 * 60
}

fn default_history_timeout_secs() -> u64 {
    10
}

fn default_db_path() -> String {
    "benchmarks.db".to_string()
}

fn default_health_check_interval_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            engine_url: default_engine_url(),
            run_timeout_secs: default_run_timeout_secs(),
            history_timeout_secs: default_history_timeout_secs(),
            proxy_url: None,
            storage: StorageBackend::default(),
            db_path: default_db_path(),
            history_source: HistorySourceKind::default(),
            health_check_interval_secs: default_health_check_interval_secs(),
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("配置文件无效: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 校验取值范围
    ///
    /// 超时为 0 时 reqwest 会让每个请求立即超时，直接拒绝
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.run_timeout_secs == 0 {
            anyhow::bail!("runTimeoutSecs 必须大于 0");
        }
        if self.history_timeout_secs == 0 {
            anyhow::bail!("historyTimeoutSecs 必须大于 0");
        }
        Ok(())
    }

    /// 应用环境变量覆盖（目前仅 `BENCHMARK_API_URL`）
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENGINE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.engine_url = url.to_string();
            }
        }
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 将当前配置写回原始配置文件
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("配置文件路径未知，无法保存配置"))?;

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}
