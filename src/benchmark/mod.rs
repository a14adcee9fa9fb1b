//! LLM 压测面板模块
//!
//! 提供压测提交编排、结果校验、记录存储、按模型分组与派生指标

pub mod engine;
pub mod error;
pub mod grouping;
pub mod health;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod projection;
pub mod schema;
pub mod sqlite_store;
pub mod store;
pub mod types;
mod handlers;
mod router;

pub use engine::{BenchmarkEngine, HttpEngine};
pub use health::{EngineHealth, start_health_check_task};
pub use history::HistorySource;
pub use orchestrator::Orchestrator;
pub use router::{BenchmarkState, create_benchmark_router};
pub use sqlite_store::SqliteStore;
pub use store::{MemoryStore, RecordStore};
